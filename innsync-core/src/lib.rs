#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod availability;
pub mod calendar;
pub mod entities;
pub mod events;
pub mod lifecycle;
pub mod processors;
pub mod rates;
pub mod sequence;
