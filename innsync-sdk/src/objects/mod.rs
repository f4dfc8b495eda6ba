//! Wire payload types exchanged with external sales channels.
//!
//! These are the API/DTO types; database entities live in
//! `innsync-core::entities`.

pub mod sync_job;
pub mod webhook;

pub use sync_job::{DateSpanJob, SyncJob};
pub use webhook::{CancellationPayload, ChannelWebhookEvent, ReservationPayload};
