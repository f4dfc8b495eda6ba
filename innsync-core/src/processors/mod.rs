//! Channel synchronization processors.
//!
//! - `ChannelSyncWorker`: sweeps pending outbound sync-log rows and delivers
//!   signed close/open-dates jobs to channel push endpoints, with retries.
//! - `InboundSync`: verifies and dispatches OTA webhook events into the stay
//!   lifecycle.
//! - `FeedPoller`: periodically ingests iCal-style calendar feeds from
//!   channels that only publish a polled calendar.

pub mod channel_sync;
pub mod feed_poller;
pub mod inbound;

pub use channel_sync::{ChannelSyncWorker, DeliveryError};
pub use feed_poller::{FeedPoller, PollStats};
pub use inbound::{InboundOutcome, InboundSync, SyncError};
