//! Lifecycle event bus.
//!
//! Lifecycle operations publish immutable event records after their
//! transaction commits; the channel synchronizer is a pure subscriber with
//! no back-reference into the lifecycle. Events are ephemeral wakeups — the
//! durable state they point at (outbox rows, stays) lives in the database,
//! so a dropped event is recoverable, never silent loss.

pub mod channels;
pub mod types;

pub use channels::{stay_event_channel, EventSenders, StayEventReceiver, StayEventSender,
    DEFAULT_CHANNEL_BUFFER};
pub use types::StayEvent;
