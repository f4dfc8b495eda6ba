//! Event channel factories and handles.

use super::types::StayEvent;
use tokio::sync::mpsc;

/// Default buffer size for event channels; enough for bursts while keeping
/// memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for stay lifecycle events.
pub type StayEventSender = mpsc::Sender<StayEvent>;
/// Receiver handle for stay lifecycle events.
pub type StayEventReceiver = mpsc::Receiver<StayEvent>;

/// Create a new stay lifecycle event channel.
pub fn stay_event_channel() -> (StayEventSender, StayEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Container for all event senders handed to components that publish.
#[derive(Clone)]
pub struct EventSenders {
    pub stay_events: StayEventSender,
}

impl EventSenders {
    pub fn new(stay_events: StayEventSender) -> Self {
        Self { stay_events }
    }
}
