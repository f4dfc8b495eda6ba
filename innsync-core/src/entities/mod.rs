//! Database entities.
//!
//! Plain structs with inherent async query functions taking an executor, so
//! the same query runs against the pool or inside a transaction. Status
//! enums map to Postgres enum types via `sqlx::Type`.

pub mod block;
pub mod channel;
pub mod guest;
pub mod pricing_rule;
pub mod room;
pub mod stay;
pub mod stay_history;
pub mod sync_log;

pub use block::Block;
pub use channel::{Channel, ChannelMapping};
pub use guest::Guest;
pub use pricing_rule::{PricingRule, RuleKind};
pub use room::{Room, RoomStatus};
pub use stay::{Stay, StaySource, StayStatus};
pub use stay_history::{HistoryAction, StayHistory};
pub use sync_log::{SyncDirection, SyncLogEntry, SyncStatus};
