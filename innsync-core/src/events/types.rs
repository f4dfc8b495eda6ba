//! Lifecycle event definitions.

use time::Date;
use uuid::Uuid;

use crate::entities::StayStatus;

/// An immutable record of one stay lifecycle transition.
#[derive(Debug, Clone)]
pub enum StayEvent {
    Created {
        stay_id: Uuid,
        property_id: Uuid,
        room_id: Uuid,
        guest_id: Uuid,
        check_in: Date,
        check_out: Date,
        total_minor: i64,
        booking_ref: String,
        actor: String,
    },
    Cancelled {
        stay_id: Uuid,
        property_id: Uuid,
        room_id: Uuid,
        check_in: Date,
        check_out: Date,
        reason: Option<String>,
        actor: String,
    },
    StatusChanged {
        stay_id: Uuid,
        property_id: Uuid,
        room_id: Uuid,
        old_status: StayStatus,
        new_status: StayStatus,
        actor: String,
    },
}

impl StayEvent {
    pub fn stay_id(&self) -> Uuid {
        match self {
            StayEvent::Created { stay_id, .. }
            | StayEvent::Cancelled { stay_id, .. }
            | StayEvent::StatusChanged { stay_id, .. } => *stay_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StayEvent::Created { .. } => "stay.created",
            StayEvent::Cancelled { .. } => "stay.cancelled",
            StayEvent::StatusChanged { .. } => "stay.status_changed",
        }
    }

    /// Whether this event changes room inventory on other channels and so
    /// requires outbound fan-out.
    pub fn triggers_fanout(&self) -> bool {
        matches!(self, StayEvent::Created { .. } | StayEvent::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_created_and_cancelled_fan_out() {
        let created = StayEvent::Created {
            stay_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            check_in: time::macros::date!(2026 - 09 - 01),
            check_out: time::macros::date!(2026 - 09 - 04),
            total_minor: 1_500_000,
            booking_ref: "BK-2026-0001".into(),
            actor: "reception".into(),
        };
        assert!(created.triggers_fanout());
        assert_eq!(created.kind(), "stay.created");

        let status = StayEvent::StatusChanged {
            stay_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            old_status: StayStatus::Confirmed,
            new_status: StayStatus::CheckedIn,
            actor: "reception".into(),
        };
        assert!(!status.triggers_fanout());
    }
}
