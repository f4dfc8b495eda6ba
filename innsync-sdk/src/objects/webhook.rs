//! Inbound webhook payload types for OTA reservation events.

use serde::{Deserialize, Serialize};
use time::Date;

/// An inbound event pushed by an external channel.
///
/// The `event` tag selects the variant: `new_reservation`, `modification`,
/// or `cancellation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelWebhookEvent {
    NewReservation(ReservationPayload),
    Modification(ReservationPayload),
    Cancellation(CancellationPayload),
}

impl ChannelWebhookEvent {
    /// Stable name used for sync-log records.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelWebhookEvent::NewReservation(_) => "new_reservation",
            ChannelWebhookEvent::Modification(_) => "modification",
            ChannelWebhookEvent::Cancellation(_) => "cancellation",
        }
    }

    /// The channel-side reservation identifier carried by every variant.
    pub fn external_ref(&self) -> &str {
        match self {
            ChannelWebhookEvent::NewReservation(p) | ChannelWebhookEvent::Modification(p) => {
                &p.external_ref
            }
            ChannelWebhookEvent::Cancellation(p) => &p.external_ref,
        }
    }
}

/// Reservation details for `new_reservation` and `modification` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPayload {
    /// Channel-side reservation identifier, stable across modifications.
    pub external_ref: String,
    /// Channel-side listing identifier, resolved to a room via the mapping.
    pub listing_id: String,
    pub check_in: Date,
    pub check_out: Date,
    pub guest_name: String,
    #[serde(default)]
    pub guest_phone: Option<String>,
    #[serde(default)]
    pub adults: Option<i32>,
    #[serde(default)]
    pub children: Option<i32>,
    /// Channel-computed total in minor currency units. When present it
    /// overrides local rate resolution.
    #[serde(default)]
    pub total_minor: Option<i64>,
}

/// Payload for `cancellation` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationPayload {
    pub external_ref: String,
    pub listing_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn new_reservation_deserializes_from_tagged_json() {
        let body = r#"{
            "event": "new_reservation",
            "external_ref": "bcom-12345",
            "listing_id": "L-77",
            "check_in": "2026-09-01",
            "check_out": "2026-09-04",
            "guest_name": "Aigerim S.",
            "total_minor": 1500000
        }"#;
        let event: ChannelWebhookEvent = serde_json::from_str(body).unwrap();
        let ChannelWebhookEvent::NewReservation(p) = event else {
            panic!("wrong variant");
        };
        assert_eq!(p.external_ref, "bcom-12345");
        assert_eq!(p.check_in, date!(2026 - 09 - 01));
        assert_eq!(p.check_out, date!(2026 - 09 - 04));
        assert_eq!(p.total_minor, Some(1_500_000));
        assert_eq!(p.guest_phone, None);
    }

    #[test]
    fn cancellation_roundtrips() {
        let event = ChannelWebhookEvent::Cancellation(CancellationPayload {
            external_ref: "abnb-9".into(),
            listing_id: "L-2".into(),
            reason: Some("guest request".into()),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"cancellation""#));
        let back: ChannelWebhookEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind(), "cancellation");
        assert_eq!(back.external_ref(), "abnb-9");
    }
}
