//! Inbound OTA webhook dispatch.
//!
//! Verification happens on the raw body bytes exactly as received; only
//! after the HMAC checks out is the body parsed and routed into the stay
//! lifecycle. Every verified event leaves one inbound sync-log row recording
//! success or failure; a rejected signature leaves an error row and mutates
//! nothing else.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{Channel, ChannelMapping, Stay, StayStatus, SyncStatus, SyncLogEntry};
use crate::lifecycle::{CreateStay, GuestRef, ModifyStay, StayError, StayService};
use innsync_sdk::objects::{CancellationPayload, ChannelWebhookEvent, ReservationPayload};
use innsync_sdk::signature::{verify_body, SignatureError};

/// Errors raised while ingesting an inbound channel event.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("channel {0} not found")]
    ChannelNotFound(Uuid),

    #[error("channel {0} is inactive")]
    ChannelInactive(Uuid),

    /// The channel has no shared secret, so nothing can be verified.
    #[error("channel {0} has no shared secret configured")]
    SecretMissing(Uuid),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("malformed webhook payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("listing {listing_id:?} is not mapped on channel {channel_id}")]
    UnknownListing {
        channel_id: Uuid,
        listing_id: String,
    },

    #[error("no stay with external reference {external_ref:?} on channel {channel_id}")]
    UnknownReservation {
        channel_id: Uuid,
        external_ref: String,
    },

    #[error(transparent)]
    Stay(#[from] StayError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SyncError {
    /// Stable machine-readable code for API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::ChannelNotFound(_) | SyncError::UnknownReservation { .. } => "NOT_FOUND",
            SyncError::ChannelInactive(_) => "CHANNEL_INACTIVE",
            SyncError::SecretMissing(_) => "CHANNEL_SECRET_MISSING",
            SyncError::Signature(_) => "WEBHOOK_SIGNATURE_INVALID",
            SyncError::Payload(_) => "WEBHOOK_PAYLOAD_INVALID",
            SyncError::UnknownListing { .. } => "LISTING_NOT_MAPPED",
            SyncError::Stay(e) => e.code(),
            SyncError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// What an accepted webhook event did.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundOutcome {
    Created { stay_id: Uuid, booking_ref: String },
    Modified { stay_id: Uuid },
    Cancelled { stay_id: Uuid },
    /// The event was already applied; nothing changed.
    Duplicate { stay_id: Uuid },
}

impl InboundOutcome {
    pub fn stay_id(&self) -> Uuid {
        match self {
            InboundOutcome::Created { stay_id, .. }
            | InboundOutcome::Modified { stay_id }
            | InboundOutcome::Cancelled { stay_id }
            | InboundOutcome::Duplicate { stay_id } => *stay_id,
        }
    }
}

/// Routes verified OTA webhook events into the stay lifecycle.
#[derive(Clone)]
pub struct InboundSync {
    service: StayService,
}

impl InboundSync {
    pub fn new(service: StayService) -> Self {
        Self { service }
    }

    fn pool(&self) -> &PgPool {
        self.service.pool()
    }

    /// Verify and dispatch one webhook delivery.
    ///
    /// `body` must be the raw request bytes; re-serialized JSON would break
    /// signature verification.
    pub async fn handle_webhook(
        &self,
        channel_id: Uuid,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<InboundOutcome, SyncError> {
        let channel = Channel::get_by_id(self.pool(), channel_id)
            .await?
            .ok_or(SyncError::ChannelNotFound(channel_id))?;
        if !channel.active {
            return Err(SyncError::ChannelInactive(channel_id));
        }
        let secret = channel
            .secret
            .as_deref()
            .ok_or(SyncError::SecretMissing(channel_id))?;

        let header = signature.ok_or(SignatureError::MissingHeader)?;
        if let Err(e) = verify_body(body, header, secret.as_bytes()) {
            warn!(channel_id = %channel_id, error = %e, "webhook signature rejected");
            self.log_inbound(
                &channel,
                None,
                None,
                "signature_rejected",
                SyncStatus::Error,
                serde_json::json!({ "body_len": body.len() }),
                Some(&e.to_string()),
            )
            .await?;
            return Err(e.into());
        }

        let event: ChannelWebhookEvent = serde_json::from_slice(body)?;
        let payload_snapshot =
            serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
        let kind = event.kind();

        let result = self.dispatch(&channel, event).await;

        match &result {
            Ok(outcome) => {
                info!(
                    channel_id = %channel_id,
                    event = kind,
                    outcome = ?outcome,
                    "inbound channel event applied"
                );
                self.log_inbound(
                    &channel,
                    Some(outcome.stay_id()),
                    None,
                    kind,
                    SyncStatus::Success,
                    payload_snapshot,
                    None,
                )
                .await?;
            }
            Err(e) => {
                warn!(
                    channel_id = %channel_id,
                    event = kind,
                    error = %e,
                    "inbound channel event rejected"
                );
                self.log_inbound(
                    &channel,
                    None,
                    None,
                    kind,
                    SyncStatus::Error,
                    payload_snapshot,
                    Some(&e.to_string()),
                )
                .await?;
            }
        }

        result
    }

    async fn dispatch(
        &self,
        channel: &Channel,
        event: ChannelWebhookEvent,
    ) -> Result<InboundOutcome, SyncError> {
        match event {
            ChannelWebhookEvent::NewReservation(p) => self.apply_new_reservation(channel, p).await,
            ChannelWebhookEvent::Modification(p) => self.apply_modification(channel, p).await,
            ChannelWebhookEvent::Cancellation(p) => self.apply_cancellation(channel, p).await,
        }
    }

    /// Create a stay for an unseen reservation. Deliveries are retried by
    /// channels, so an already-imported external_ref is a duplicate, not an
    /// error.
    async fn apply_new_reservation(
        &self,
        channel: &Channel,
        payload: ReservationPayload,
    ) -> Result<InboundOutcome, SyncError> {
        if let Some(existing) =
            Stay::find_by_external_ref(self.pool(), channel.id, &payload.external_ref).await?
        {
            return Ok(InboundOutcome::Duplicate {
                stay_id: existing.id,
            });
        }

        let mapping = self.resolve_listing(channel, &payload.listing_id).await?;
        let details = self
            .service
            .create(CreateStay {
                property_id: channel.property_id,
                room_id: mapping.room_id,
                guest: GuestRef::Contact {
                    full_name: payload.guest_name,
                    phone: payload.guest_phone,
                    email: None,
                },
                check_in: payload.check_in,
                check_out: payload.check_out,
                adults: payload.adults.unwrap_or(1),
                children: payload.children.unwrap_or(0),
                rate_rule_id: None,
                total_override_minor: payload.total_minor,
                source: crate::entities::StaySource::Channel,
                channel_id: Some(channel.id),
                external_ref: Some(payload.external_ref),
                actor: actor_for(channel),
            })
            .await?;

        Ok(InboundOutcome::Created {
            stay_id: details.stay.id,
            booking_ref: details.stay.booking_ref,
        })
    }

    /// Apply a modification, creating the stay when the original event was
    /// never received. The listing is resolved before the duplicate check so
    /// a move to another listing (a room change with unchanged dates) is
    /// applied, not dropped. A room or date change re-runs the availability
    /// check excluding the stay itself.
    async fn apply_modification(
        &self,
        channel: &Channel,
        payload: ReservationPayload,
    ) -> Result<InboundOutcome, SyncError> {
        let Some(existing) =
            Stay::find_by_external_ref(self.pool(), channel.id, &payload.external_ref).await?
        else {
            return self.apply_new_reservation(channel, payload).await;
        };

        let mapping = self.resolve_listing(channel, &payload.listing_id).await?;

        if modification_is_noop(&existing, &payload, mapping.room_id) {
            return Ok(InboundOutcome::Duplicate {
                stay_id: existing.id,
            });
        }

        let details = self
            .service
            .modify(
                existing.id,
                ModifyStay {
                    room_id: Some(mapping.room_id),
                    check_in: Some(payload.check_in),
                    check_out: Some(payload.check_out),
                    adults: payload.adults,
                    children: payload.children,
                    total_override_minor: payload.total_minor,
                    actor: actor_for(channel),
                },
            )
            .await?;

        Ok(InboundOutcome::Modified {
            stay_id: details.stay.id,
        })
    }

    async fn apply_cancellation(
        &self,
        channel: &Channel,
        payload: CancellationPayload,
    ) -> Result<InboundOutcome, SyncError> {
        let Some(existing) =
            Stay::find_by_external_ref(self.pool(), channel.id, &payload.external_ref).await?
        else {
            return Err(SyncError::UnknownReservation {
                channel_id: channel.id,
                external_ref: payload.external_ref,
            });
        };

        if existing.status == StayStatus::Cancelled {
            return Ok(InboundOutcome::Duplicate {
                stay_id: existing.id,
            });
        }

        let details = self
            .service
            .cancel(existing.id, payload.reason, actor_for(channel))
            .await?;

        Ok(InboundOutcome::Cancelled {
            stay_id: details.stay.id,
        })
    }

    async fn resolve_listing(
        &self,
        channel: &Channel,
        listing_id: &str,
    ) -> Result<ChannelMapping, SyncError> {
        ChannelMapping::find_by_listing(self.pool(), channel.id, listing_id)
            .await?
            .ok_or_else(|| SyncError::UnknownListing {
                channel_id: channel.id,
                listing_id: listing_id.to_owned(),
            })
    }

    #[allow(clippy::too_many_arguments)]
    async fn log_inbound(
        &self,
        channel: &Channel,
        stay_id: Option<Uuid>,
        room_id: Option<Uuid>,
        event_type: &str,
        status: SyncStatus,
        payload: serde_json::Value,
        error_message: Option<&str>,
    ) -> Result<(), SyncError> {
        SyncLogEntry::insert_inbound(
            self.pool(),
            channel.property_id,
            channel.id,
            stay_id,
            room_id,
            event_type,
            status,
            payload,
            error_message,
        )
        .await?;
        Ok(())
    }
}

fn actor_for(channel: &Channel) -> String {
    format!("channel:{}", channel.name)
}

/// A re-delivered modification changes nothing when the mapped room, the
/// dates, and the total all match the stay we already hold.
fn modification_is_noop(existing: &Stay, payload: &ReservationPayload, mapped_room_id: Uuid) -> bool {
    existing.room_id == mapped_room_id
        && existing.check_in == payload.check_in
        && existing.check_out == payload.check_out
        && payload.total_minor.is_none_or(|t| t == existing.total_minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let channel_id = Uuid::new_v4();
        assert_eq!(SyncError::ChannelNotFound(channel_id).code(), "NOT_FOUND");
        assert_eq!(
            SyncError::SecretMissing(channel_id).code(),
            "CHANNEL_SECRET_MISSING"
        );
        assert_eq!(
            SyncError::Signature(SignatureError::SignatureMismatch).code(),
            "WEBHOOK_SIGNATURE_INVALID"
        );
        assert_eq!(
            SyncError::UnknownListing {
                channel_id,
                listing_id: "L-1".into()
            }
            .code(),
            "LISTING_NOT_MAPPED"
        );
    }

    #[test]
    fn same_dates_room_move_is_not_a_noop() {
        let stay = sample_stay();
        let payload = ReservationPayload {
            external_ref: "OTA-1".into(),
            listing_id: "L-2".into(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            guest_name: "Guest".into(),
            guest_phone: None,
            adults: None,
            children: None,
            total_minor: Some(stay.total_minor),
        };
        // Same dates and total, but the listing maps to a different room.
        assert!(!modification_is_noop(&stay, &payload, Uuid::new_v4()));
        // The same listing's room with nothing else changed is a duplicate.
        assert!(modification_is_noop(&stay, &payload, stay.room_id));
        // An absent total keeps the stored one.
        let without_total = ReservationPayload {
            total_minor: None,
            ..payload
        };
        assert!(modification_is_noop(&stay, &without_total, stay.room_id));
    }

    fn sample_stay() -> Stay {
        use time::macros::date;
        let now = time::OffsetDateTime::now_utc();
        Stay {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            rate_rule_id: None,
            booking_ref: "BK-2026-0002".into(),
            ref_year: 2026,
            ref_seq: 2,
            check_in: date!(2026 - 09 - 10),
            check_out: date!(2026 - 09 - 12),
            nights: 2,
            adults: 2,
            children: 0,
            total_minor: 1_000_000,
            paid_minor: 0,
            status: StayStatus::New,
            source: crate::entities::StaySource::Channel,
            channel_id: Some(Uuid::new_v4()),
            external_ref: Some("OTA-1".into()),
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn outcome_serializes_with_action_tag() {
        let outcome = InboundOutcome::Created {
            stay_id: Uuid::nil(),
            booking_ref: "BK-2026-0001".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap_or_default();
        assert_eq!(json["action"], "created");
        assert_eq!(json["booking_ref"], "BK-2026-0001");
    }
}
