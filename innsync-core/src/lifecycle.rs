//! Stay lifecycle operations.
//!
//! Every operation runs inside one transaction: guards, entity mutation,
//! exactly one audit row, and (for create/cancel) the pending outbox rows
//! for outbound channel sync. The lifecycle event is emitted only after the
//! transaction commits; it is a wakeup for the sync worker, not the source
//! of truth.

use serde_json::json;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::availability::{self, AvailabilityError};
use crate::calendar::{DateRange, InvalidDateRange};
use crate::entities::stay::StayInsert;
use crate::entities::{
    ChannelMapping, Guest, HistoryAction, PricingRule, Room, RoomStatus, Stay, StayHistory,
    StaySource, StayStatus, SyncLogEntry,
};
use crate::events::{EventSenders, StayEvent};
use crate::rates::{self, RateError};
use crate::sequence;
use innsync_sdk::objects::{DateSpanJob, SyncJob};

/// Errors raised by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum StayError {
    #[error(transparent)]
    Validation(#[from] InvalidDateRange),
    #[error("room {0} not found")]
    RoomNotFound(Uuid),
    #[error("room {room_id} is not bookable (status {status})")]
    RoomNotBookable { room_id: Uuid, status: RoomStatus },
    #[error("guest {0} not found")]
    GuestNotFound(Uuid),
    #[error("stay {0} not found")]
    StayNotFound(Uuid),
    /// The room already has an occupying stay or block on these dates.
    #[error("room {room_id} is not available on {blocked_dates:?}")]
    Overbooking {
        room_id: Uuid,
        blocked_dates: Vec<Date>,
    },
    #[error(transparent)]
    Rate(#[from] RateError),
    /// The stay reached a terminal status and rejects modification.
    #[error("stay {stay_id} is immutable in status {status}")]
    Immutable { stay_id: Uuid, status: StayStatus },
    #[error("cannot {action} stay {stay_id} from status {status}")]
    InvalidTransition {
        stay_id: Uuid,
        status: StayStatus,
        action: &'static str,
    },
    #[error("a stay with external reference {external_ref:?} already exists")]
    AlreadyExists { external_ref: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AvailabilityError> for StayError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidRange(e) => StayError::Validation(e),
            AvailabilityError::Database(e) => StayError::Database(e),
        }
    }
}

impl StayError {
    /// Stable machine-readable code for API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            StayError::Validation(_) => "INVALID_DATE_RANGE",
            StayError::RoomNotFound(_)
            | StayError::GuestNotFound(_)
            | StayError::StayNotFound(_) => "NOT_FOUND",
            StayError::RoomNotBookable { .. } => "ROOM_NOT_BOOKABLE",
            StayError::Overbooking { .. } => "OVERBOOKING_DETECTED",
            StayError::Rate(e) => e.code(),
            StayError::Immutable { .. } => "STAY_IMMUTABLE",
            StayError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            StayError::AlreadyExists { .. } => "ALREADY_EXISTS",
            StayError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Guest selector for stay creation: an existing guest id, or contact
/// details resolved by find-by-phone-or-create.
#[derive(Debug, Clone)]
pub enum GuestRef {
    Id(Uuid),
    Contact {
        full_name: String,
        phone: Option<String>,
        email: Option<String>,
    },
}

/// Input for creating a stay.
#[derive(Debug, Clone)]
pub struct CreateStay {
    pub property_id: Uuid,
    pub room_id: Uuid,
    pub guest: GuestRef,
    pub check_in: Date,
    pub check_out: Date,
    pub adults: i32,
    pub children: i32,
    /// Pin a specific pricing rule, bypassing priority selection.
    pub rate_rule_id: Option<Uuid>,
    /// Channel-computed total overriding local rate resolution.
    pub total_override_minor: Option<i64>,
    pub source: StaySource,
    pub channel_id: Option<Uuid>,
    pub external_ref: Option<String>,
    pub actor: String,
}

/// Input for modifying a stay; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ModifyStay {
    pub room_id: Option<Uuid>,
    pub check_in: Option<Date>,
    pub check_out: Option<Date>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub total_override_minor: Option<i64>,
    pub actor: String,
}

/// Full stay record with its sub-objects, returned by every operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StayDetails {
    pub stay: Stay,
    pub room: Room,
    pub guest: Guest,
    pub history: Vec<StayHistory>,
}

/// The lifecycle orchestrator. Cloneable; all state is the pool and the
/// event senders.
#[derive(Clone)]
pub struct StayService {
    pool: PgPool,
    events: EventSenders,
    ref_prefix: String,
}

impl StayService {
    pub fn new(pool: PgPool, events: EventSenders, ref_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            events,
            ref_prefix: ref_prefix.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a stay: availability check, guest resolution, rate
    /// resolution, booking reference issuance, insert, audit row, and
    /// outbox rows, all in one transaction.
    pub async fn create(&self, input: CreateStay) -> Result<StayDetails, StayError> {
        let range = DateRange::new(input.check_in, input.check_out)?;
        let mut tx = self.pool.begin().await?;

        let room = Room::get_by_id(&mut *tx, input.room_id)
            .await?
            .ok_or(StayError::RoomNotFound(input.room_id))?;
        if !room.is_bookable() {
            return Err(StayError::RoomNotBookable {
                room_id: room.id,
                status: room.status,
            });
        }

        let availability = availability::check_room(&mut tx, room.id, range, None).await?;
        if !availability.available {
            return Err(StayError::Overbooking {
                room_id: room.id,
                blocked_dates: availability.blocked_dates,
            });
        }

        let guest = self.resolve_guest(&mut tx, input.property_id, &input.guest).await?;

        let total_minor = match input.total_override_minor {
            Some(total) => total,
            None => {
                let rules = match input.rate_rule_id {
                    Some(rule_id) => {
                        Vec::from_iter(PricingRule::get_by_id(&mut *tx, rule_id).await?)
                    }
                    None => {
                        PricingRule::active_for_property(&mut *tx, input.property_id).await?
                    }
                };
                rates::resolve(&room, &rules, range, input.rate_rule_id)?.total_minor
            }
        };

        let year = OffsetDateTime::now_utc().year();
        let booking_ref = sequence::next_booking_ref(&mut tx, &self.ref_prefix, year).await?;

        let stay = Stay::insert(
            &mut *tx,
            StayInsert {
                property_id: input.property_id,
                room_id: room.id,
                guest_id: guest.id,
                rate_rule_id: input.rate_rule_id,
                booking_ref: booking_ref.formatted,
                ref_year: booking_ref.year,
                ref_seq: booking_ref.seq,
                check_in: range.check_in(),
                check_out: range.check_out(),
                adults: input.adults,
                children: input.children,
                total_minor,
                source: input.source,
                channel_id: input.channel_id,
                external_ref: input.external_ref.clone(),
            },
        )
        .await
        .map_err(|e| map_insert_error(e, room.id, range, input.external_ref.as_deref()))?;

        StayHistory::append(
            &mut *tx,
            stay.id,
            HistoryAction::Created,
            json!({
                "booking_ref": stay.booking_ref,
                "room_id": stay.room_id,
                "check_in": stay.check_in.to_string(),
                "check_out": stay.check_out.to_string(),
                "total_minor": stay.total_minor,
            }),
            &input.actor,
        )
        .await?;

        self.write_outbox(&mut tx, &stay, close_job, input.channel_id).await?;

        tx.commit().await?;

        self.emit(StayEvent::Created {
            stay_id: stay.id,
            property_id: stay.property_id,
            room_id: stay.room_id,
            guest_id: stay.guest_id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            total_minor: stay.total_minor,
            booking_ref: stay.booking_ref.clone(),
            actor: input.actor,
        })
        .await;

        self.details_for(stay, room, guest).await
    }

    /// Modify a stay's room, dates, occupants, or price. Re-runs the
    /// availability check (excluding the stay itself) when room or dates
    /// change, and re-resolves the rate when dates change.
    pub async fn modify(&self, stay_id: Uuid, input: ModifyStay) -> Result<StayDetails, StayError> {
        let mut tx = self.pool.begin().await?;

        let stay = Stay::get_by_id(&mut *tx, stay_id)
            .await?
            .ok_or(StayError::StayNotFound(stay_id))?;
        if stay.status.is_terminal() {
            return Err(StayError::Immutable {
                stay_id,
                status: stay.status,
            });
        }

        let new_room_id = input.room_id.unwrap_or(stay.room_id);
        let new_range = DateRange::new(
            input.check_in.unwrap_or(stay.check_in),
            input.check_out.unwrap_or(stay.check_out),
        )?;
        let room_changed = new_room_id != stay.room_id;
        let dates_changed =
            new_range.check_in() != stay.check_in || new_range.check_out() != stay.check_out;

        let room = Room::get_by_id(&mut *tx, new_room_id)
            .await?
            .ok_or(StayError::RoomNotFound(new_room_id))?;
        if room_changed && !room.is_bookable() {
            return Err(StayError::RoomNotBookable {
                room_id: room.id,
                status: room.status,
            });
        }

        if room_changed || dates_changed {
            let availability =
                availability::check_room(&mut tx, new_room_id, new_range, Some(stay.id)).await?;
            if !availability.available {
                return Err(StayError::Overbooking {
                    room_id: new_room_id,
                    blocked_dates: availability.blocked_dates,
                });
            }
        }

        let new_total = match input.total_override_minor {
            Some(total) => total,
            None if dates_changed || room_changed => {
                let rules = match stay.rate_rule_id {
                    Some(rule_id) => {
                        Vec::from_iter(PricingRule::get_by_id(&mut *tx, rule_id).await?)
                    }
                    None => PricingRule::active_for_property(&mut *tx, stay.property_id).await?,
                };
                rates::resolve(&room, &rules, new_range, stay.rate_rule_id)?.total_minor
            }
            None => stay.total_minor,
        };

        let new_adults = input.adults.unwrap_or(stay.adults);
        let new_children = input.children.unwrap_or(stay.children);

        let mut changes = serde_json::Map::new();
        record_change(&mut changes, "room_id", &stay.room_id, &new_room_id);
        record_change(
            &mut changes,
            "check_in",
            &stay.check_in.to_string(),
            &new_range.check_in().to_string(),
        );
        record_change(
            &mut changes,
            "check_out",
            &stay.check_out.to_string(),
            &new_range.check_out().to_string(),
        );
        record_change(&mut changes, "adults", &stay.adults, &new_adults);
        record_change(&mut changes, "children", &stay.children, &new_children);
        record_change(&mut changes, "total_minor", &stay.total_minor, &new_total);

        let updated = Stay::update_booking(
            &mut *tx,
            stay.id,
            new_room_id,
            new_range,
            new_adults,
            new_children,
            new_total,
            stay.rate_rule_id,
        )
        .await
        .map_err(|e| map_insert_error(e, new_room_id, new_range, stay.external_ref.as_deref()))?;

        StayHistory::append(
            &mut *tx,
            updated.id,
            HistoryAction::Modified,
            serde_json::Value::Object(changes),
            &input.actor,
        )
        .await?;

        tx.commit().await?;

        let guest = self.load_guest(updated.guest_id).await?;
        self.details_for(updated, room, guest).await
    }

    /// Cancel a stay (only from `new` or `confirmed`) and fan the freed
    /// dates back out to every mapped channel.
    pub async fn cancel(
        &self,
        stay_id: Uuid,
        reason: Option<String>,
        actor: String,
    ) -> Result<StayDetails, StayError> {
        let mut tx = self.pool.begin().await?;

        let stay = Stay::get_by_id(&mut *tx, stay_id)
            .await?
            .ok_or(StayError::StayNotFound(stay_id))?;
        if !stay.status.can_cancel() {
            return Err(StayError::InvalidTransition {
                stay_id,
                status: stay.status,
                action: "cancel",
            });
        }

        let updated = Stay::mark_cancelled(&mut *tx, stay.id, reason.as_deref()).await?;

        StayHistory::append(
            &mut *tx,
            updated.id,
            HistoryAction::Cancelled,
            json!({
                "status": { "old": stay.status, "new": updated.status },
                "reason": reason,
            }),
            &actor,
        )
        .await?;

        self.write_outbox(&mut tx, &updated, open_job, None).await?;

        tx.commit().await?;

        self.emit(StayEvent::Cancelled {
            stay_id: updated.id,
            property_id: updated.property_id,
            room_id: updated.room_id,
            check_in: updated.check_in,
            check_out: updated.check_out,
            reason,
            actor,
        })
        .await;

        self.details(updated.id).await
    }

    /// Check a guest in (only from `new` or `confirmed`).
    pub async fn check_in(&self, stay_id: Uuid, actor: String) -> Result<StayDetails, StayError> {
        self.transition(
            stay_id,
            actor,
            "check_in",
            StayStatus::CheckedIn,
            HistoryAction::CheckedIn,
            StayStatus::can_check_in,
        )
        .await
    }

    /// Check a guest out (only from `checked_in`).
    pub async fn check_out(&self, stay_id: Uuid, actor: String) -> Result<StayDetails, StayError> {
        self.transition(
            stay_id,
            actor,
            "check_out",
            StayStatus::CheckedOut,
            HistoryAction::CheckedOut,
            StayStatus::can_check_out,
        )
        .await
    }

    async fn transition(
        &self,
        stay_id: Uuid,
        actor: String,
        action: &'static str,
        to: StayStatus,
        history_action: HistoryAction,
        guard: fn(&StayStatus) -> bool,
    ) -> Result<StayDetails, StayError> {
        let mut tx = self.pool.begin().await?;

        let stay = Stay::get_by_id(&mut *tx, stay_id)
            .await?
            .ok_or(StayError::StayNotFound(stay_id))?;
        if !guard(&stay.status) {
            return Err(StayError::InvalidTransition {
                stay_id,
                status: stay.status,
                action,
            });
        }

        let updated = Stay::update_status(&mut *tx, stay.id, to).await?;

        StayHistory::append(
            &mut *tx,
            updated.id,
            history_action,
            json!({ "status": { "old": stay.status, "new": updated.status } }),
            &actor,
        )
        .await?;

        tx.commit().await?;

        self.emit(StayEvent::StatusChanged {
            stay_id: updated.id,
            property_id: updated.property_id,
            room_id: updated.room_id,
            old_status: stay.status,
            new_status: updated.status,
            actor,
        })
        .await;

        self.details(updated.id).await
    }

    /// Load the full stay record with its sub-objects.
    pub async fn details(&self, stay_id: Uuid) -> Result<StayDetails, StayError> {
        let stay = Stay::get_by_id(&self.pool, stay_id)
            .await?
            .ok_or(StayError::StayNotFound(stay_id))?;
        let room = Room::get_by_id(&self.pool, stay.room_id)
            .await?
            .ok_or(StayError::RoomNotFound(stay.room_id))?;
        let guest = self.load_guest(stay.guest_id).await?;
        self.details_for(stay, room, guest).await
    }

    async fn details_for(
        &self,
        stay: Stay,
        room: Room,
        guest: Guest,
    ) -> Result<StayDetails, StayError> {
        let history = StayHistory::for_stay(&self.pool, stay.id).await?;
        Ok(StayDetails {
            stay,
            room,
            guest,
            history,
        })
    }

    async fn load_guest(&self, guest_id: Uuid) -> Result<Guest, StayError> {
        Guest::get_by_id(&self.pool, guest_id)
            .await?
            .ok_or(StayError::GuestNotFound(guest_id))
    }

    async fn resolve_guest(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        property_id: Uuid,
        guest: &GuestRef,
    ) -> Result<Guest, StayError> {
        match guest {
            GuestRef::Id(id) => Guest::get_by_id(&mut **tx, *id)
                .await?
                .ok_or(StayError::GuestNotFound(*id)),
            GuestRef::Contact {
                full_name,
                phone,
                email,
            } => {
                if let Some(phone) = phone.as_deref() {
                    if let Some(existing) =
                        Guest::find_by_phone(&mut **tx, property_id, phone).await?
                    {
                        return Ok(existing);
                    }
                }
                Ok(Guest::insert(
                    &mut **tx,
                    property_id,
                    full_name,
                    phone.as_deref(),
                    email.as_deref(),
                )
                .await?)
            }
        }
    }

    /// Insert one pending outbox row per fan-out target, inside the stay
    /// transaction. `exclude_channel` skips the channel an inbound event
    /// came from.
    async fn write_outbox(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        stay: &Stay,
        job: fn(&Stay, &ChannelMapping) -> SyncJob,
        exclude_channel: Option<Uuid>,
    ) -> Result<(), StayError> {
        let targets = ChannelMapping::fanout_targets(
            &mut **tx,
            stay.property_id,
            stay.room_id,
            exclude_channel.or(stay.channel_id),
        )
        .await?;

        for (mapping, channel) in targets {
            let payload = job(stay, &mapping);
            SyncLogEntry::insert_outbound_pending(
                &mut **tx,
                stay.property_id,
                channel.id,
                stay.id,
                stay.room_id,
                payload.kind(),
                serde_json::to_value(&payload).unwrap_or_default(),
            )
            .await?;
        }
        Ok(())
    }

    /// Best-effort wakeup; a failed send is logged, never propagated, since
    /// the outbox rows are already durable.
    async fn emit(&self, event: StayEvent) {
        if let Err(e) = self.events.stay_events.send(event).await {
            tracing::error!(error = %e, "failed to emit stay lifecycle event");
        }
    }
}

fn close_job(stay: &Stay, mapping: &ChannelMapping) -> SyncJob {
    SyncJob::CloseDates(DateSpanJob {
        listing_id: mapping.external_listing_id.clone(),
        check_in: stay.check_in,
        check_out: stay.check_out,
        booking_ref: Some(stay.booking_ref.clone()),
    })
}

fn open_job(stay: &Stay, mapping: &ChannelMapping) -> SyncJob {
    SyncJob::OpenDates(DateSpanJob {
        listing_id: mapping.external_listing_id.clone(),
        check_in: stay.check_in,
        check_out: stay.check_out,
        booking_ref: Some(stay.booking_ref.clone()),
    })
}

fn record_change<T: serde::Serialize + PartialEq>(
    changes: &mut serde_json::Map<String, serde_json::Value>,
    field: &str,
    old: &T,
    new: &T,
) {
    if old != new {
        changes.insert(
            field.to_owned(),
            json!({
                "old": old,
                "new": new,
            }),
        );
    }
}

/// Map a Postgres exclusion violation (23P01) on the stays no-overlap
/// constraint to the overbooking conflict, and a unique violation on the
/// external reference to the duplicate error. Everything else passes
/// through.
fn map_insert_error(
    err: sqlx::Error,
    room_id: Uuid,
    range: DateRange,
    external_ref: Option<&str>,
) -> StayError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // exclusion_violation: a concurrent commit won the race.
            Some("23P01") => {
                return StayError::Overbooking {
                    room_id,
                    blocked_dates: range.iter_nights().collect(),
                };
            }
            // unique_violation on (channel_id, external_ref).
            Some("23505") if db.constraint() == Some("stays_channel_id_external_ref_key") => {
                return StayError::AlreadyExists {
                    external_ref: external_ref.unwrap_or_default().to_owned(),
                };
            }
            _ => {}
        }
    }
    StayError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn record_change_skips_unchanged_fields() {
        let mut changes = serde_json::Map::new();
        record_change(&mut changes, "adults", &2, &2);
        record_change(&mut changes, "children", &0, &1);
        assert!(!changes.contains_key("adults"));
        assert_eq!(changes["children"]["old"], json!(0));
        assert_eq!(changes["children"]["new"], json!(1));
    }

    #[test]
    fn error_codes_are_stable() {
        let err = StayError::Overbooking {
            room_id: Uuid::new_v4(),
            blocked_dates: vec![date!(2026 - 09 - 01)],
        };
        assert_eq!(err.code(), "OVERBOOKING_DETECTED");

        let err = StayError::Immutable {
            stay_id: Uuid::new_v4(),
            status: StayStatus::CheckedOut,
        };
        assert_eq!(err.code(), "STAY_IMMUTABLE");

        let err = StayError::InvalidTransition {
            stay_id: Uuid::new_v4(),
            status: StayStatus::CheckedIn,
            action: "cancel",
        };
        assert_eq!(err.code(), "INVALID_STATUS_TRANSITION");

        let err = StayError::Rate(RateError::NotApplicable {
            date: date!(2026 - 09 - 01),
        });
        assert_eq!(err.code(), "RATE_NOT_APPLICABLE");
    }

    #[test]
    fn close_and_open_jobs_carry_the_listing_and_span() {
        let stay_id = Uuid::new_v4();
        let stay = sample_stay(stay_id);
        let mapping = ChannelMapping {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            room_id: stay.room_id,
            external_listing_id: "L-77".into(),
        };
        let close = close_job(&stay, &mapping);
        assert_eq!(close.kind(), "close_dates");
        assert_eq!(close.span().listing_id, "L-77");
        assert_eq!(close.span().check_in, stay.check_in);

        let open = open_job(&stay, &mapping);
        assert_eq!(open.kind(), "open_dates");
        assert_eq!(open.span().booking_ref.as_deref(), Some("BK-2026-0001"));
    }

    fn sample_stay(id: Uuid) -> Stay {
        let now = OffsetDateTime::now_utc();
        Stay {
            id,
            property_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            rate_rule_id: None,
            booking_ref: "BK-2026-0001".into(),
            ref_year: 2026,
            ref_seq: 1,
            check_in: date!(2026 - 09 - 01),
            check_out: date!(2026 - 09 - 04),
            nights: 3,
            adults: 2,
            children: 0,
            total_minor: 1_500_000,
            paid_minor: 0,
            status: StayStatus::New,
            source: StaySource::Direct,
            channel_id: None,
            external_ref: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
