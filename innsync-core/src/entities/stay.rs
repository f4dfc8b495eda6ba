use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::calendar::{DateRange, InvalidDateRange};

/// A confirmed or pending occupancy of one room by one guest over
/// `[check_in, check_out)`.
///
/// Stays are created and mutated only through the lifecycle operations and
/// never physically deleted; terminal statuses preserve audit history.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Stay {
    pub id: Uuid,
    pub property_id: Uuid,
    pub room_id: Uuid,
    pub guest_id: Uuid,
    pub rate_rule_id: Option<Uuid>,
    /// Human-readable booking identifier, `PREFIX-YYYY-NNNN`.
    pub booking_ref: String,
    pub ref_year: i32,
    pub ref_seq: i32,
    pub check_in: Date,
    pub check_out: Date,
    pub nights: i32,
    pub adults: i32,
    pub children: i32,
    /// Total price in minor currency units.
    pub total_minor: i64,
    pub paid_minor: i64,
    pub status: StayStatus,
    pub source: StaySource,
    pub channel_id: Option<Uuid>,
    pub external_ref: Option<String>,
    pub cancelled_at: Option<OffsetDateTime>,
    pub cancel_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Stay state machine:
/// `new -> confirmed -> checked_in -> checked_out`, with `cancelled`
/// (from new/confirmed) and `no_show` as alternate terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "stay_status")]
#[serde(rename_all = "snake_case")]
pub enum StayStatus {
    New,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    NoShow,
}

impl StayStatus {
    /// Terminal statuses reject any further modification.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StayStatus::CheckedOut | StayStatus::Cancelled | StayStatus::NoShow
        )
    }

    /// Whether a stay in this status still occupies room inventory for
    /// availability purposes.
    pub fn occupies_inventory(&self) -> bool {
        !matches!(self, StayStatus::Cancelled | StayStatus::NoShow)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, StayStatus::New | StayStatus::Confirmed)
    }

    pub fn can_check_in(&self) -> bool {
        matches!(self, StayStatus::New | StayStatus::Confirmed)
    }

    pub fn can_check_out(&self) -> bool {
        matches!(self, StayStatus::CheckedIn)
    }
}

impl std::fmt::Display for StayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StayStatus::New => "new",
            StayStatus::Confirmed => "confirmed",
            StayStatus::CheckedIn => "checked_in",
            StayStatus::CheckedOut => "checked_out",
            StayStatus::Cancelled => "cancelled",
            StayStatus::NoShow => "no_show",
        };
        write!(f, "{s}")
    }
}

/// Which sales surface created the stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "stay_source")]
#[serde(rename_all = "lowercase")]
pub enum StaySource {
    Direct,
    Widget,
    Channel,
}

/// Column set for inserting a new stay.
#[derive(Debug, Clone)]
pub struct StayInsert {
    pub property_id: Uuid,
    pub room_id: Uuid,
    pub guest_id: Uuid,
    pub rate_rule_id: Option<Uuid>,
    pub booking_ref: String,
    pub ref_year: i32,
    pub ref_seq: i32,
    pub check_in: Date,
    pub check_out: Date,
    pub adults: i32,
    pub children: i32,
    pub total_minor: i64,
    pub source: StaySource,
    pub channel_id: Option<Uuid>,
    pub external_ref: Option<String>,
}

const STAY_COLUMNS: &str = "id, property_id, room_id, guest_id, rate_rule_id, booking_ref, \
     ref_year, ref_seq, check_in, check_out, nights, adults, children, total_minor, \
     paid_minor, status, source, channel_id, external_ref, cancelled_at, cancel_reason, \
     created_at, updated_at";

impl Stay {
    pub fn range(&self) -> Result<DateRange, InvalidDateRange> {
        DateRange::new(self.check_in, self.check_out)
    }

    pub async fn get_by_id(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Stay>, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!("SELECT {STAY_COLUMNS} FROM stays WHERE id = $1"))
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    /// Look up a stay by its channel-side reservation identifier.
    pub async fn find_by_external_ref(
        exec: impl sqlx::PgExecutor<'_>,
        channel_id: Uuid,
        external_ref: &str,
    ) -> Result<Option<Stay>, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!(
            "SELECT {STAY_COLUMNS} FROM stays WHERE channel_id = $1 AND external_ref = $2"
        ))
        .bind(channel_id)
        .bind(external_ref)
        .fetch_optional(exec)
        .await
    }

    /// Inventory-occupying stays on a room overlapping the queried range,
    /// optionally excluding one stay (so a modify does not self-conflict).
    pub async fn overlapping(
        exec: impl sqlx::PgExecutor<'_>,
        room_id: Uuid,
        range: DateRange,
        exclude_stay_id: Option<Uuid>,
    ) -> Result<Vec<Stay>, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!(
            "SELECT {STAY_COLUMNS} FROM stays \
             WHERE room_id = $1 \
               AND status NOT IN ('cancelled', 'no_show') \
               AND check_in < $3 AND check_out > $2 \
               AND ($4::uuid IS NULL OR id <> $4)"
        ))
        .bind(room_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .bind(exclude_stay_id)
        .fetch_all(exec)
        .await
    }

    pub async fn insert(
        exec: impl sqlx::PgExecutor<'_>,
        insert: StayInsert,
    ) -> Result<Stay, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!(
            "INSERT INTO stays (property_id, room_id, guest_id, rate_rule_id, booking_ref, \
                 ref_year, ref_seq, check_in, check_out, nights, adults, children, \
                 total_minor, source, channel_id, external_ref) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9 - $8, $10, $11, $12, $13, $14, $15) \
             RETURNING {STAY_COLUMNS}"
        ))
        .bind(insert.property_id)
        .bind(insert.room_id)
        .bind(insert.guest_id)
        .bind(insert.rate_rule_id)
        .bind(insert.booking_ref)
        .bind(insert.ref_year)
        .bind(insert.ref_seq)
        .bind(insert.check_in)
        .bind(insert.check_out)
        .bind(insert.adults)
        .bind(insert.children)
        .bind(insert.total_minor)
        .bind(insert.source)
        .bind(insert.channel_id)
        .bind(insert.external_ref)
        .fetch_one(exec)
        .await
    }

    /// Rewrite the mutable booking fields after a modify.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_booking(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        room_id: Uuid,
        range: DateRange,
        adults: i32,
        children: i32,
        total_minor: i64,
        rate_rule_id: Option<Uuid>,
    ) -> Result<Stay, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!(
            "UPDATE stays SET room_id = $2, check_in = $3, check_out = $4, \
                 nights = $4 - $3, adults = $5, children = $6, total_minor = $7, \
                 rate_rule_id = $8, updated_at = now() \
             WHERE id = $1 \
             RETURNING {STAY_COLUMNS}"
        ))
        .bind(id)
        .bind(room_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .bind(adults)
        .bind(children)
        .bind(total_minor)
        .bind(rate_rule_id)
        .fetch_one(exec)
        .await
    }

    pub async fn update_status(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        status: StayStatus,
    ) -> Result<Stay, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!(
            "UPDATE stays SET status = $2, updated_at = now() \
             WHERE id = $1 RETURNING {STAY_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_one(exec)
        .await
    }

    pub async fn mark_cancelled(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Stay, sqlx::Error> {
        sqlx::query_as::<_, Stay>(&format!(
            "UPDATE stays SET status = 'cancelled', cancelled_at = now(), \
                 cancel_reason = $2, updated_at = now() \
             WHERE id = $1 RETURNING {STAY_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_one(exec)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_release_or_keep_inventory_correctly() {
        assert!(StayStatus::New.occupies_inventory());
        assert!(StayStatus::Confirmed.occupies_inventory());
        assert!(StayStatus::CheckedIn.occupies_inventory());
        // A checked-out stay is terminal but its past nights stay occupied.
        assert!(StayStatus::CheckedOut.occupies_inventory());
        assert!(!StayStatus::Cancelled.occupies_inventory());
        assert!(!StayStatus::NoShow.occupies_inventory());
    }

    #[test]
    fn cancel_only_from_new_or_confirmed() {
        assert!(StayStatus::New.can_cancel());
        assert!(StayStatus::Confirmed.can_cancel());
        assert!(!StayStatus::CheckedIn.can_cancel());
        assert!(!StayStatus::CheckedOut.can_cancel());
        assert!(!StayStatus::Cancelled.can_cancel());
        assert!(!StayStatus::NoShow.can_cancel());
    }

    #[test]
    fn check_in_and_out_guards() {
        assert!(StayStatus::New.can_check_in());
        assert!(StayStatus::Confirmed.can_check_in());
        assert!(!StayStatus::CheckedIn.can_check_in());
        assert!(StayStatus::CheckedIn.can_check_out());
        assert!(!StayStatus::Confirmed.can_check_out());
        assert!(!StayStatus::CheckedOut.can_check_out());
    }
}
