use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::calendar::{DateRange, InvalidDateRange};

/// An owner-created unavailable interval on a room not tied to any stay
/// (maintenance, manual hold). Same half-open interval semantics as a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Block {
    pub id: Uuid,
    pub property_id: Uuid,
    pub room_id: Uuid,
    pub check_in: Date,
    pub check_out: Date,
    pub reason: Option<String>,
}

impl Block {
    pub fn range(&self) -> Result<DateRange, InvalidDateRange> {
        DateRange::new(self.check_in, self.check_out)
    }

    /// Blocks on a room overlapping the queried half-open range.
    pub async fn overlapping(
        exec: impl sqlx::PgExecutor<'_>,
        room_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Block>, sqlx::Error> {
        sqlx::query_as::<_, Block>(
            "SELECT id, property_id, room_id, check_in, check_out, reason \
             FROM blocks \
             WHERE room_id = $1 AND check_in < $3 AND check_out > $2",
        )
        .bind(room_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .fetch_all(exec)
        .await
    }
}
