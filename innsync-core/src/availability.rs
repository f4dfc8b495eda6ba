//! Availability checking.
//!
//! A date is blocked when it is a night of the queried range and is covered
//! by any inventory-occupying stay or any block on the room. The pure
//! overlap math lives in [`blocked_dates`]; [`check_room`] loads the
//! occupied intervals and applies it.
//!
//! This check alone does not make "check then create" race-free; the create
//! path runs it inside the stay transaction and relies on the schema's
//! exclusion constraint as the backstop.

use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::calendar::{DateRange, InvalidDateRange};
use crate::entities::{Block, Stay};

/// Result of an availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Individual blocked calendar dates, ascending, deduplicated.
    pub blocked_dates: Vec<Date>,
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidDateRange),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Compute the blocked nights of `range` given the occupied intervals.
pub fn blocked_dates(range: DateRange, occupied: &[DateRange]) -> Vec<Date> {
    let mut dates: Vec<Date> = range
        .iter_nights()
        .filter(|night| occupied.iter().any(|o| o.contains(*night)))
        .collect();
    dates.dedup();
    dates
}

/// Check whether a room is free over `range`, optionally excluding one stay
/// so a modify does not conflict with itself.
pub async fn check_room(
    conn: &mut sqlx::PgConnection,
    room_id: Uuid,
    range: DateRange,
    exclude_stay_id: Option<Uuid>,
) -> Result<Availability, AvailabilityError> {
    let stays = Stay::overlapping(&mut *conn, room_id, range, exclude_stay_id).await?;
    let blocks = Block::overlapping(&mut *conn, room_id, range).await?;

    let mut occupied = Vec::with_capacity(stays.len() + blocks.len());
    for stay in &stays {
        occupied.push(stay.range()?);
    }
    for block in &blocks {
        occupied.push(block.range()?);
    }

    let blocked = blocked_dates(range, &occupied);
    Ok(Availability {
        available: blocked.is_empty(),
        blocked_dates: blocked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn range(check_in: Date, check_out: Date) -> DateRange {
        DateRange::new(check_in, check_out).unwrap()
    }

    #[test]
    fn free_range_has_no_blocked_dates() {
        let query = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        assert!(blocked_dates(query, &[]).is_empty());

        let elsewhere = range(date!(2026 - 09 - 10), date!(2026 - 09 - 12));
        assert!(blocked_dates(query, &[elsewhere]).is_empty());
    }

    #[test]
    fn partial_overlap_reports_only_the_contested_nights() {
        let query = range(date!(2026 - 09 - 01), date!(2026 - 09 - 05));
        let existing = range(date!(2026 - 09 - 03), date!(2026 - 09 - 08));
        assert_eq!(
            blocked_dates(query, &[existing]),
            vec![date!(2026 - 09 - 03), date!(2026 - 09 - 04)]
        );
    }

    #[test]
    fn checkout_day_of_an_existing_stay_is_free() {
        let query = range(date!(2026 - 09 - 04), date!(2026 - 09 - 06));
        let existing = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        assert!(blocked_dates(query, &[existing]).is_empty());
    }

    #[test]
    fn overlapping_stay_and_block_do_not_duplicate_dates() {
        let query = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        let stay = range(date!(2026 - 09 - 01), date!(2026 - 09 - 03));
        let block = range(date!(2026 - 09 - 02), date!(2026 - 09 - 04));
        assert_eq!(
            blocked_dates(query, &[stay, block]),
            vec![
                date!(2026 - 09 - 01),
                date!(2026 - 09 - 02),
                date!(2026 - 09 - 03),
            ]
        );
    }

    #[test]
    fn blocked_dates_are_sorted_ascending() {
        let query = range(date!(2026 - 09 - 01), date!(2026 - 09 - 10));
        // Later interval listed first; output order comes from the range scan.
        let late = range(date!(2026 - 09 - 08), date!(2026 - 09 - 09));
        let early = range(date!(2026 - 09 - 02), date!(2026 - 09 - 03));
        assert_eq!(
            blocked_dates(query, &[late, early]),
            vec![date!(2026 - 09 - 02), date!(2026 - 09 - 08)]
        );
    }
}
