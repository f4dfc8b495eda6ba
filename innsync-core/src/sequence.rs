//! Booking reference issuance under contention.
//!
//! References are year-scoped counters formatted `PREFIX-YYYY-NNNN`.
//! Issuance takes a transaction-scoped advisory lock keyed by the year, then
//! reads `max(ref_seq) + 1`; the lock is held until the enclosing
//! transaction commits or rolls back, so the next caller sees the freshly
//! inserted row. Different years never contend. Gaps from rollbacks are
//! acceptable; duplicates are not — a unique index on `(ref_year, ref_seq)`
//! backs the lock up.

use sqlx::{Postgres, Transaction};

/// Namespace for the advisory lock keys, so booking issuance never collides
/// with other advisory locks on the same database.
const LOCK_NAMESPACE: i64 = 0x494E;

/// One issued booking reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRef {
    pub year: i32,
    pub seq: i32,
    pub formatted: String,
}

/// Derive the advisory lock key for a year.
pub fn advisory_key(year: i32) -> i64 {
    (LOCK_NAMESPACE << 32) | i64::from(year)
}

/// Format a reference: zero-padded to four digits, wider when the counter
/// outgrows them.
pub fn format_ref(prefix: &str, year: i32, seq: i32) -> String {
    format!("{prefix}-{year}-{seq:04}")
}

/// Issue the next booking reference for `year` inside `tx`.
///
/// Must be called inside the same transaction that inserts the stay; the
/// advisory lock serializes concurrent callers for this year until that
/// transaction finishes.
pub async fn next_booking_ref(
    tx: &mut Transaction<'_, Postgres>,
    prefix: &str,
    year: i32,
) -> Result<BookingRef, sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(advisory_key(year))
        .execute(&mut **tx)
        .await?;

    let seq: i32 =
        sqlx::query_scalar("SELECT COALESCE(MAX(ref_seq), 0) + 1 FROM stays WHERE ref_year = $1")
            .bind(year)
            .fetch_one(&mut **tx)
            .await?;

    Ok(BookingRef {
        year,
        seq,
        formatted: format_ref(prefix, year, seq),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_four_digit_padding() {
        assert_eq!(format_ref("BK", 2026, 1), "BK-2026-0001");
        assert_eq!(format_ref("BK", 2026, 42), "BK-2026-0042");
        assert_eq!(format_ref("BK", 2026, 9999), "BK-2026-9999");
    }

    #[test]
    fn counter_outgrows_padding_without_truncation() {
        assert_eq!(format_ref("BK", 2026, 10_001), "BK-2026-10001");
    }

    #[test]
    fn lock_keys_differ_per_year_and_stay_in_namespace() {
        assert_ne!(advisory_key(2025), advisory_key(2026));
        assert_eq!(advisory_key(2026) >> 32, 0x494E);
        assert_eq!(advisory_key(2026) & 0xFFFF_FFFF, 2026);
    }
}
