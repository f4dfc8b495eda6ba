//! Outbound sync-job payload types.
//!
//! When a stay is created or cancelled, every other channel mapped to the
//! room receives one of these jobs telling it to close or re-open the dates
//! on its listing.

use serde::{Deserialize, Serialize};
use time::Date;

/// An outbound job targeting one external listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncJob {
    /// Mark the listing's dates unavailable (a stay was created).
    CloseDates(DateSpanJob),
    /// Mark the listing's dates available again (a stay was cancelled).
    OpenDates(DateSpanJob),
}

impl SyncJob {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncJob::CloseDates(_) => "close_dates",
            SyncJob::OpenDates(_) => "open_dates",
        }
    }

    pub fn span(&self) -> &DateSpanJob {
        match self {
            SyncJob::CloseDates(span) | SyncJob::OpenDates(span) => span,
        }
    }
}

/// The half-open date span and listing the job applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpanJob {
    pub listing_id: String,
    pub check_in: Date,
    pub check_out: Date,
    /// Booking reference of the originating stay, for channel-side tracing.
    #[serde(default)]
    pub booking_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn close_dates_serializes_with_op_tag() {
        let job = SyncJob::CloseDates(DateSpanJob {
            listing_id: "L-77".into(),
            check_in: date!(2026 - 09 - 01),
            check_out: date!(2026 - 09 - 04),
            booking_ref: Some("BK-2026-0042".into()),
        });
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""op":"close_dates""#));
        let back: SyncJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
        assert_eq!(back.kind(), "close_dates");
        assert_eq!(back.span().listing_id, "L-77");
    }
}
