//! Half-open date range arithmetic.
//!
//! Every stay and block occupies `[check_in, check_out)`: the guest sleeps
//! the nights of `check_in ..= check_out - 1` and the room is free again on
//! `check_out`. All interval math in the engine goes through [`DateRange`].

use serde::{Deserialize, Serialize};
use time::Date;

/// A validated half-open date interval `[check_in, check_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    check_in: Date,
    check_out: Date,
}

/// A date range whose check-out is not strictly after its check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid date range: check_out {check_out} must be after check_in {check_in}")]
pub struct InvalidDateRange {
    pub check_in: Date,
    pub check_out: Date,
}

impl DateRange {
    pub fn new(check_in: Date, check_out: Date) -> Result<Self, InvalidDateRange> {
        if check_out <= check_in {
            return Err(InvalidDateRange {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> Date {
        self.check_in
    }

    pub fn check_out(&self) -> Date {
        self.check_out
    }

    /// Number of nights, always >= 1.
    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).whole_days() as u32
    }

    /// Standard half-open overlap test:
    /// `a.check_in < b.check_out && a.check_out > b.check_in`.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }

    /// Whether `date` is a night of this range (check-out day excluded).
    pub fn contains(&self, date: Date) -> bool {
        date >= self.check_in && date < self.check_out
    }

    /// Iterate the nights of the range in ascending order.
    pub fn iter_nights(&self) -> Nights {
        Nights {
            next: Some(self.check_in),
            end: self.check_out,
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Iterator over the nights of a [`DateRange`].
pub struct Nights {
    next: Option<Date>,
    end: Date,
}

impl Iterator for Nights {
    type Item = Date;

    fn next(&mut self) -> Option<Date> {
        let current = self.next.filter(|d| *d < self.end)?;
        self.next = current.next_day();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn range(check_in: Date, check_out: Date) -> DateRange {
        DateRange::new(check_in, check_out).unwrap()
    }

    #[test]
    fn rejects_inverted_and_zero_length_ranges() {
        assert!(DateRange::new(date!(2026 - 09 - 04), date!(2026 - 09 - 01)).is_err());
        assert!(DateRange::new(date!(2026 - 09 - 01), date!(2026 - 09 - 01)).is_err());
        assert!(DateRange::new(date!(2026 - 09 - 01), date!(2026 - 09 - 02)).is_ok());
    }

    #[test]
    fn nights_counts_half_open() {
        let r = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        assert_eq!(r.nights(), 3);
        assert_eq!(
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 02)).nights(),
            1
        );
    }

    #[test]
    fn back_to_back_stays_do_not_overlap() {
        let a = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        let b = range(date!(2026 - 09 - 04), date!(2026 - 09 - 07));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn overlapping_by_one_night_is_detected() {
        let a = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        let b = range(date!(2026 - 09 - 03), date!(2026 - 09 - 06));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn containment_counts_nights_not_checkout_day() {
        let a = range(date!(2026 - 09 - 01), date!(2026 - 09 - 10));
        let inner = range(date!(2026 - 09 - 03), date!(2026 - 09 - 05));
        assert!(a.overlaps(&inner));
        assert!(a.contains(date!(2026 - 09 - 01)));
        assert!(a.contains(date!(2026 - 09 - 09)));
        assert!(!a.contains(date!(2026 - 09 - 10)));
    }

    #[test]
    fn iter_nights_is_ascending_and_excludes_checkout() {
        let r = range(date!(2026 - 09 - 01), date!(2026 - 09 - 04));
        let nights: Vec<Date> = r.iter_nights().collect();
        assert_eq!(
            nights,
            vec![
                date!(2026 - 09 - 01),
                date!(2026 - 09 - 02),
                date!(2026 - 09 - 03),
            ]
        );
    }

    #[test]
    fn iter_nights_crosses_month_and_year_boundaries() {
        let r = range(date!(2026 - 12 - 30), date!(2027 - 01 - 02));
        let nights: Vec<Date> = r.iter_nights().collect();
        assert_eq!(
            nights,
            vec![
                date!(2026 - 12 - 30),
                date!(2026 - 12 - 31),
                date!(2027 - 01 - 01),
            ]
        );
    }
}
