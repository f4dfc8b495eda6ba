//! Minimal iCal feed parser for polled channel calendars.
//!
//! The feeds innsync consumes are flat `BEGIN:VEVENT` / `END:VEVENT` blocks
//! carrying `UID`, `DTSTART`, and `DTEND` lines. Property parameters
//! (`DTSTART;VALUE=DATE:20260901`) are tolerated and ignored. Dates arrive
//! either as `YYYYMMDD` or `YYYYMMDDTHHMMSSZ` and are normalized to plain
//! calendar dates before comparison.

use time::Date;

/// One reservation entry from a polled feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Stable channel-side identifier (the `UID` line).
    pub uid: String,
    pub check_in: Date,
    pub check_out: Date,
}

/// Errors for a single malformed VEVENT block.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("VEVENT missing required field {field}")]
    MissingField { field: &'static str },
    #[error("unparseable date value {value:?}")]
    BadDate { value: String },
    #[error("VEVENT {uid} has DTEND {check_out} not after DTSTART {check_in}")]
    InvertedRange {
        uid: String,
        check_in: Date,
        check_out: Date,
    },
}

/// Result of parsing a whole feed.
///
/// A malformed block must not abort the rest of the feed, so bad blocks are
/// collected separately from good entries.
#[derive(Debug, Default)]
pub struct FeedParse {
    pub entries: Vec<FeedEntry>,
    pub errors: Vec<FeedError>,
}

/// Parse an iCal-style feed into entries, skipping malformed blocks.
pub fn parse_feed(input: &str) -> FeedParse {
    let mut parse = FeedParse::default();
    let mut block: Option<RawEvent> = None;

    for raw_line in input.lines() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("BEGIN:VEVENT") {
            block = Some(RawEvent::default());
            continue;
        }
        if line.eq_ignore_ascii_case("END:VEVENT") {
            if let Some(raw) = block.take() {
                match raw.finish() {
                    Ok(entry) => parse.entries.push(entry),
                    Err(e) => parse.errors.push(e),
                }
            }
            continue;
        }
        let Some(raw) = block.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        // Strip property parameters: "DTSTART;VALUE=DATE" -> "DTSTART".
        let name = key.split(';').next().unwrap_or(key);
        match name.to_ascii_uppercase().as_str() {
            "UID" => raw.uid = Some(value.to_owned()),
            "DTSTART" => raw.dtstart = Some(value.to_owned()),
            "DTEND" => raw.dtend = Some(value.to_owned()),
            _ => {}
        }
    }

    parse
}

/// Normalize an iCal date value (`YYYYMMDD` or `YYYYMMDDTHHMMSSZ`) to a
/// calendar date.
pub fn normalize_date(value: &str) -> Result<Date, FeedError> {
    let digits = match value.find('T') {
        Some(pos) => &value[..pos],
        None => value,
    };
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FeedError::BadDate {
            value: value.to_owned(),
        });
    }
    let bad = || FeedError::BadDate {
        value: value.to_owned(),
    };
    let year: i32 = digits[..4].parse().map_err(|_| bad())?;
    let month: u8 = digits[4..6].parse().map_err(|_| bad())?;
    let day: u8 = digits[6..8].parse().map_err(|_| bad())?;
    let month = time::Month::try_from(month).map_err(|_| bad())?;
    Date::from_calendar_date(year, month, day).map_err(|_| bad())
}

#[derive(Default)]
struct RawEvent {
    uid: Option<String>,
    dtstart: Option<String>,
    dtend: Option<String>,
}

impl RawEvent {
    fn finish(self) -> Result<FeedEntry, FeedError> {
        let uid = self.uid.ok_or(FeedError::MissingField { field: "UID" })?;
        let dtstart = self
            .dtstart
            .ok_or(FeedError::MissingField { field: "DTSTART" })?;
        let dtend = self
            .dtend
            .ok_or(FeedError::MissingField { field: "DTEND" })?;
        let check_in = normalize_date(&dtstart)?;
        let check_out = normalize_date(&dtend)?;
        if check_out <= check_in {
            return Err(FeedError::InvertedRange {
                uid,
                check_in,
                check_out,
            });
        }
        Ok(FeedEntry {
            uid,
            check_in,
            check_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
        PRODID:-//Channel//EN\r\n\
        BEGIN:VEVENT\r\n\
        UID:bcom-12345\r\n\
        DTSTART;VALUE=DATE:20260901\r\n\
        DTEND;VALUE=DATE:20260904\r\n\
        SUMMARY:Reserved\r\n\
        END:VEVENT\r\n\
        BEGIN:VEVENT\r\n\
        UID:bcom-12346\r\n\
        DTSTART:20261224T140000Z\r\n\
        DTEND:20261226T110000Z\r\n\
        END:VEVENT\r\n\
        END:VCALENDAR\r\n";

    #[test]
    fn parses_both_date_forms() {
        let parse = parse_feed(FEED);
        assert!(parse.errors.is_empty());
        assert_eq!(parse.entries.len(), 2);
        assert_eq!(
            parse.entries[0],
            FeedEntry {
                uid: "bcom-12345".into(),
                check_in: date!(2026 - 09 - 01),
                check_out: date!(2026 - 09 - 04),
            }
        );
        // Timestamped form is normalized to the calendar date.
        assert_eq!(parse.entries[1].check_in, date!(2026 - 12 - 24));
        assert_eq!(parse.entries[1].check_out, date!(2026 - 12 - 26));
    }

    #[test]
    fn malformed_block_does_not_abort_the_rest() {
        let feed = "BEGIN:VEVENT\n\
            UID:broken\n\
            DTSTART:2026090\n\
            DTEND:20260904\n\
            END:VEVENT\n\
            BEGIN:VEVENT\n\
            UID:ok\n\
            DTSTART:20260910\n\
            DTEND:20260912\n\
            END:VEVENT\n";
        let parse = parse_feed(feed);
        assert_eq!(parse.entries.len(), 1);
        assert_eq!(parse.entries[0].uid, "ok");
        assert_eq!(parse.errors.len(), 1);
        assert!(matches!(parse.errors[0], FeedError::BadDate { .. }));
    }

    #[test]
    fn missing_uid_is_reported() {
        let feed = "BEGIN:VEVENT\nDTSTART:20260910\nDTEND:20260912\nEND:VEVENT\n";
        let parse = parse_feed(feed);
        assert!(parse.entries.is_empty());
        assert_eq!(
            parse.errors[0],
            FeedError::MissingField { field: "UID" }
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let feed = "BEGIN:VEVENT\nUID:x\nDTSTART:20260912\nDTEND:20260910\nEND:VEVENT\n";
        let parse = parse_feed(feed);
        assert!(matches!(parse.errors[0], FeedError::InvertedRange { .. }));
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize_date("not-a-date").is_err());
        assert!(normalize_date("20261301").is_err());
        assert!(normalize_date("20260230").is_err());
    }
}
