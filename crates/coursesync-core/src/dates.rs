//! Lenient ISO-8601 timestamp normalization for LMS payloads.
//!
//! Remote due dates arrive as `2025-05-01T12:00:00Z`, sometimes without the
//! trailing zone marker and occasionally with fractional seconds or an explicit
//! offset. Stored instants are UTC; the offset as written is available for
//! calendar-field checks.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Parse a loosely formatted ISO-8601 timestamp into UTC.
///
/// One trailing `Z` is stripped and the remainder is read as UTC wall time.
/// Returns `None` for empty input or anything that is not a calendar
/// timestamp; this function never fails loudly.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_date_with_offset(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Like [`parse_date`], but keeps an explicit offset as written.
///
/// Calendar fields (`year()` and friends) then describe the wall time the LMS
/// sent, so `2025-12-31T20:00:00-05:00` is still in 2025. Inputs without an
/// offset come back at `+00:00`.
pub fn parse_date_with_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.strip_suffix('Z').unwrap_or(raw);
    if trimmed.is_empty() {
        return None;
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// [`parse_date_with_offset`] for optional payload fields.
pub fn parse_optional_date(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    raw.and_then(parse_date_with_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};
    use proptest::prelude::*;

    #[test]
    fn none_and_empty() {
        assert_eq!(parse_optional_date(None), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("Z"), None);
    }

    #[test]
    fn zone_marker_is_optional() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_date("2025-05-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_date("2025-05-01T12:00:00"), Some(expected));
    }

    #[test]
    fn only_one_marker_is_stripped() {
        assert_eq!(parse_date("2025-05-01T12:00:00ZZ"), None);
    }

    #[test]
    fn invalid_strings() {
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("2025-13-01T00:00:00"), None);
        assert_eq!(parse_date("2025-02-30T00:00:00Z"), None);
    }

    #[test]
    fn fractional_seconds_and_offsets() {
        let dt = parse_date("2025-01-31T23:59:59.500Z").unwrap();
        assert_eq!(dt.second(), 59);
        assert_eq!(dt.nanosecond(), 500_000_000);

        let shifted = parse_date("2025-01-31T22:00:00-02:00").unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn offset_keeps_written_calendar_fields() {
        let written = parse_date_with_offset("2025-12-31T20:00:00-05:00").unwrap();
        assert_eq!((written.year(), written.month(), written.day()), (2025, 12, 31));
        assert_eq!(
            written.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap()
        );

        let plain = parse_optional_date(Some("2025-12-31T23:30:00Z")).unwrap();
        assert_eq!(plain.offset().local_minus_utc(), 0);
        assert_eq!(plain.year(), 2025);
    }

    #[test]
    fn bare_date_is_midnight() {
        let dt = parse_date("2024-12-31").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 12, 31, 0));
    }

    proptest! {
        #[test]
        fn trailing_marker_never_changes_the_moment(
            y in 1970i32..2100,
            mo in 1u32..=12,
            d in 1u32..=28,
            h in 0u32..24,
            mi in 0u32..60,
            s in 0u32..60,
        ) {
            let plain = format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}");
            let zoned = format!("{plain}Z");
            let parsed = parse_date(&plain);
            prop_assert!(parsed.is_some());
            prop_assert_eq!(parsed, parse_date(&zoned));
        }

        #[test]
        fn arbitrary_text_never_panics(s in "\\PC*") {
            let _ = parse_date(&s);
        }
    }
}
