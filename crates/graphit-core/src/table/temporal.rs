//! Timestamp parsing and formatting

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp string into milliseconds since the epoch
///
/// Offsets in RFC 3339 input are normalised to UTC; naive input is taken as-is.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    // Cheap reject before trying every format
    if value.len() < 8 || !value.as_bytes()[0].is_ascii_digit() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }

    None
}

/// Format milliseconds since the epoch as `YYYY-MM-DDTHH:MM:SS.mmm`
pub fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_layouts() {
        let midnight = parse_timestamp("2024-01-01").unwrap();
        assert_eq!(parse_timestamp("2024/01/01"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-01 00:00:01.500"), Some(midnight + 1_500));
    }

    #[test]
    fn test_rejects_non_temporal() {
        assert_eq!(parse_timestamp("12.5"), None);
        assert_eq!(parse_timestamp("1700000000"), None);
        assert_eq!(parse_timestamp("red"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn test_format_parses_back() {
        let millis = parse_timestamp("2023-06-15 08:30:12.250").unwrap();
        let text = format_timestamp(millis).unwrap();
        assert_eq!(text, "2023-06-15T08:30:12.250");
        assert_eq!(parse_timestamp(&text), Some(millis));
    }
}
