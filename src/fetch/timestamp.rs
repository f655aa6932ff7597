//! Creation-timestamp parsing.
//!
//! Accepted forms, tried in order:
//! - RFC 3339 / ISO 8601 with an offset (`2024-05-01T12:00:00Z`, `...+03:00`, `...+0300`)
//! - ISO 8601 without an offset, `T` or space separated, optional fraction (read as UTC)
//! - a bare `YYYY-MM-DD` date (midnight UTC)
//! - JSON numbers as Unix epoch seconds, or milliseconds above 10^11

use crate::fetch::error::TimestampError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Epoch values above this are taken as milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;

/// Parse a timestamp value into UTC.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_f64()
            .and_then(from_epoch)
            .ok_or_else(|| TimestampError::OutOfRange(n.to_string())),
        Value::Null => Err(TimestampError::Type("null")),
        Value::Bool(_) => Err(TimestampError::Type("boolean")),
        Value::Array(_) => Err(TimestampError::Type("array")),
        Value::Object(_) => Err(TimestampError::Type("object")),
    }
}

/// Parse a timestamp string into UTC; naive values are assumed to be UTC.
pub fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, TimestampError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(TimestampError::Format(s.to_string()))
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let floor = value.floor();
        let secs = floor as i64;
        let nanos = ((value - floor) * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_rfc3339_variants() {
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:00Z")).unwrap(),
            utc(2024, 5, 1, 12, 0, 0)
        );
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:00.123+00:00")).unwrap(),
            utc(2024, 5, 1, 12, 0, 0) + chrono::Duration::milliseconds(123)
        );
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:00-03:00")).unwrap(),
            utc(2024, 5, 1, 15, 0, 0)
        );
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:00+0300")).unwrap(),
            utc(2024, 5, 1, 9, 0, 0)
        );
    }

    #[test]
    fn test_naive_is_utc() {
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:00")).unwrap(),
            utc(2024, 5, 1, 12, 0, 0)
        );
        assert_eq!(
            parse_timestamp(&json!("2024-05-01 08:30:15.5")).unwrap(),
            utc(2024, 5, 1, 8, 30, 15) + chrono::Duration::milliseconds(500)
        );
        assert_eq!(
            parse_timestamp(&json!(" 2024-05-01 ")).unwrap(),
            utc(2024, 5, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_epoch_numbers() {
        assert_eq!(
            parse_timestamp(&json!(1714564800)).unwrap(),
            utc(2024, 5, 1, 12, 0, 0)
        );
        assert_eq!(
            parse_timestamp(&json!(1714564800000_i64)).unwrap(),
            utc(2024, 5, 1, 12, 0, 0)
        );
    }

    #[test]
    fn test_fractional_epoch_seconds() {
        assert_eq!(
            parse_timestamp(&json!(1714564800.25)).unwrap(),
            utc(2024, 5, 1, 12, 0, 0) + chrono::Duration::milliseconds(250)
        );
        assert_eq!(
            parse_timestamp(&json!(-1.5)).unwrap(),
            utc(1970, 1, 1, 0, 0, 0) - chrono::Duration::milliseconds(1500)
        );
        assert_eq!(
            parse_timestamp(&json!(-1.5)).unwrap().timestamp_millis(),
            -1500
        );
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            parse_timestamp(&json!("yesterday")),
            Err(TimestampError::Format(_))
        ));
        assert!(matches!(
            parse_timestamp(&json!("2024-13-45")),
            Err(TimestampError::Format(_))
        ));
        assert_eq!(
            parse_timestamp(&json!(true)),
            Err(TimestampError::Type("boolean"))
        );
        assert_eq!(
            parse_timestamp(&json!({"seconds": 1})),
            Err(TimestampError::Type("object"))
        );
    }
}
