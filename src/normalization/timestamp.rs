use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::model::UNKNOWN_TIMESTAMP;

/// Epoch values at or above this magnitude are read as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Interchange format for every timestamp leaving the mapper.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Normalize a stored timestamp; absent or unreadable values become the `unknown` sentinel.
pub fn normalize_timestamp(value: Option<&Value>) -> String {
    value
        .and_then(read_timestamp)
        .map(format_timestamp)
        .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string())
}

/// Parse a timestamp in any of the accepted stored encodings.
pub fn read_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp(raw),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(epoch_from_float))
            .and_then(from_epoch),
        Value::Object(obj) => {
            if let Some(inner) = obj.get("$date") {
                read_timestamp(inner)
            } else if let Some(Value::String(long)) = obj.get("$numberLong") {
                long.trim().parse::<i64>().ok().and_then(from_epoch)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNKNOWN_TIMESTAMP {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Floats outside the `i64` range are unreadable rather than saturated.
fn epoch_from_float(f: f64) -> Option<i64> {
    let in_range = f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64;
    in_range.then(|| f as i64)
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.unsigned_abs() >= MILLIS_THRESHOLD.unsigned_abs() {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_offsets_to_utc_millis() {
        assert_eq!(
            normalize_timestamp(Some(&json!("2024-03-01T12:00:00+02:00"))),
            "2024-03-01T10:00:00.000Z"
        );
    }

    #[test]
    fn accepts_legacy_encodings() {
        assert_eq!(
            normalize_timestamp(Some(&json!("2023-07-04 08:30:00"))),
            "2023-07-04T08:30:00.000Z"
        );
        assert_eq!(
            normalize_timestamp(Some(&json!(1_700_000_000))),
            "2023-11-14T22:13:20.000Z"
        );
        assert_eq!(
            normalize_timestamp(Some(&json!(1_700_000_000_123i64))),
            "2023-11-14T22:13:20.123Z"
        );
        assert_eq!(
            normalize_timestamp(Some(&json!({"$date": "2022-01-02T03:04:05Z"}))),
            "2022-01-02T03:04:05.000Z"
        );
        assert_eq!(
            normalize_timestamp(Some(&json!({"$date": {"$numberLong": "1700000000123"}}))),
            "2023-11-14T22:13:20.123Z"
        );
    }

    #[test]
    fn absent_or_garbage_is_unknown() {
        assert_eq!(normalize_timestamp(None), UNKNOWN_TIMESTAMP);
        assert_eq!(normalize_timestamp(Some(&json!("yesterday"))), UNKNOWN_TIMESTAMP);
        assert_eq!(normalize_timestamp(Some(&json!(true))), UNKNOWN_TIMESTAMP);
    }

    #[test]
    fn extreme_epochs_are_unknown() {
        assert_eq!(normalize_timestamp(Some(&json!(i64::MIN))), UNKNOWN_TIMESTAMP);
        assert_eq!(normalize_timestamp(Some(&json!(i64::MAX))), UNKNOWN_TIMESTAMP);
        assert_eq!(normalize_timestamp(Some(&json!(u64::MAX))), UNKNOWN_TIMESTAMP);
        assert_eq!(normalize_timestamp(Some(&json!(-1e30))), UNKNOWN_TIMESTAMP);
        assert_eq!(normalize_timestamp(Some(&json!(1e30))), UNKNOWN_TIMESTAMP);
        assert_eq!(
            normalize_timestamp(Some(&json!({"$numberLong": "-9223372036854775808"}))),
            UNKNOWN_TIMESTAMP
        );
    }

    #[test]
    fn normalized_output_is_stable() {
        let once = normalize_timestamp(Some(&json!("2024-03-01T10:00:00Z")));
        let twice = normalize_timestamp(Some(&Value::String(once.clone())));
        assert_eq!(once, twice);
    }
}
