//! Boundary coercion of loosely-typed record data against field definitions.
//!
//! Applied wherever external data enters a repository: the facade write path
//! and the bulk import path. String fields are truncated to their declared
//! maximum length; date fields are parsed through an ordered list of accepted
//! textual formats. Month and weekday names are matched against their English
//! spellings regardless of the process locale, so a backup taken on one host
//! restores identically on another.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use super::{FieldDefinition, LogicalType, Record, Value};

/// Coercion failure; aborts the surrounding write or batch.
#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("field [{field}] is not a parsable date: [{text}]")]
    UnparsableDate { field: String, text: String },

    #[error("field [{field}] has incompatible value for type [{expected}]")]
    IncompatibleValue { field: String, expected: LogicalType },
}

/// Datetime formats accepted for date fields, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.3f", "%Y-%m-%d %H:%M:%S"];

/// Coerce a record in place against the given field definitions.
///
/// Fields absent from the record are left alone; validation of required
/// fields happens at the repository facade, not here.
pub fn coerce_record(record: &mut Record, fields: &[FieldDefinition]) -> Result<(), CoerceError> {
    for def in fields {
        let Some(value) = record.get(&def.name).cloned() else {
            continue;
        };

        match def.logical_type {
            LogicalType::String | LogicalType::Text => {
                if let (Value::String(s), Some(max)) = (&value, def.length) {
                    if s.chars().count() > max as usize {
                        record.set(def.name.clone(), truncate(s, max as usize));
                    }
                }
            }
            LogicalType::Date => {
                let coerced = coerce_date(&def.name, &value)?;
                record.set(def.name.clone(), coerced);
            }
            LogicalType::Boolean => {
                if let Value::Integer(i) = value {
                    record.set(def.name.clone(), Value::Bool(i != 0));
                }
            }
            LogicalType::Integer | LogicalType::Double => {}
        }
    }

    Ok(())
}

/// Truncate a string to at most `max` characters, on a char boundary.
pub fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn coerce_date(field: &str, value: &Value) -> Result<Value, CoerceError> {
    match value {
        Value::Timestamp(_) | Value::Null => Ok(value.clone()),
        // Millisecond epoch, the usual export form for timestamps.
        Value::Integer(millis) => Utc
            .timestamp_millis_opt(*millis)
            .single()
            .map(Value::Timestamp)
            .ok_or_else(|| CoerceError::IncompatibleValue {
                field: field.to_string(),
                expected: LogicalType::Date,
            }),
        Value::String(text) => parse_date(text)
            .map(Value::Timestamp)
            .ok_or_else(|| CoerceError::UnparsableDate {
                field: field.to_string(),
                text: text.clone(),
            }),
        _ => Err(CoerceError::IncompatibleValue {
            field: field.to_string(),
            expected: LogicalType::Date,
        }),
    }
}

/// Parse a date literal, trying the accepted formats in order.
///
/// Accepted, in order:
/// 1. `Www Mmm dd HH:MM:SS ZONE YYYY` (single-digit days included)
/// 2. `YYYY-MM-DD HH:MM:SS.fff`
/// 3. `YYYY-MM-DD HH:MM:SS`
/// 4. `YYYY-MM-DD`
/// 5. RFC 3339
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Some(ts) = parse_ctime_with_zone(text) {
        return Some(ts);
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parse `"Mon Jan 2 15:04:05 UTC 2006"`-style literals.
///
/// The zone token is matched by hand: `UTC`/`GMT`/`Z` and numeric offsets are
/// honored, any other zone abbreviation is read as UTC (zone abbreviations
/// are ambiguous and the export side always writes UTC).
fn parse_ctime_with_zone(text: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() != 6 {
        return None;
    }

    let zone = tokens[4];
    let without_zone = format!(
        "{} {} {} {} {}",
        tokens[0], tokens[1], tokens[2], tokens[3], tokens[5]
    );
    let naive = NaiveDateTime::parse_from_str(&without_zone, "%a %b %d %H:%M:%S %Y").ok()?;

    let offset_minutes = parse_zone_offset(zone)?;
    let utc = Utc.from_utc_datetime(&naive) - chrono::Duration::minutes(offset_minutes);
    Some(utc)
}

/// Offset of the given zone token relative to UTC, in minutes.
fn parse_zone_offset(zone: &str) -> Option<i64> {
    match zone {
        "UTC" | "GMT" | "Z" => Some(0),
        _ if zone.starts_with('+') || zone.starts_with('-') => {
            let digits: String = zone.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() != 4 {
                return None;
            }
            let hours: i64 = digits[..2].parse().ok()?;
            let minutes: i64 = digits[2..].parse().ok()?;
            let sign = if zone.starts_with('-') { -1 } else { 1 };
            Some(sign * (hours * 60 + minutes))
        }
        _ if zone.chars().all(|c| c.is_ascii_alphabetic()) => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdefgh", 5), "abcde");
        assert_eq!(truncate("héllo wörld", 4), "héll");
        assert_eq!(truncate("ab", 5), "ab");
    }

    #[test]
    fn test_parse_ctime_utc() {
        let ts = parse_date("Mon Jan 2 15:04:05 UTC 2006").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_ctime_padded_day() {
        let ts = parse_date("Mon Jan 02 15:04:05 GMT 2006").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_ctime_numeric_offset() {
        let ts = parse_date("Mon Jan 2 15:04:05 +0200 2006").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2006, 1, 2, 13, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_datetime_with_millis() {
        let ts = parse_date("2020-01-02 03:04:05.678").unwrap();
        assert_eq!(
            ts,
            Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
                + chrono::Duration::milliseconds(678)
        );
    }

    #[test]
    fn test_parse_plain_date() {
        let ts = parse_date("2020-01-02").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_date("2020-01-02T03:04:05Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_coerce_truncates_string_field() {
        let fields = vec![FieldDefinition::string("name", 5)];
        let mut record = Record::new();
        record.set("name", "abcdefgh");
        coerce_record(&mut record, &fields).unwrap();
        assert_eq!(record.get_str("name"), Some("abcde"));
    }

    #[test]
    fn test_coerce_parses_date_field() {
        let fields = vec![FieldDefinition::date("joined")];
        let mut record = Record::new();
        record.set("joined", "2020-01-02");
        coerce_record(&mut record, &fields).unwrap();
        assert_eq!(
            record.get("joined").and_then(Value::as_timestamp),
            Some(Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_coerce_rejects_bad_date() {
        let fields = vec![FieldDefinition::date("joined")];
        let mut record = Record::new();
        record.set("joined", "yesterday-ish");
        let err = coerce_record(&mut record, &fields).unwrap_err();
        assert!(matches!(err, CoerceError::UnparsableDate { .. }));
    }

    #[test]
    fn test_coerce_leaves_absent_fields_alone() {
        let fields = vec![FieldDefinition::date("joined")];
        let mut record = Record::new();
        record.set("other", 1i64);
        coerce_record(&mut record, &fields).unwrap();
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_coerce_boolean_from_integer() {
        let fields = vec![FieldDefinition::boolean("flag")];
        let mut record = Record::new();
        record.set("flag", 1i64);
        coerce_record(&mut record, &fields).unwrap();
        assert_eq!(record.get("flag").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn test_coerce_epoch_millis_date() {
        let fields = vec![FieldDefinition::date("joined")];
        let mut record = Record::new();
        record.set("joined", 1_577_934_245_000i64);
        coerce_record(&mut record, &fields).unwrap();
        assert_eq!(
            record.get("joined").and_then(Value::as_timestamp),
            Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap())
        );
    }
}
