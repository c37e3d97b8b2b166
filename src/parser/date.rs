//! Timestamp parsing: epoch seconds and the date-time strings providers emit.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::{InboundError, Result};

/// Parse a JSON timestamp: a number of epoch seconds, a string of digits,
/// or a date-time string (see [`parse_date`]).
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                from_epoch(secs, 0).ok_or_else(|| InboundError::InvalidDate(n.to_string()))
            } else if let Some(f) = n.as_f64() {
                let secs = f.floor();
                let nanos = ((f - secs) * 1e9).round().min(999_999_999.0) as u32;
                from_epoch(secs as i64, nanos)
                    .ok_or_else(|| InboundError::InvalidDate(n.to_string()))
            } else {
                Err(InboundError::InvalidDate(n.to_string()))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(secs) = trimmed.parse::<i64>() {
                    if let Some(dt) = from_epoch(secs, 0) {
                        return Ok(dt);
                    }
                }
            }
            parse_date(trimmed).ok_or_else(|| InboundError::InvalidDate(s.clone()))
        }
        other => Err(InboundError::InvalidDate(other.to_string())),
    }
}

fn from_epoch(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, nanos)
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and a few broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // Named timezones ("EST", "GMT") → numeric offsets
    let replaced = replace_named_tz(&no_dow);
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s lenient header parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    #[test]
    fn test_epoch_integer() {
        let dt = parse_timestamp(&json!(1368214102)).unwrap();
        assert_eq!(dt.year(), 2013);
        assert_eq!(dt.timestamp(), 1368214102);
    }

    #[test]
    fn test_epoch_float_keeps_fraction() {
        let dt = parse_timestamp(&json!(1368214102.5)).unwrap();
        assert_eq!(dt.timestamp(), 1368214102);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_epoch_digit_string() {
        let dt = parse_timestamp(&json!("1368214102")).unwrap();
        assert_eq!(dt.year(), 2013);
    }

    #[test]
    fn test_rfc2822_string() {
        let dt = parse_timestamp(&json!("Fri, 10 May 2013 19:28:20 +0000")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2013-05-10 19:28");
    }

    #[test]
    fn test_invalid_string_is_error() {
        let err = parse_timestamp(&json!("not a date")).unwrap_err();
        assert!(matches!(err, InboundError::InvalidDate(_)));
    }

    #[test]
    fn test_wrong_json_type_is_error() {
        assert!(parse_timestamp(&json!(true)).is_err());
        assert!(parse_timestamp(&json!(null)).is_err());
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("04 Jan 2024 10:00:00 +0000").is_some());
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("2024-01-04 10:00:00").is_some());
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_strip_day_of_week() {
        assert_eq!(strip_day_of_week("Thu, 04 Jan 2024"), "04 Jan 2024");
        assert_eq!(strip_day_of_week("04 Jan 2024"), "04 Jan 2024");
    }
}
