use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::models::TransactionType;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses the `time` cell of an imported row.
pub struct TimestampProcessor;

/// Date-time patterns tried after RFC 3339 / RFC 2822. Naive values are UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%b %d %Y %H:%M:%S",
    "%b %d %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
];

/// Date-time patterns carrying a UTC offset after a space.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M %z"];

/// Month names match in short or long form.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%d %B %Y",
];

impl TimestampProcessor {
    /// Attempt to turn a cell into a UTC [`DateTime`].
    ///
    /// * string → RFC 3339 (including `Z`), RFC 2822, or one of the common
    ///   spreadsheet and bank-export patterns (`Jan 15, 2024`,
    ///   `15 January 2024`, `2024-01-15 08:30:00 +0200`).
    /// * number → Unix epoch milliseconds.
    /// * anything else → `None`.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => Self::parse_str(s.trim()),
            Value::Number(n) => {
                let millis = n.as_f64().filter(|f| f.is_finite())?;
                DateTime::from_timestamp_millis(millis.trunc() as i64)
            }
            _ => None,
        }
    }

    fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        debug!("TimestampProcessor: no pattern matched \"{}\"", s);
        None
    }
}

// ── TypeProcessor ─────────────────────────────────────────────────────────────

/// Resolves the `type` cell to a [`TransactionType`].
pub struct TypeProcessor;

impl TypeProcessor {
    /// Only string cells can carry a type; the comparison ignores case.
    pub fn parse(value: &Value) -> Option<TransactionType> {
        value.as_str().and_then(TransactionType::from_label)
    }
}

// ── AmountProcessor ───────────────────────────────────────────────────────────

/// Cleans up the `amount` cell: currency symbols, thousands separators and
/// any other decoration are discarded before parsing.
pub struct AmountProcessor;

impl AmountProcessor {
    /// Numeric cells pass through when finite. String cells keep only
    /// `0-9`, `.` and `-`, then the longest leading float is parsed, so
    /// `"$1,234.50"` is `1234.5` and `"12-3"` is `12`. Everything else is
    /// `None`.
    pub fn parse(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
            Value::String(s) => {
                let cleaned = Self::strip_decoration(s);
                Self::parse_leading_float(&cleaned)
            }
            _ => None,
        }
    }

    /// Drop every character that is not a digit, a dot or a minus sign.
    pub fn strip_decoration(s: &str) -> String {
        s.chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect()
    }

    /// Parse the longest prefix of `s` shaped like `-?digits[.digits]`.
    ///
    /// Requires at least one digit; `"-"`, `"."` and `""` yield `None`.
    pub fn parse_leading_float(s: &str) -> Option<f64> {
        let bytes = s.as_bytes();
        let mut end = 0;
        if bytes.first() == Some(&b'-') {
            end = 1;
        }

        let int_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut digits = end - int_start;

        if end < bytes.len() && bytes[end] == b'.' {
            let frac_start = end + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                frac_end += 1;
            }
            digits += frac_end - frac_start;
            if digits > 0 {
                end = frac_end;
            }
        }

        if digits == 0 {
            return None;
        }

        s[..end].parse::<f64>().ok().filter(|f| f.is_finite())
    }
}

// ── CategoryProcessor ─────────────────────────────────────────────────────────

/// Converts the `category` cell to its label text.
pub struct CategoryProcessor;

impl CategoryProcessor {
    /// Strings pass through untouched; numbers and booleans are stringified;
    /// null becomes the empty label.
    pub fn label(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    // ── TimestampProcessor ────────────────────────────────────────────────────

    #[test]
    fn test_timestamp_rfc3339_z() {
        let dt = TimestampProcessor::parse(&json!("2024-01-15T08:30:00Z")).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 1, 15, 8));
    }

    #[test]
    fn test_timestamp_with_offset_is_converted_to_utc() {
        let dt = TimestampProcessor::parse(&json!("2024-01-15T08:30:00+02:00")).unwrap();
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_timestamp_spreadsheet_minutes_pattern() {
        let dt = TimestampProcessor::parse(&json!("2024-02-03 14:05")).unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour(), dt.minute()), (2, 3, 14, 5));
    }

    #[test]
    fn test_timestamp_date_only_patterns() {
        let iso = TimestampProcessor::parse(&json!("2024-02-03")).unwrap();
        let us = TimestampProcessor::parse(&json!("02/03/2024")).unwrap();
        let slashed = TimestampProcessor::parse(&json!("2024/02/03")).unwrap();
        assert_eq!(iso, us);
        assert_eq!(iso, slashed);
        assert_eq!(iso.hour(), 0);
    }

    #[test]
    fn test_timestamp_month_name_dates() {
        let expected = TimestampProcessor::parse(&json!("2024-01-15")).unwrap();
        for cell in [
            "Jan 15, 2024",
            "January 15, 2024",
            "15 Jan 2024",
            "15 January 2024",
            "Jan 15 2024",
        ] {
            assert_eq!(TimestampProcessor::parse(&json!(cell)), Some(expected), "{}", cell);
        }
    }

    #[test]
    fn test_timestamp_month_name_with_time() {
        let dt = TimestampProcessor::parse(&json!("Jan 15 2024 08:30:15")).unwrap();
        assert_eq!((dt.day(), dt.hour(), dt.minute(), dt.second()), (15, 8, 30, 15));
        let dt = TimestampProcessor::parse(&json!("Jan 15 2024 08:30")).unwrap();
        assert_eq!((dt.hour(), dt.minute()), (8, 30));
    }

    #[test]
    fn test_timestamp_space_separated_offset() {
        let dt = TimestampProcessor::parse(&json!("2024-01-15 08:30:00 +0200")).unwrap();
        assert_eq!((dt.day(), dt.hour(), dt.minute()), (15, 6, 30));
        let dt = TimestampProcessor::parse(&json!("2024-01-15 01:00:00 +05:00")).unwrap();
        assert_eq!((dt.day(), dt.hour()), (14, 20));
    }

    #[test]
    fn test_timestamp_single_digit_us_date() {
        let dt = TimestampProcessor::parse(&json!("1/5/2024")).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 5));
    }

    #[test]
    fn test_timestamp_number_is_epoch_millis() {
        let dt = TimestampProcessor::parse(&json!(1_704_067_200_000_i64)).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 1));
    }

    #[test]
    fn test_timestamp_invalid_inputs() {
        assert!(TimestampProcessor::parse(&json!("not a date")).is_none());
        assert!(TimestampProcessor::parse(&json!("")).is_none());
        assert!(TimestampProcessor::parse(&json!("2024-13-45")).is_none());
        assert!(TimestampProcessor::parse(&Value::Null).is_none());
        assert!(TimestampProcessor::parse(&json!(true)).is_none());
    }

    // ── TypeProcessor ─────────────────────────────────────────────────────────

    #[test]
    fn test_type_matches_any_case() {
        assert_eq!(TypeProcessor::parse(&json!("Input")), Some(TransactionType::Input));
        assert_eq!(TypeProcessor::parse(&json!("OUTPUT")), Some(TransactionType::Output));
    }

    #[test]
    fn test_type_rejects_other_values() {
        assert_eq!(TypeProcessor::parse(&json!("income")), None);
        assert_eq!(TypeProcessor::parse(&json!(1)), None);
        assert_eq!(TypeProcessor::parse(&Value::Null), None);
    }

    // ── AmountProcessor ───────────────────────────────────────────────────────

    #[test]
    fn test_amount_number_passthrough() {
        assert_eq!(AmountProcessor::parse(&json!(12.5)), Some(12.5));
        assert_eq!(AmountProcessor::parse(&json!(-3)), Some(-3.0));
    }

    #[test]
    fn test_amount_strips_currency_and_separators() {
        assert_eq!(AmountProcessor::parse(&json!("$1,234.50")), Some(1234.5));
        assert_eq!(AmountProcessor::parse(&json!("€ -20")), Some(-20.0));
        assert_eq!(AmountProcessor::parse(&json!("45 USD")), Some(45.0));
    }

    #[test]
    fn test_amount_uses_longest_leading_float() {
        assert_eq!(AmountProcessor::parse(&json!("12-3")), Some(12.0));
        assert_eq!(AmountProcessor::parse(&json!("1.2.3")), Some(1.2));
        assert_eq!(AmountProcessor::parse(&json!("5.")), Some(5.0));
        assert_eq!(AmountProcessor::parse(&json!("-.5")), Some(-0.5));
    }

    #[test]
    fn test_amount_unparseable() {
        assert_eq!(AmountProcessor::parse(&json!("abc")), None);
        assert_eq!(AmountProcessor::parse(&json!("-")), None);
        assert_eq!(AmountProcessor::parse(&json!(".")), None);
        assert_eq!(AmountProcessor::parse(&json!("")), None);
        assert_eq!(AmountProcessor::parse(&Value::Null), None);
        assert_eq!(AmountProcessor::parse(&json!(true)), None);
    }

    // ── CategoryProcessor ─────────────────────────────────────────────────────

    #[test]
    fn test_category_label() {
        assert_eq!(CategoryProcessor::label(&json!("Rent")), "Rent");
        assert_eq!(CategoryProcessor::label(&json!("")), "");
        assert_eq!(CategoryProcessor::label(&Value::Null), "");
        assert_eq!(CategoryProcessor::label(&json!(42)), "42");
        assert_eq!(CategoryProcessor::label(&json!(false)), "false");
    }
}
