//! JSON value to [`FieldValue`] coercion.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value};

use super::schema::FieldType;
use crate::models::FieldValue;

/// Epoch values at or above this magnitude are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// String spellings of "no value" for numeric and time fields.
const NULL_MARKERS: &[&str] = &["", "N/A", "NaN", "nan", "None", "null", "--"];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Why a value could not be coerced. Never carries the value itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoercionFailure {
    pub expected: FieldType,
    pub found: &'static str,
}

impl std::fmt::Display for CoercionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

/// Coerces a raw value, to its declared type if there is one.
pub fn coerce(value: &Value, declared: Option<FieldType>) -> Result<FieldValue, CoercionFailure> {
    match declared {
        Some(ty) => coerce_declared(value, ty),
        None => Ok(coerce_natural(value)),
    }
}

/// Undeclared fields keep their JSON type.
///
/// Integral numbers become integers, other numbers decimals, and nested
/// arrays or objects are kept as their JSON text. Numbers a decimal cannot
/// hold keep their JSON text too.
fn coerce_natural(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => number_to_decimal(n)
                .map_or_else(|| FieldValue::Text(n.to_string()), FieldValue::Decimal),
        },
        Value::String(s) => FieldValue::Text(s.clone()),
        nested => FieldValue::Text(nested.to_string()),
    }
}

fn coerce_declared(value: &Value, ty: FieldType) -> Result<FieldValue, CoercionFailure> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    if ty != FieldType::Text {
        if let Value::String(s) = value {
            if NULL_MARKERS.contains(&s.trim()) {
                return Ok(FieldValue::Null);
            }
        }
    }

    let failure = || CoercionFailure {
        expected: ty,
        found: json_type(value),
    };

    match ty {
        FieldType::Text => match value {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
            _ => Err(failure()),
        },
        FieldType::Decimal => match value {
            Value::Number(n) => number_to_decimal(n).map(FieldValue::Decimal).ok_or_else(failure),
            Value::String(s) => parse_decimal(s.trim())
                .map(FieldValue::Decimal)
                .ok_or_else(failure),
            _ => Err(failure()),
        },
        FieldType::Integer => match value {
            Value::Number(n) => number_to_integer(n).map(FieldValue::Integer).ok_or_else(failure),
            Value::String(s) => s.trim().parse::<i64>().map(FieldValue::Integer).map_err(|_| failure()),
            _ => Err(failure()),
        },
        FieldType::Timestamp => match value {
            Value::Number(n) => number_to_timestamp(n).map(FieldValue::Timestamp).ok_or_else(failure),
            Value::String(s) => parse_timestamp(s.trim())
                .map(FieldValue::Timestamp)
                .ok_or_else(failure),
            _ => Err(failure()),
        },
        FieldType::Bool => match value {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(FieldValue::Bool(false)),
                Some(1) => Ok(FieldValue::Bool(true)),
                _ => Err(failure()),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "y" | "yes" => Ok(FieldValue::Bool(true)),
                "false" | "0" | "n" | "no" => Ok(FieldValue::Bool(false)),
                _ => Err(failure()),
            },
            _ => Err(failure()),
        },
    }
}

/// Parses the number's own text so the decimal digits survive exactly.
fn number_to_decimal(n: &Number) -> Option<Decimal> {
    parse_decimal(&n.to_string())
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn number_to_integer(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let d = number_to_decimal(n)?;
    if d.fract().is_zero() {
        i64::try_from(d).ok()
    } else {
        None
    }
}

fn number_to_timestamp(n: &Number) -> Option<DateTime<Utc>> {
    match n.as_i64() {
        Some(i) if i.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD as u64 => {
            Utc.timestamp_millis_opt(i).single()
        }
        Some(i) => Utc.timestamp_opt(i, 0).single(),
        None => {
            let value = n.as_f64()?;
            if !value.is_finite() {
                return None;
            }
            let millis = if value.abs() >= EPOCH_MILLIS_THRESHOLD as f64 {
                value.round()
            } else {
                (value * 1000.0).round()
            };
            // i64::MAX as f64 rounds up to 2^63, which does not fit
            if millis.abs() >= i64::MAX as f64 {
                return None;
            }
            Utc.timestamp_millis_opt(millis as i64).single()
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, a bare date, or epoch digits.
///
/// Strings without an offset are read as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    let number = Number::from_str(s).ok()?;
    number_to_timestamp(&number)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decimal_keeps_exact_digits() {
        assert_eq!(
            coerce(&json!(320.5), Some(FieldType::Decimal)),
            Ok(FieldValue::Decimal(dec!(320.5)))
        );
        assert_eq!(
            coerce(&json!(0.1), Some(FieldType::Decimal)),
            Ok(FieldValue::Decimal(dec!(0.1)))
        );
        assert_eq!(
            coerce(&json!("12.340"), Some(FieldType::Decimal)),
            Ok(FieldValue::Decimal(dec!(12.340)))
        );
    }

    #[test]
    fn test_null_markers_become_null() {
        for marker in ["", "N/A", "NaN", "None"] {
            assert_eq!(
                coerce(&json!(marker), Some(FieldType::Decimal)),
                Ok(FieldValue::Null),
                "{}",
                marker
            );
        }
        assert_eq!(coerce(&Value::Null, Some(FieldType::Integer)), Ok(FieldValue::Null));
        // Text keeps empty strings
        assert_eq!(
            coerce(&json!(""), Some(FieldType::Text)),
            Ok(FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn test_declared_mismatch_fails() {
        assert_eq!(
            coerce(&json!("abc"), Some(FieldType::Decimal)),
            Err(CoercionFailure {
                expected: FieldType::Decimal,
                found: "string"
            })
        );
        assert_eq!(
            coerce(&json!(1.5), Some(FieldType::Integer)),
            Err(CoercionFailure {
                expected: FieldType::Integer,
                found: "number"
            })
        );
        assert!(coerce(&json!([1]), Some(FieldType::Text)).is_err());
    }

    #[test]
    fn test_integer_from_whole_float() {
        assert_eq!(
            coerce(&json!(1200.0), Some(FieldType::Integer)),
            Ok(FieldValue::Integer(1200))
        );
        assert_eq!(
            coerce(&json!("42"), Some(FieldType::Integer)),
            Ok(FieldValue::Integer(42))
        );
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap();
        for raw in [
            json!("2024-03-05 10:15:30"),
            json!("2024-03-05T10:15:30Z"),
            json!("2024-03-05T18:15:30+08:00"),
            json!(expected.timestamp()),
            json!(expected.timestamp_millis()),
        ] {
            assert_eq!(
                coerce(&raw, Some(FieldType::Timestamp)),
                Ok(FieldValue::Timestamp(expected)),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_timestamp_fractional_seconds() {
        let value = coerce(&json!("2024-03-05 10:15:30.250"), Some(FieldType::Timestamp)).unwrap();
        let ts = value.as_timestamp().unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_bool_spellings() {
        assert_eq!(coerce(&json!(1), Some(FieldType::Bool)), Ok(FieldValue::Bool(true)));
        assert_eq!(coerce(&json!("False"), Some(FieldType::Bool)), Ok(FieldValue::Bool(false)));
        assert!(coerce(&json!(2), Some(FieldType::Bool)).is_err());
    }

    #[test]
    fn test_natural_types() {
        assert_eq!(coerce(&json!(100), None), Ok(FieldValue::Integer(100)));
        assert_eq!(coerce(&json!(320.5), None), Ok(FieldValue::Decimal(dec!(320.5))));
        assert_eq!(coerce(&json!("0.5"), None), Ok(FieldValue::Text("0.5".to_string())));
        assert_eq!(coerce(&json!(true), None), Ok(FieldValue::Bool(true)));
        assert_eq!(coerce(&Value::Null, None), Ok(FieldValue::Null));
        assert_eq!(
            coerce(&json!({"a": 1}), None),
            Ok(FieldValue::Text("{\"a\":1}".to_string()))
        );
    }

    #[test]
    fn test_natural_out_of_range_number_kept_as_text() {
        let huge: Value = serde_json::from_str("1e30").unwrap();
        assert_eq!(coerce(&huge, None), Ok(FieldValue::Text("1e30".to_string())));

        let tiny: Value = serde_json::from_str("-1.5e40").unwrap();
        assert_eq!(coerce(&tiny, None), Ok(FieldValue::Text(tiny.to_string())));
    }

    #[test]
    fn test_timestamp_extreme_integers_fail() {
        let failure = Err(CoercionFailure {
            expected: FieldType::Timestamp,
            found: "number",
        });
        assert_eq!(coerce(&json!(i64::MIN), Some(FieldType::Timestamp)), failure);
        assert_eq!(coerce(&json!(i64::MAX), Some(FieldType::Timestamp)), failure);
        assert_eq!(coerce(&json!(u64::MAX), Some(FieldType::Timestamp)), failure);

        assert_eq!(
            coerce(&json!("-9223372036854775808"), Some(FieldType::Timestamp)),
            Err(CoercionFailure {
                expected: FieldType::Timestamp,
                found: "string",
            })
        );
    }

    #[test]
    fn test_timestamp_fractional_epoch_uses_same_threshold() {
        let millis = Utc.timestamp_millis_opt(1_709_604_000_123).unwrap();
        assert_eq!(
            coerce(&json!(1_709_604_000_123.0), Some(FieldType::Timestamp)),
            Ok(FieldValue::Timestamp(millis))
        );

        let secs = Utc.timestamp_millis_opt(1_709_604_000_500).unwrap();
        assert_eq!(
            coerce(&json!(1_709_604_000.5), Some(FieldType::Timestamp)),
            Ok(FieldValue::Timestamp(secs))
        );
    }
}
