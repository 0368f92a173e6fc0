//! Value representations for journal-sync.
//!
//! This module defines [`SourceValue`], the scalar a driver cursor yields for
//! one column of one row, and its projection into the JSON payload of a change
//! event according to the declared [`PropertyType`].

use crate::types::PropertyType;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;

/// A scalar value read from a source row.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// SQL NULL
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Exact decimal (DECIMAL / NUMERIC / packed / zoned)
    Decimal(Decimal),

    /// Character data
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Calendar date
    Date(NaiveDate),

    /// Time of day
    Time(NaiveTime),

    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
}

impl SourceValue {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Project this value into a JSON payload value for a property of the
    /// given type.
    ///
    /// Textual types (`String`, `Text`, `Decimal`) always produce a JSON
    /// string. Other types produce their natural JSON value; binary data is
    /// base64 encoded. `NULL` is always `null`.
    pub fn project(&self, property_type: PropertyType) -> serde_json::Value {
        use serde_json::Value;

        if self.is_null() {
            return Value::Null;
        }
        if property_type.is_textual() {
            return Value::String(self.to_string());
        }

        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Decimal(d) => decimal_to_json(d),
            Self::Text(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Self::Date(_) | Self::Time(_) | Self::Timestamp(_) => Value::String(self.to_string()),
        }
    }

    /// Render this value as a row identity.
    ///
    /// Row identities arrive as integers from the identity function but as
    /// packed decimals or padded character data from journal receivers; all
    /// of them must render to the same string for the same row.
    pub fn to_identity_string(&self) -> String {
        match self {
            Self::Decimal(d) => d.normalize().to_string(),
            Self::Float(f) if is_integral_in_i64_range(*f) => format!("{}", *f as i64),
            Self::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i128>()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|_| trimmed.to_string())
            }
            other => other.to_string(),
        }
    }

    /// Interpret this value as an unsigned sequence number.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok(),
            Self::Decimal(d) if d.fract().is_zero() => d.to_u64(),
            Self::Float(f) if *f >= 0.0 && is_integral_in_i64_range(*f) => Some(*f as u64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret this value as trimmed character data.
    pub fn as_trimmed_str(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn is_integral_in_i64_range(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn decimal_to_json(d: &Decimal) -> serde_json::Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return serde_json::Value::from(i);
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(d.to_string()))
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&base64::engine::general_purpose::STANDARD.encode(b)),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for SourceValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for SourceValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for SourceValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_textual_projection() {
        assert_eq!(SourceValue::Int(7).project(PropertyType::String), json!("7"));
        assert_eq!(
            SourceValue::Decimal(Decimal::from_str("12.50").unwrap()).project(PropertyType::Decimal),
            json!("12.50")
        );
        assert_eq!(
            SourceValue::text("abc").project(PropertyType::Text),
            json!("abc")
        );
    }

    #[test]
    fn test_natural_projection() {
        assert_eq!(SourceValue::Int(7).project(PropertyType::Integer), json!(7));
        assert_eq!(
            SourceValue::Bool(true).project(PropertyType::Bool),
            json!(true)
        );
        assert_eq!(
            SourceValue::Decimal(Decimal::from(12)).project(PropertyType::Integer),
            json!(12)
        );
        assert_eq!(
            SourceValue::Float(1.5).project(PropertyType::Float),
            json!(1.5)
        );
        assert_eq!(
            SourceValue::Float(f64::NAN).project(PropertyType::Float),
            json!(null)
        );
        assert_eq!(
            SourceValue::Bytes(vec![1, 2, 3]).project(PropertyType::Blob),
            json!("AQID")
        );
    }

    #[test]
    fn test_temporal_projection() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let ts = date.and_hms_opt(8, 5, 1).unwrap();
        assert_eq!(
            SourceValue::Date(date).project(PropertyType::Date),
            json!("2024-03-09")
        );
        assert_eq!(
            SourceValue::Timestamp(ts).project(PropertyType::Datetime),
            json!("2024-03-09T08:05:01")
        );
        assert_eq!(
            SourceValue::Time(ts.time()).project(PropertyType::Time),
            json!("08:05:01")
        );
    }

    #[test]
    fn test_null_projection_for_every_type() {
        for t in PropertyType::ALL {
            assert_eq!(SourceValue::Null.project(t), json!(null), "type {t}");
        }
    }

    #[test]
    fn test_identity_string_agrees_across_representations() {
        let expected = "5";
        assert_eq!(SourceValue::Int(5).to_identity_string(), expected);
        assert_eq!(
            SourceValue::Decimal(Decimal::from_str("5.000").unwrap()).to_identity_string(),
            expected
        );
        assert_eq!(SourceValue::text("   5 ").to_identity_string(), expected);
        assert_eq!(SourceValue::Float(5.0).to_identity_string(), expected);
    }

    #[test]
    fn test_identity_string_strips_zero_padding() {
        assert_eq!(SourceValue::text("0000000042").to_identity_string(), "42");
        assert_eq!(SourceValue::text(" 0000000000 ").to_identity_string(), "0");
        assert_eq!(SourceValue::text("A0042").to_identity_string(), "A0042");
    }

    #[test]
    fn test_identity_string_keeps_out_of_range_floats() {
        let huge = SourceValue::Float(1e300).to_identity_string();
        assert_eq!(huge, format!("{}", 1e300_f64));
        assert_ne!(huge, i64::MAX.to_string());
        assert_eq!(SourceValue::Float(-7.0).to_identity_string(), "-7");
        assert_eq!(SourceValue::Float(1e300).as_u64(), None);
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(SourceValue::Int(11).as_u64(), Some(11));
        assert_eq!(SourceValue::Int(-1).as_u64(), None);
        assert_eq!(
            SourceValue::Decimal(Decimal::from_str("42").unwrap()).as_u64(),
            Some(42)
        );
        assert_eq!(SourceValue::text(" 99 ").as_u64(), Some(99));
        assert_eq!(SourceValue::Null.as_u64(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(SourceValue::from(None::<i64>), SourceValue::Null);
        assert_eq!(SourceValue::from(Some("x")), SourceValue::text("x"));
    }
}
