//! Scalar values carried by rows
//!
//! Supported types:
//! - bool
//! - int: 64-bit signed integer
//! - decimal: exact decimal (prices, amounts)
//! - text: UTF-8 string
//! - timestamp: naive date-time (UTC by convention)
//!
//! Every value is nullable. Structural equality (`==`) treats NULL as equal
//! to NULL, which is the grouping/partitioning rule. SQL comparison rules
//! (NULL propagates) live in the expression evaluator.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use super::schema::DataType;

/// Canonical timestamp rendering used for output and fixtures
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed, nullable scalar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true for NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the data type of a non-null value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Any,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Decimal(_) => DataType::Decimal,
            Value::Text(_) => DataType::Text,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            other => other.data_type().type_name(),
        }
    }

    /// Returns true for int and decimal values
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Decimal(_))
    }

    /// Numeric value widened to a decimal
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Key used when hashing values for grouping and equi-joins.
    ///
    /// Integers are widened to decimals so that `1` and `1.00` land in the
    /// same bucket; decimals are normalized to drop trailing zeros.
    pub fn key(&self) -> Value {
        match self {
            Value::Int(i) => Value::Decimal(Decimal::from(*i)),
            Value::Decimal(d) => Value::Decimal(d.normalize()),
            other => other.clone(),
        }
    }

    /// Renders the value as JSON for the presentation boundary.
    ///
    /// Decimals are rendered as strings to keep them exact.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Decimal(d) => JsonValue::String(d.to_string()),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Timestamp(ts) => JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }

    /// Converts a JSON value into a value of the declared type.
    ///
    /// Returns None when the JSON value cannot represent the type.
    pub fn from_json(json: &JsonValue, data_type: DataType) -> Option<Value> {
        if json.is_null() {
            return Some(Value::Null);
        }

        match data_type {
            DataType::Bool => json.as_bool().map(Value::Bool),
            DataType::Int => json.as_i64().map(Value::Int),
            DataType::Decimal => match json {
                JsonValue::Number(n) => Decimal::from_str(&n.to_string()).ok().map(Value::Decimal),
                JsonValue::String(s) => Decimal::from_str(s).ok().map(Value::Decimal),
                _ => None,
            },
            DataType::Text => json.as_str().map(|s| Value::Text(s.to_string())),
            DataType::Timestamp => json.as_str().and_then(parse_timestamp).map(Value::Timestamp),
            DataType::Any => match json {
                JsonValue::Bool(b) => Some(Value::Bool(*b)),
                JsonValue::Number(n) => match n.as_i64() {
                    Some(i) => Some(Value::Int(i)),
                    None => Decimal::from_str(&n.to_string()).ok().map(Value::Decimal),
                },
                JsonValue::String(s) => Some(Value::Text(s.clone())),
                _ => None,
            },
        }
    }
}

/// Parses `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Timestamp(ts) => write!(f, "'{}'", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_equals_null_structurally() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
    }

    #[test]
    fn test_key_widens_ints() {
        assert_eq!(Value::Int(3).key(), Value::Decimal(Decimal::new(300, 2)).key());
        assert_eq!(Value::from("a").key(), Value::from("a"));
    }

    #[test]
    fn test_decimal_json_is_exact_string() {
        let v = Value::Decimal(Decimal::new(1999, 2));
        assert_eq!(v.to_json(), json!("19.99"));
    }

    #[test]
    fn test_from_json_by_type() {
        assert_eq!(
            Value::from_json(&json!(12.5), DataType::Decimal),
            Some(Value::Decimal(Decimal::new(125, 1)))
        );
        assert_eq!(
            Value::from_json(&json!("3.10"), DataType::Decimal),
            Some(Value::Decimal(Decimal::new(310, 2)))
        );
        assert_eq!(Value::from_json(&json!(null), DataType::Int), Some(Value::Null));
        assert_eq!(Value::from_json(&json!("x"), DataType::Int), None);
    }

    #[test]
    fn test_timestamp_round_trip_formats() {
        let ts = parse_timestamp("2024-03-01 10:30:00").unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:30:00"), Some(ts));
        assert_eq!(Value::Timestamp(ts).to_json(), json!("2024-03-01 10:30:00"));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }
}
