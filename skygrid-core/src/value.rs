//! Scalar attribute values.
//!
//! Features carry a flat mapping of field name to scalar value. Only two
//! runtime representations exist: strings and 64-bit floats. Date-typed
//! fields are normalized to epoch milliseconds (as `Num`) at ingestion, so
//! query-time comparison never needs to parse dates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric value (also used for date fields, as epoch milliseconds).
    Num(f64),
    /// String value.
    Str(String),
}

impl Value {
    /// Get the numeric value, if this is a number.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(_) => None,
        }
    }

    /// Get the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Num(_) => None,
        }
    }

    /// Compare two values for filter evaluation.
    ///
    /// Values of different kinds are incomparable (`None`), as are NaNs.
    /// A failed comparison makes the enclosing predicate false rather than
    /// erroring, so one odd value cannot poison a whole query.
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert from a JSON value, if it is a representable scalar.
    ///
    /// Booleans map to 0.0/1.0; null, arrays and objects are not scalars.
    pub fn from_json(v: &serde_json::Value) -> Option<Value> {
        match v {
            serde_json::Value::Number(n) => n.as_f64().map(Value::Num),
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Num(if *b { 1.0 } else { 0.0 })),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_cmp_same_kind() {
        assert_eq!(
            Value::Num(1.0).partial_cmp_value(&Value::Num(2.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Str("b".into()).partial_cmp_value(&Value::Str("a".into())),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_value_cmp_mixed_kind_is_none() {
        assert_eq!(
            Value::Num(1.0).partial_cmp_value(&Value::Str("1".into())),
            None
        );
        assert_eq!(
            Value::Num(f64::NAN).partial_cmp_value(&Value::Num(1.0)),
            None
        );
    }

    #[test]
    fn test_value_json_roundtrip() {
        let v = Value::from_json(&serde_json::json!(42.5)).unwrap();
        assert_eq!(v, Value::Num(42.5));
        assert_eq!(v.to_json(), serde_json::json!(42.5));

        let v = Value::from_json(&serde_json::json!("HST")).unwrap();
        assert_eq!(v.to_json(), serde_json::json!("HST"));

        assert!(Value::from_json(&serde_json::json!(null)).is_none());
        assert!(Value::from_json(&serde_json::json!([1, 2])).is_none());
    }
}
