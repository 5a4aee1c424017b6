//! JSON rendering of evaluation results.
//!
//! Values map onto JSON directly, with two exceptions JSON cannot express:
//!
//! - decimals and integers wider than 64 bits become strings, so no digit
//!   is lost to a float conversion
//! - non-finite floats (`inf`, `nan`) become `null`
//!
//! # Examples
//!
//! ```
//! use safe_expr::Value;
//! use safe_expr::output::{to_json, to_json_pretty};
//!
//! let value = Value::List(vec![Value::Integer(1), Value::Float(2.5)]);
//! assert_eq!(to_json(&value), "[1,2.5]");
//! assert_eq!(to_json_pretty(&value), "[\n  1,\n  2.5\n]");
//! ```

use crate::value::Value;

/// Converts a value into a `serde_json` tree.
pub fn to_json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::Number((*n).into()),
        Value::BigInt(n) => serde_json::Value::String(n.to_string()),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json_value).collect()),
        Value::Decimal(d) => serde_json::Value::String(d.to_string()),
    }
}

/// Compact JSON text.
pub fn to_json(value: &Value) -> String {
    to_json_value(value).to_string()
}

/// JSON text indented by two spaces.
pub fn to_json_pretty(value: &Value) -> String {
    // Serializing an in-memory tree cannot fail
    serde_json::to_string_pretty(&to_json_value(value)).unwrap_or_else(|_| to_json(value))
}
