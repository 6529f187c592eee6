//! Utility functions for working with `serde_json::Value`.

use serde_json::{Number, Value};

/// Get the type name of a value for error messages.
#[must_use]
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract i64 from a number, trying both i64 and f64 representations.
#[inline]
#[must_use]
pub fn number_as_i64(num: &Number) -> Option<i64> {
    num.as_i64().or_else(|| num.as_f64().map(|f| f as i64))
}

/// Extract f64 from a number, trying both f64 and i64 representations.
#[inline]
#[must_use]
pub fn number_as_f64(num: &Number) -> Option<f64> {
    num.as_f64().or_else(|| num.as_i64().map(|i| i as f64))
}

/// Check if a value is truthy (not null, false, 0, NaN, or empty).
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(f) = n.as_f64() {
                f != 0.0 && !f.is_nan()
            } else {
                true // u64 values beyond i64 range
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_names() {
        assert_eq!(value_type_name(&Value::Null), "null");
        assert_eq!(value_type_name(&json!(true)), "boolean");
        assert_eq!(value_type_name(&json!(42)), "number");
        assert_eq!(value_type_name(&json!("s")), "string");
        assert_eq!(value_type_name(&json!([])), "array");
        assert_eq!(value_type_name(&json!({})), "object");
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(true)));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("x")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!([0])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!({"k": 1})));
    }

    #[test]
    fn number_coercions() {
        assert_eq!(number_as_i64(&Number::from(7)), Some(7));
        assert_eq!(number_as_f64(&Number::from(7)), Some(7.0));
        let float = Number::from_f64(2.5).unwrap();
        assert_eq!(number_as_i64(&float), Some(2));
        assert_eq!(number_as_f64(&float), Some(2.5));
    }
}
