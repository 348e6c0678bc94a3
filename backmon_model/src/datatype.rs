//! Column datatypes and auto-detection for undeclared columns.

use serde_json::Value;

/// Datatype of a table column, driving how a field value is rendered in
/// line protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// No declared type; the value is emitted unchanged.
    None,
    String,
    Bool,
    Int,
    Float,
    /// Epoch timestamp in any precision, normalized to seconds and emitted
    /// as an integer field.
    Timestamp,
}

impl Datatype {
    /// Detects the datatype of an undeclared value.
    ///
    /// Checks run in a fixed order; bool is tested before int so boolean
    /// values are never mistaken for numbers.
    pub fn detect(value: &Value) -> Datatype {
        match value {
            Value::Null => Datatype::None,
            Value::String(_) => Datatype::String,
            Value::Bool(_) => Datatype::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Datatype::Int,
            Value::Number(_) => Datatype::Float,
            _ => {
                tracing::error!(%value, "no datatype matched, treating value as untyped");
                Datatype::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn detection_order() {
        assert_eq!(Datatype::detect(&json!(null)), Datatype::None);
        assert_eq!(Datatype::detect(&json!("text")), Datatype::String);
        assert_eq!(Datatype::detect(&json!(true)), Datatype::Bool);
        assert_eq!(Datatype::detect(&json!(42)), Datatype::Int);
        assert_eq!(Datatype::detect(&json!(4.2)), Datatype::Float);
    }

    #[test]
    fn structured_values_are_untyped() {
        assert_eq!(Datatype::detect(&json!([1, 2])), Datatype::None);
        assert_eq!(Datatype::detect(&json!({"a": 1})), Datatype::None);
    }
}
