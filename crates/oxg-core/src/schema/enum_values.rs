//! Typed parsing of `enum` and `default` values.
//!
//! Values are compared structurally; numbers keep their source precision, so
//! `1` and `1.0` are distinct lexically but equal structurally only when
//! serde_json says so.

use serde_json::Value;

use super::SchemaKind;
use crate::error::SchemaError;

/// JSON type of a value, for type checks and inference.
pub fn value_kind(value: &Value) -> SchemaKind {
    match value {
        Value::Null => SchemaKind::Null,
        Value::Bool(_) => SchemaKind::Boolean,
        Value::Number(n) => {
            if is_integral(n) {
                SchemaKind::Integer
            } else {
                SchemaKind::Number
            }
        }
        Value::String(_) => SchemaKind::String,
        Value::Array(_) => SchemaKind::Array,
        Value::Object(_) => SchemaKind::Object,
    }
}

fn is_integral(n: &serde_json::Number) -> bool {
    let repr = n.to_string();
    !repr.contains(['.', 'e', 'E'])
}

fn matches_kind(value: &Value, kind: SchemaKind) -> bool {
    match kind {
        SchemaKind::Empty => true,
        SchemaKind::Number => value.is_number(),
        SchemaKind::Integer => matches!(value, Value::Number(n) if is_integral(n)),
        other => value_kind(value) == other,
    }
}

/// Validate enum values against the declared kind: every value must have the
/// declared type, `null` requires `nullable`, and duplicates (by structural
/// equality) are rejected.
pub fn check_enum(
    values: &[Value],
    kind: SchemaKind,
    nullable: bool,
) -> Result<Vec<Value>, SchemaError> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if value.is_null() {
            if !nullable {
                return Err(SchemaError::NullableRequired("enum value"));
            }
        } else if !matches_kind(value, kind) {
            return Err(SchemaError::UnexpectedType {
                expected: kind.as_str().to_string(),
                actual: value_kind(value).as_str().to_string(),
            });
        }
        if out.contains(value) {
            return Err(SchemaError::DuplicateEnum(value.to_string()));
        }
        out.push(value.clone());
    }
    Ok(out)
}

/// Validate a `default` value against the declared kind.
pub fn check_default(value: &Value, kind: SchemaKind, nullable: bool) -> Result<(), SchemaError> {
    if value.is_null() {
        if !nullable {
            return Err(SchemaError::NullableRequired("default value"));
        }
        return Ok(());
    }
    if !matches_kind(value, kind) {
        return Err(SchemaError::UnexpectedType {
            expected: kind.as_str().to_string(),
            actual: value_kind(value).as_str().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicates_rejected() {
        let values = vec![json!("a"), json!("b"), json!("a")];
        let err = check_enum(&values, SchemaKind::String, false).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEnum(_)));
    }

    #[test]
    fn null_requires_nullable() {
        let values = vec![json!("a"), Value::Null];
        assert!(matches!(
            check_enum(&values, SchemaKind::String, false),
            Err(SchemaError::NullableRequired(_))
        ));
        assert!(check_enum(&values, SchemaKind::String, true).is_ok());
    }

    #[test]
    fn type_mismatch() {
        let values = vec![json!(1), json!("two")];
        assert!(matches!(
            check_enum(&values, SchemaKind::Integer, false),
            Err(SchemaError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn integer_vs_number() {
        assert!(check_enum(&[json!(1), json!(2)], SchemaKind::Integer, false).is_ok());
        assert!(check_enum(&[json!(1.5)], SchemaKind::Integer, false).is_err());
        assert!(check_enum(&[json!(1.5), json!(2)], SchemaKind::Number, false).is_ok());
    }

    #[test]
    fn default_checks() {
        assert!(check_default(&json!("x"), SchemaKind::String, false).is_ok());
        assert!(check_default(&Value::Null, SchemaKind::String, false).is_err());
        assert!(check_default(&Value::Null, SchemaKind::String, true).is_ok());
        assert!(check_default(&json!([1]), SchemaKind::String, false).is_err());
    }
}
