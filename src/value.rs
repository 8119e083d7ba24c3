//! Stored value handling.
//!
//! Stored content is read once at render time and may predate the
//! current schema, so every path in here recovers instead of failing:
//! malformed JSON for a composite becomes an empty object/array and
//! the editor always has something renderable.

use serde_json::Value;

use crate::schema::FieldSchema;

/// Parse a stored raw value for a field. Never fails: malformed or
/// shape-mismatched input degrades to the schema's empty value.
pub fn parse_stored(raw: Option<&str>, schema: &FieldSchema) -> Value {
    let parsed = match raw {
        None | Some("") => None,
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "stored field value is not valid JSON; treating as empty");
                None
            }
        },
    };
    coerce(parsed.unwrap_or(Value::Null), schema)
}

/// Force a value into the broad shape its schema expects. Wrong-shaped
/// composites degrade to empty; primitives pass through untouched so
/// drifted scalars stay visible in their controls.
pub fn coerce(value: Value, schema: &FieldSchema) -> Value {
    match schema {
        FieldSchema::Primitive(prim) => {
            if value.is_null() {
                prim.common.default.clone().unwrap_or(Value::Null)
            } else {
                value
            }
        }
        FieldSchema::Object(_) => match value {
            Value::Object(_) => value,
            Value::Null => Value::Object(Default::default()),
            other => {
                tracing::warn!(got = %shape_name(&other), "stored object value has wrong shape; treating as empty");
                Value::Object(Default::default())
            }
        },
        FieldSchema::Array(_) | FieldSchema::Blocks(_) => match value {
            Value::Array(_) => value,
            Value::Null => Value::Array(Vec::new()),
            other => {
                tracing::warn!(got = %shape_name(&other), "stored list value has wrong shape; treating as empty");
                Value::Array(Vec::new())
            }
        },
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
