//! Flattening of nested documents into the canonical key space.

use std::collections::HashMap;

use serde_json::Value;

use crate::{DecodeError, Result};

/// Flatten an already-parsed document into a canonical-path -> string-value
/// mapping.
///
/// Maps recurse with `/key` appended, sequences with `/index` appended
/// (zero-based - scalar elements included, there is no value-keyed special
/// case). Scalars stringify to their canonical text: `null` becomes the
/// literal `<nil>`, booleans `true`/`false`, numbers their decimal form.
/// Every leaf produces exactly one entry.
///
/// The root must be a map or a sequence; a bare scalar has no path to live
/// under and is rejected as [`DecodeError::UnsupportedRoot`].
pub fn flatten(document: &Value) -> Result<HashMap<String, String>> {
    if !document.is_object() && !document.is_array() {
        return Err(DecodeError::UnsupportedRoot.into());
    }

    let mut values = HashMap::new();
    walk(document, "", &mut values);
    Ok(values)
}

fn walk(
    node: &Value,
    path: &str,
    values: &mut HashMap<String, String>,
) {
    match node {
        Value::Object(entries) => {
            for (key, child) in entries {
                walk(child, &format!("{path}/{key}"), values);
            }
        }
        Value::Array(elements) => {
            for (index, child) in elements.iter().enumerate() {
                walk(child, &format!("{path}/{index}"), values);
            }
        }
        leaf => {
            values.insert(path.to_string(), scalar_text(leaf));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // containers are handled by walk()
        _ => unreachable!("scalar_text called on a container"),
    }
}
