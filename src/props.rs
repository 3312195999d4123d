//! Section props resolution
//!
//! A section stores only its overrides. The effective props are the component's
//! `default_props` with the overrides merged on top, and are checked against the
//! component's JSON Schema.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::{ComposerError, Result};

/// Deep-merge `overrides` over `defaults`.
///
/// Objects merge key by key; any other override value replaces the default.
pub fn merge_props(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(base), Value::Object(top)) => {
            let mut merged = base.clone();
            for (key, value) in top {
                let next = match merged.get(key) {
                    Some(existing) => merge_props(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base.clone(),
        (_, top) => top.clone(),
    }
}

/// Whether a component schema actually constrains anything
fn is_constraining(schema: &Value) -> bool {
    match schema {
        Value::Object(map) => !map.is_empty(),
        Value::Bool(allow) => !allow,
        _ => false,
    }
}

/// Validate props against a component's JSON Schema
pub fn validate_props(schema: &Value, props: &Value) -> Result<()> {
    if !is_constraining(schema) {
        return Ok(());
    }
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| ComposerError::Validation(format!("invalid component schema: {e}")))?;

    if let Err(errors) = compiled.validate(props) {
        let messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        return Err(ComposerError::Validation(format!(
            "props do not match component schema: {}",
            messages.join("; ")
        )));
    }
    Ok(())
}
