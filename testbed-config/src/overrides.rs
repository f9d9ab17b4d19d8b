// Dotted-path overrides applied on top of a loaded configuration tree

use crate::{ConfigError, Result};
use serde_json::{Map, Number, Value};

/// A single `key=value` override, where the key is a dotted path such as
/// `server.port` or `database.pool.size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverride {
    key: String,
    value: String,
}

impl ConfigOverride {
    pub fn config(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Override that asks the server to bind an ephemeral port.
    pub fn random_ports() -> Self {
        Self::config("server.port", "0")
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Apply an override to `root`, creating intermediate objects as needed.
///
/// The raw string is coerced to the JSON type of the value it replaces
/// (number, bool) and kept as a string otherwise, so `server.port=0` keeps
/// the port numeric.
pub fn apply_override(root: &mut Value, config_override: &ConfigOverride) -> Result<()> {
    let key = config_override.key();
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::OverrideError {
            key: key.to_string(),
            reason: "empty path segment".to_string(),
        });
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ConfigError::OverrideError {
            key: key.to_string(),
            reason: "empty key".to_string(),
        })?;

    let mut current = root;
    for segment in parents {
        current = child_object(current, key, segment)?;
    }

    let map = as_object(current, key)?;
    let coerced = coerce(map.get(*last), config_override.value());
    map.insert((*last).to_string(), coerced);
    Ok(())
}

fn child_object<'a>(node: &'a mut Value, key: &str, segment: &str) -> Result<&'a mut Value> {
    let map = as_object(node, key)?;
    let child = map
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if child.is_null() {
        *child = Value::Object(Map::new());
    }
    Ok(child)
}

fn as_object<'a>(node: &'a mut Value, key: &str) -> Result<&'a mut Map<String, Value>> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .ok_or_else(|| ConfigError::OverrideError {
            key: key.to_string(),
            reason: "path crosses a non-object value".to_string(),
        })
}

fn coerce(existing: Option<&Value>, raw: &str) -> Value {
    match existing {
        Some(Value::Number(_)) => {
            if let Ok(int) = raw.parse::<i64>() {
                return Value::Number(int.into());
            }
            if let Some(float) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(float);
            }
            Value::String(raw.to_string())
        }
        Some(Value::Bool(_)) => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}
