//! Configuration for testbed applications.
//!
//! A configuration file (YAML, JSON or TOML) is loaded into a JSON value
//! tree, dotted-path overrides are applied on top of it, and the result is
//! exposed through [`Configuration`] for typed lookups.
//!
//! ```
//! use testbed_config::{ConfigOverride, Configuration};
//!
//! let mut config = Configuration::from_value(serde_json::json!({
//!     "server": { "port": 8080 }
//! }));
//! config.apply(&ConfigOverride::random_ports()).unwrap();
//! assert_eq!(config.get::<u16>("server.port").unwrap(), 0);
//! ```

pub mod error;
pub mod loader;
pub mod overrides;

pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use overrides::{ConfigOverride, apply_override};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Loaded application configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    root: Value,
}

impl Configuration {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Load `path` (format picked from the extension) and apply `overrides`
    /// in order.
    pub fn load(path: impl AsRef<Path>, overrides: &[ConfigOverride]) -> Result<Self> {
        let path = path.as_ref();
        let root = ConfigLoader::auto(path)?.load_file(path)?;
        let mut config = Self::from_value(root);
        for config_override in overrides {
            config.apply(config_override)?;
        }
        tracing::debug!(
            path = %path.display(),
            overrides = overrides.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn apply(&mut self, config_override: &ConfigOverride) -> Result<()> {
        apply_override(&mut self.root, config_override)
    }

    /// Raw value at a dotted path.
    pub fn value(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    pub fn has(&self, path: &str) -> bool {
        self.value(path).is_some_and(|v| !v.is_null())
    }

    /// Typed value at a dotted path.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self
            .value(path)
            .ok_or_else(|| ConfigError::KeyNotFound(path.to_string()))?;
        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", path, e)))
    }

    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    /// String form of a scalar, so `port: 8080` reads as `"8080"`.
    pub fn get_string(&self, path: &str) -> Option<String> {
        match self.value(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Deserialize the whole tree into an application config type.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.root.clone())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct AppConfig {
        name: String,
        server: ServerConfig,
    }

    #[derive(Debug, Deserialize)]
    struct ServerConfig {
        port: u16,
    }

    fn sample() -> Configuration {
        Configuration::from_value(json!({
            "name": "widgets",
            "server": { "port": 8080, "hosts": ["a", "b"] },
            "debug": true
        }))
    }

    #[test]
    fn test_get_dotted_path() {
        let config = sample();
        assert_eq!(config.get::<u16>("server.port").unwrap(), 8080);
        assert_eq!(config.get::<String>("server.hosts.1").unwrap(), "b");
        assert!(config.has("debug"));
        assert!(!config.has("server.missing"));
    }

    #[test]
    fn test_get_missing_key() {
        let err = sample().get::<String>("nope").unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound(_)));
    }

    #[test]
    fn test_get_string_of_scalars() {
        let config = sample();
        assert_eq!(config.get_string("server.port").as_deref(), Some("8080"));
        assert_eq!(config.get_string("debug").as_deref(), Some("true"));
        assert_eq!(config.get_string("server"), None);
    }

    #[test]
    fn test_get_or_default() {
        assert_eq!(sample().get_or("server.timeout", 30u32), 30);
    }

    #[test]
    fn test_bind_typed() {
        let app: AppConfig = sample().bind().unwrap();
        assert_eq!(app.name, "widgets");
        assert_eq!(app.server.port, 8080);
    }

    #[test]
    fn test_load_with_overrides_in_order() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "name: widgets\nserver:\n  port: 8080").unwrap();

        let overrides = [
            ConfigOverride::config("name", "first"),
            ConfigOverride::config("name", "second"),
            ConfigOverride::random_ports(),
        ];
        let config = Configuration::load(file.path(), &overrides).unwrap();
        assert_eq!(config.get::<String>("name").unwrap(), "second");
        assert_eq!(config.get::<u16>("server.port").unwrap(), 0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Configuration::load("/definitely/not/here.yml", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
