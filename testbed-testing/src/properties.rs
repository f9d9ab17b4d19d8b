//! `key=value` property tokens and the ordered override set built from them.

use crate::class::{AppTest, TestClass};
use crate::{FixtureError, Result};
use std::sync::Arc;
use testbed_core::ConfigOverride;

/// Split `key=value`. Anything other than exactly one `=` is a
/// configuration error.
pub fn split_property(property: &str) -> Result<(String, String)> {
    let mut parts = property.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => Ok((key.to_string(), value.to_string())),
        _ => Err(FixtureError::Configuration(format!(
            "Invalid property detected: {}",
            property
        ))),
    }
}

/// Split `key=value` and replace `${token}` in the value with `value`.
pub fn split_property_with_variable(
    property: &str,
    token: &str,
    value: &str,
) -> Result<(String, String)> {
    let (key, raw) = split_property(property)?;
    let placeholder = format!("${{{}}}", token);
    Ok((key, raw.replace(&placeholder, value)))
}

/// Ordered key/value overrides with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyOverrides {
    entries: Vec<(String, String)>,
}

impl PropertyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is present. Returns whether it was inserted.
    pub fn put_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    /// Insert or replace, keeping the original position of a replaced key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_config_overrides(&self) -> Vec<ConfigOverride> {
        self.entries
            .iter()
            .map(|(k, v)| ConfigOverride::config(k.clone(), v.clone()))
            .collect()
    }
}

/// Merges property declarations across a class hierarchy.
///
/// `TestProperties` declarations come first (closest class first), then
/// the `AppTest` properties; the first occurrence of a key wins and tokens
/// with a blank key or value are skipped.
#[derive(Debug, Clone, Default)]
pub struct PropertyCollector {
    variables: Vec<(String, String)>,
}

impl PropertyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `${token}` with `value` in every collected value.
    pub fn with_variable(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((token.into(), value.into()));
        self
    }

    pub fn split(&self, property: &str) -> Result<(String, String)> {
        let (key, value) = split_property(property)?;
        let value = self.variables.iter().fold(value, |acc, (token, v)| {
            acc.replace(&format!("${{{}}}", token), v)
        });
        Ok((key, value))
    }

    pub fn collect(&self, class: &Arc<TestClass>, app_test: &AppTest) -> Result<PropertyOverrides> {
        let mut overrides = PropertyOverrides::new();
        let tokens = class
            .collect_test_properties()
            .into_iter()
            .chain(app_test.property_tokens().iter().cloned());

        for token in tokens {
            let (key, value) = self.split(&token)?;
            if key.trim().is_empty() || value.trim().is_empty() {
                continue;
            }
            overrides.put_if_absent(key, value);
        }
        Ok(overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbed_core::{Application, Configuration, Environment};

    #[derive(Default)]
    struct NoopApp;

    #[testbed_core::async_trait]
    impl Application for NoopApp {
        async fn run(&self, _c: &Configuration, _e: &mut Environment) -> testbed_core::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_split_property() {
        assert_eq!(
            split_property("name=value").unwrap(),
            ("name".to_string(), "value".to_string())
        );
        assert_eq!(split_property("empty=").unwrap().1, "");
    }

    #[test]
    fn test_split_property_malformed() {
        for bad in ["badtoken", "a=b=c", ""] {
            let err = split_property(bad).unwrap_err();
            assert!(matches!(err, FixtureError::Configuration(_)), "{bad}");
        }
    }

    #[test]
    fn test_split_property_with_variable() {
        let (key, value) = split_property_with_variable(
            "description=${endpoint}",
            "endpoint",
            "http://localhost:9000",
        )
        .unwrap();
        assert_eq!(key, "description");
        assert_eq!(value, "http://localhost:9000");
    }

    #[test]
    fn test_variable_leaves_other_tokens() {
        let (_, value) =
            split_property_with_variable("url=${host}:${port}", "host", "localhost").unwrap();
        assert_eq!(value, "localhost:${port}");
    }

    #[test]
    fn test_put_if_absent_first_wins() {
        let mut overrides = PropertyOverrides::new();
        assert!(overrides.put_if_absent("name", "first"));
        assert!(!overrides.put_if_absent("name", "second"));
        overrides.insert("other", "x");
        overrides.insert("name", "replaced");

        let entries: Vec<_> = overrides.iter().collect();
        assert_eq!(entries, vec![("name", "replaced"), ("other", "x")]);
    }

    #[test]
    fn test_collect_precedence() {
        let parent = TestClass::new("Parent")
            .test_properties(["name=parent", "inherited=yes"])
            .build();
        let app_test = AppTest::of::<NoopApp>("config.yml")
            .properties(["name=annotation", "fromAnnotation=1", "blank= ", "=novalue"]);
        let child = TestClass::new("Child")
            .extends(parent)
            .test_properties(["name=child"])
            .build();

        let overrides = PropertyCollector::new().collect(&child, &app_test).unwrap();
        assert_eq!(overrides.get("name"), Some("child"));
        assert_eq!(overrides.get("inherited"), Some("yes"));
        assert_eq!(overrides.get("fromAnnotation"), Some("1"));
        assert!(!overrides.contains("blank"));
        assert_eq!(overrides.len(), 3);
    }

    #[test]
    fn test_collect_malformed_fails() {
        let class = TestClass::new("T").test_properties(["badtoken"]).build();
        let app_test = AppTest::of::<NoopApp>("config.yml");
        assert!(PropertyCollector::new().collect(&class, &app_test).is_err());
    }

    #[test]
    fn test_collect_with_variable() {
        let class = TestClass::new("T")
            .test_properties(["description=${endpoint}"])
            .build();
        let app_test = AppTest::of::<NoopApp>("config.yml");

        let overrides = PropertyCollector::new()
            .with_variable("endpoint", "http://localhost:9000")
            .collect(&class, &app_test)
            .unwrap();
        assert_eq!(overrides.get("description"), Some("http://localhost:9000"));
    }
}
