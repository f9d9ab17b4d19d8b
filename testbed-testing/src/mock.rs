// Mocks declared by a test class

use crate::class::{Mutability, TestClass};
use crate::double::MockInstance;
use crate::instance::TestInstance;
use crate::{FixtureError, Result};
use std::sync::Arc;
use testbed_core::TypeKey;
use tracing::warn;

/// Contract and optional name a mock is bound under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockDefinition {
    key: TypeKey,
    name: Option<String>,
}

impl MockDefinition {
    pub fn new(key: TypeKey, name: Option<String>) -> Self {
        Self { key, name }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Mock instances for one test class, created once per scope.
#[derive(Clone, Default)]
pub struct MockContext {
    mocks: Vec<(MockDefinition, MockInstance)>,
}

impl MockContext {
    /// Create a double for every class-level and field-level mock declaration.
    pub fn from_class(class: &Arc<TestClass>) -> Result<Self> {
        let mut mocks = Vec::new();

        for mock_bean in class.collect_mock_beans() {
            let types = mock_bean.mock_types();
            if types.is_empty() {
                return Err(FixtureError::Configuration(format!(
                    "MockBean on {} must declare at least one type at class level",
                    class.id()
                )));
            }

            // A name only identifies a binding when exactly one type is declared
            let name = match types.len() {
                1 => mock_bean.name().map(str::to_string),
                _ => None,
            };
            for spec in types {
                let definition = MockDefinition::new(spec.contract().clone(), name.clone());
                mocks.push((definition, spec.create()));
            }
        }

        for field in class.all_fields() {
            let Some(mock_bean) = field.mock_declaration() else {
                continue;
            };
            for spec in mock_bean.mock_types() {
                let definition = MockDefinition::new(
                    field.key().clone(),
                    mock_bean.name().map(str::to_string),
                );
                let instance = spec.create().with_type_key(field.key().clone());
                mocks.push((definition, instance));
            }
        }

        Ok(Self { mocks })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(MockDefinition, MockInstance)> {
        self.mocks.iter()
    }

    pub fn len(&self) -> usize {
        self.mocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }

    /// Reset every double. Failures are logged and do not stop the others;
    /// returns how many resets failed.
    pub fn reset_mocks(&self) -> usize {
        let mut failures = 0;
        for (definition, instance) in &self.mocks {
            if let Err(err) = instance.double().reset() {
                failures += 1;
                warn!(
                    contract = %definition.key(),
                    name = ?definition.name(),
                    error = %err,
                    "Failed to reset mock"
                );
            }
        }
        failures
    }

    /// Fill unset mutable fields declared as mocks with their doubles.
    pub fn inject_test_instance_mocks(&self, instance: &mut TestInstance) {
        let fields: Vec<_> = instance
            .fields()
            .iter()
            .filter(|f| f.mutability() == Mutability::Mutable)
            .filter_map(|f| f.mock_declaration().map(|m| (f.clone(), m.clone())))
            .collect();

        for (field, mock_bean) in fields {
            if instance.is_set(field.name()) {
                continue;
            }
            let wanted =
                MockDefinition::new(field.key().clone(), mock_bean.name().map(str::to_string));
            if let Some((_, mock)) = self.mocks.iter().find(|(d, _)| *d == wanted) {
                instance.set(field.name(), mock.bean().clone());
            }
        }
    }
}
