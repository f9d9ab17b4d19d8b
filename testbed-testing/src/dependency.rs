// Explicit dependency registrations made through extension hooks

use testbed_core::{Bean, TypeKey};

/// A dependency to bind into the application under test.
#[derive(Debug, Clone)]
pub struct DependencyInfo {
    key: TypeKey,
    name: Option<String>,
    bean: Bean,
}

impl DependencyInfo {
    pub fn new(key: TypeKey, name: Option<String>, bean: Bean) -> Self {
        Self { key, name, bean }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bean(&self) -> &Bean {
        &self.bean
    }
}

/// Registrations in the order they were made.
#[derive(Debug, Clone, Default)]
pub struct DependencyContext {
    dependencies: Vec<DependencyInfo>,
}

impl DependencyContext {
    pub fn add(&mut self, key: TypeKey, name: Option<String>, bean: Bean) {
        self.dependencies.push(DependencyInfo::new(key, name, bean));
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyInfo> {
        self.dependencies.iter()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
