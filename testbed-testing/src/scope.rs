// Registry of live test scopes, one per test class

use crate::Result;
use crate::class::{TestClass, TestClassId};
use crate::context::TestContextManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Live scopes keyed by test class. Clones share the same entries.
#[derive(Clone, Default)]
pub struct ScopeRegistry {
    scopes: Arc<Mutex<HashMap<TestClassId, Arc<TestContextManager>>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope for `class`, created on first request.
    pub fn get_or_create(&self, class: &Arc<TestClass>) -> Result<Arc<TestContextManager>> {
        let mut scopes = self.scopes.lock();
        if let Some(existing) = scopes.get(class.id()) {
            return Ok(existing.clone());
        }

        let manager = Arc::new(TestContextManager::new(class.clone())?);
        scopes.insert(class.id().clone(), manager.clone());
        debug!(class = %class.id(), live_scopes = scopes.len(), "Registered test scope");
        Ok(manager)
    }

    pub fn get(&self, id: &TestClassId) -> Option<Arc<TestContextManager>> {
        self.scopes.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &TestClassId) -> Option<Arc<TestContextManager>> {
        let removed = self.scopes.lock().remove(id);
        if removed.is_some() {
            debug!(class = %id, "Removed test scope");
        }
        removed
    }

    pub fn contains(&self, id: &TestClassId) -> bool {
        self.scopes.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scopes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What an extension sees: the class being run and the scope store.
#[derive(Clone)]
pub struct ExtensionContext {
    test_class: Arc<TestClass>,
    store: ScopeRegistry,
}

impl ExtensionContext {
    pub fn new(test_class: Arc<TestClass>, store: ScopeRegistry) -> Self {
        Self { test_class, store }
    }

    pub fn test_class(&self) -> &Arc<TestClass> {
        &self.test_class
    }

    pub fn class_id(&self) -> &TestClassId {
        self.test_class.id()
    }

    pub fn store(&self) -> &ScopeRegistry {
        &self.store
    }
}
