// Test instance state: one slot per declared field

use crate::class::{Field, TestClass, TestClassId};
use std::sync::Arc;
use testbed_core::Bean;

/// A constructed test instance.
///
/// Fields start out holding their preset value, if any. Final fields are
/// filled during construction; mutable mock fields may be filled later.
#[derive(Debug, Clone)]
pub struct TestInstance {
    class: TestClassId,
    fields: Vec<Field>,
    values: Vec<Option<Bean>>,
}

impl TestInstance {
    pub fn new(class: &Arc<TestClass>) -> Self {
        let fields = class.all_fields();
        let values = fields.iter().map(|f| f.preset_value().cloned()).collect();
        Self {
            class: class.id().clone(),
            fields,
            values,
        }
    }

    pub fn class_id(&self) -> &TestClassId {
        &self.class
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Bean> {
        self.index(name).and_then(|i| self.values[i].as_ref())
    }

    pub fn get_as<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|bean| bean.get::<T>())
    }

    pub fn view<V: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<V> {
        self.get(name).and_then(|bean| bean.view::<V>())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a field. Returns `false` when no field has that name.
    pub fn set(&mut self, name: &str, value: Bean) -> bool {
        match self.index(name) {
            Some(i) => {
                self.values[i] = Some(value);
                true
            }
            None => false,
        }
    }
}
