// Components imported into the application under test

use crate::class::TestClass;
use std::fmt;
use std::sync::Arc;
use testbed_core::{Bean, BeanFactory, Container, TypeKey};

/// A concrete type that can be imported: constructed by the container on
/// first lookup and bound under its own key plus its declared contracts.
pub trait Component: Send + Sync + Sized + 'static {
    /// Build the component, resolving collaborators from the container.
    fn create(container: &Container) -> testbed_core::Result<Self>;

    /// Default binding name.
    fn service_name() -> Option<&'static str> {
        None
    }

    /// Additional contracts the component is bound to.
    fn contracts() -> Vec<TypeKey> {
        Vec::new()
    }

    fn type_key() -> TypeKey {
        TypeKey::of::<Self>()
    }

    /// Wrap the instance as a bean. Override to attach trait-object views
    /// for the contracts.
    fn into_bean(self: Arc<Self>) -> Bean {
        Bean::from_arc(self)
    }
}

/// Type-erased form of a [`Component`].
#[derive(Clone)]
pub struct ComponentDefinition {
    key: TypeKey,
    service_name: Option<String>,
    contracts: Vec<TypeKey>,
    factory: BeanFactory,
}

impl ComponentDefinition {
    pub fn of<C: Component>() -> Self {
        let factory: BeanFactory = Arc::new(|container: &Container| {
            let instance = Arc::new(C::create(container)?);
            Ok(instance.into_bean().with_type_key(C::type_key()))
        });
        Self {
            key: C::type_key(),
            service_name: C::service_name().map(str::to_string),
            contracts: C::contracts(),
            factory,
        }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn contracts(&self) -> &[TypeKey] {
        &self.contracts
    }

    pub fn factory(&self) -> &BeanFactory {
        &self.factory
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("key", &self.key)
            .field("service_name", &self.service_name)
            .field("contracts", &self.contracts)
            .finish()
    }
}

/// An import resolved to the name it will be bound under.
#[derive(Debug, Clone)]
pub struct ImportedComponent {
    definition: ComponentDefinition,
    name: Option<String>,
}

impl ImportedComponent {
    pub fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Imports declared across a test class hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    imports: Vec<ImportedComponent>,
}

impl ImportContext {
    /// Collect imports. A declared import name replaces the component's own
    /// service name, but only when the import lists a single component.
    pub fn from_class(class: &Arc<TestClass>) -> Self {
        let mut imports = Vec::new();
        for import in class.collect_imports() {
            let single = import.components().len() == 1;
            let declared = import.name().filter(|n| !n.trim().is_empty());

            for definition in import.components() {
                let name = match declared {
                    Some(name) if single => Some(name.to_string()),
                    _ => definition.service_name().map(str::to_string),
                };
                imports.push(ImportedComponent {
                    definition: definition.clone(),
                    name,
                });
            }
        }
        Self { imports }
    }

    pub fn imports(&self) -> &[ImportedComponent] {
        &self.imports
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}
