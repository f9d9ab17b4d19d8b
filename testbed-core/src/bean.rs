// Type-erased values stored in the container

use crate::types::TypeKey;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type AnyArc = Arc<dyn Any + Send + Sync>;

/// A shared, type-erased instance plus the key of its concrete type.
///
/// Trait-object access is provided through views: a bean built from a
/// concrete `Arc<WidgetServiceImpl>` can carry an `Arc<dyn WidgetService>`
/// view so that consumers asking for the trait get the same instance.
#[derive(Clone)]
pub struct Bean {
    type_key: TypeKey,
    value: AnyArc,
    views: Arc<HashMap<TypeId, AnyArc>>,
}

impl Bean {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            value,
            views: Arc::new(HashMap::new()),
        }
    }

    /// Replace the concrete type key, e.g. with a structural generic key.
    pub fn with_type_key(mut self, type_key: TypeKey) -> Self {
        self.type_key = type_key;
        self
    }

    /// Attach an alternative view of the same instance, typically an
    /// `Arc<dyn Trait>`.
    pub fn with_view<V: Clone + Send + Sync + 'static>(mut self, view: V) -> Self {
        Arc::make_mut(&mut self.views).insert(TypeId::of::<V>(), Arc::new(view));
        self
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    /// Downcast to the concrete type the bean was built from.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Fetch a registered view, falling back to the value itself when the
    /// bean was built directly from a `V`.
    pub fn view<V: Clone + Send + Sync + 'static>(&self) -> Option<V> {
        self.views
            .get(&TypeId::of::<V>())
            .and_then(|view| view.downcast_ref::<V>())
            .or_else(|| self.value.downcast_ref::<V>())
            .cloned()
    }

    /// Whether two beans share the same underlying instance.
    pub fn ptr_eq(&self, other: &Bean) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("type_key", &self.type_key)
            .field("views", &self.views.len())
            .finish()
    }
}
