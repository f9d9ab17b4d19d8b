//! Structural type identities.
//!
//! A [`TypeKey`] names a type together with its type arguments, so
//! `GenericService<String>` and `GenericService<i64>` are distinct keys while
//! two independently built `GenericService<String>` keys compare equal.
//! Supertype relationships are not discoverable at runtime, so they are
//! declared up front as [`TypeDescriptor`]s in a [`TypeCatalog`].

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Type identity including generic arguments.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    name: String,
    args: Vec<TypeKey>,
}

impl TypeKey {
    /// Key for a plain, non-generic name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Key for a parameterized type such as `GenericService<String>`.
    pub fn generic(name: impl Into<String>, args: impl IntoIterator<Item = TypeKey>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Key derived from a Rust type.
    ///
    /// Monomorphized generics already carry their arguments in the type name,
    /// so `of::<Vec<String>>()` and `of::<Vec<i64>>()` differ.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    pub fn with_arg(mut self, arg: TypeKey) -> Self {
        self.args.push(arg);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeKey] {
        &self.args
    }

    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }

    /// The key with its type arguments erased.
    pub fn raw(&self) -> TypeKey {
        Self::named(self.name.clone())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some((first, rest)) = self.args.split_first() {
            write!(f, "<{}", first)?;
            for arg in rest {
                write!(f, ", {}", arg)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self)
    }
}

/// Declared supertypes of a type: an optional parent plus implemented interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    key: TypeKey,
    parent: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
}

impl TypeDescriptor {
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            parent: None,
            interfaces: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: TypeKey) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn implements(mut self, interface: TypeKey) -> Self {
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn parent(&self) -> Option<&TypeKey> {
        self.parent.as_ref()
    }

    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    /// Parent first, then interfaces in declaration order.
    pub fn supertypes(&self) -> impl Iterator<Item = &TypeKey> {
        self.parent.iter().chain(self.interfaces.iter())
    }
}

/// Shared registry of type descriptors.
#[derive(Clone, Default)]
pub struct TypeCatalog {
    descriptors: Arc<RwLock<HashMap<TypeKey, TypeDescriptor>>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a descriptor. A later descriptor for the same key merges its
    /// supertypes into the existing one instead of replacing it.
    pub fn describe(&self, descriptor: TypeDescriptor) {
        let mut descriptors = self.descriptors.write();
        match descriptors.get_mut(descriptor.key()) {
            Some(existing) => {
                if existing.parent.is_none() {
                    existing.parent = descriptor.parent;
                }
                for interface in descriptor.interfaces {
                    if !existing.interfaces.contains(&interface) {
                        existing.interfaces.push(interface);
                    }
                }
            }
            None => {
                descriptors.insert(descriptor.key.clone(), descriptor);
            }
        }
    }

    pub fn descriptor(&self, key: &TypeKey) -> Option<TypeDescriptor> {
        self.descriptors.read().get(key).cloned()
    }

    pub fn supertypes(&self, key: &TypeKey) -> Vec<TypeKey> {
        self.descriptors
            .read()
            .get(key)
            .map(|d| d.supertypes().cloned().collect())
            .unwrap_or_default()
    }

    /// `key` followed by every declared supertype, closest first.
    pub fn closure(&self, key: &TypeKey) -> Vec<TypeKey> {
        inheritance_closure(key.clone(), |k| self.supertypes(k))
    }

    /// Whether a value of type `concrete` can be used where `target` is expected.
    pub fn is_assignable(&self, concrete: &TypeKey, target: &TypeKey) -> bool {
        concrete == target || self.closure(concrete).contains(target)
    }
}

/// Breadth-first walk of a type hierarchy.
///
/// Returns `start` followed by its supertypes level by level, each type
/// appearing once at its first (closest) position.
pub fn inheritance_closure<N, F, I>(start: N, mut supertypes: F) -> Vec<N>
where
    N: Clone + Eq + Hash,
    F: FnMut(&N) -> I,
    I: IntoIterator<Item = N>,
{
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        queue.extend(supertypes(&current));
        ordered.push(current);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> TypeKey {
        TypeKey::named(name)
    }

    #[test]
    fn test_generic_keys_are_structural() {
        let string_service = TypeKey::generic("GenericService", [key("String")]);
        let number_service = TypeKey::named("GenericService").with_arg(key("Number"));

        assert_eq!(
            string_service,
            TypeKey::generic("GenericService", [key("String")])
        );
        assert_ne!(string_service, number_service);
        assert_eq!(string_service.raw(), number_service.raw());
        assert_eq!(string_service.to_string(), "GenericService<String>");
    }

    #[test]
    fn test_nested_display() {
        let nested = TypeKey::generic(
            "Map",
            [key("String"), TypeKey::generic("List", [key("Integer")])],
        );
        assert_eq!(nested.to_string(), "Map<String, List<Integer>>");
    }

    #[test]
    fn test_of_distinguishes_monomorphized_generics() {
        assert_ne!(TypeKey::of::<Vec<String>>(), TypeKey::of::<Vec<i64>>());
        assert_eq!(TypeKey::of::<Vec<String>>(), TypeKey::of::<Vec<String>>());
    }

    #[test]
    fn test_closure_breadth_first() {
        // Hierarchy: D -> (B, C); B -> A; C -> A
        let catalog = TypeCatalog::new();
        catalog.describe(TypeDescriptor::new(key("D")).extends(key("B")).implements(key("C")));
        catalog.describe(TypeDescriptor::new(key("B")).extends(key("A")));
        catalog.describe(TypeDescriptor::new(key("C")).implements(key("A")));

        assert_eq!(
            catalog.closure(&key("D")),
            vec![key("D"), key("B"), key("C"), key("A")]
        );
    }

    #[test]
    fn test_closure_of_undescribed_type() {
        let catalog = TypeCatalog::new();
        assert_eq!(catalog.closure(&key("Lonely")), vec![key("Lonely")]);
    }

    #[test]
    fn test_describe_merges() {
        let catalog = TypeCatalog::new();
        catalog.describe(TypeDescriptor::new(key("Impl")).implements(key("First")));
        catalog.describe(TypeDescriptor::new(key("Impl")).implements(key("Second")));

        assert_eq!(catalog.supertypes(&key("Impl")), vec![key("First"), key("Second")]);
    }

    #[test]
    fn test_is_assignable() {
        let catalog = TypeCatalog::new();
        catalog.describe(TypeDescriptor::new(key("Impl")).implements(key("Service")));

        assert!(catalog.is_assignable(&key("Impl"), &key("Service")));
        assert!(catalog.is_assignable(&key("Impl"), &key("Impl")));
        assert!(!catalog.is_assignable(&key("Service"), &key("Impl")));
    }

    #[test]
    fn test_inheritance_closure_cycle_terminates() {
        let edges: HashMap<&str, Vec<&str>> =
            HashMap::from([("a", vec!["b"]), ("b", vec!["a", "c"]), ("c", vec![])]);
        let order = inheritance_closure("a", |n| edges.get(n).cloned().unwrap_or_default());
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
