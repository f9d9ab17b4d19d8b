// Dependency injection container

use crate::bean::Bean;
use crate::logging::{debug, trace};
use crate::types::{TypeCatalog, TypeKey};
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

/// Highest binding rank; wins over every application binding.
pub const RANK_MAX: i32 = i32::MAX;

/// Rank given to bindings that do not ask for one.
pub const RANK_DEFAULT: i32 = 0;

/// Factory producing a bean on first lookup.
pub type BeanFactory = Arc<dyn Fn(&Container) -> Result<Bean> + Send + Sync>;

enum Source {
    Instance(Bean),
    Singleton {
        factory: BeanFactory,
        instance: OnceCell<Bean>,
    },
}

/// One entry in the container, reachable under one or more contracts.
pub struct Binding {
    contracts: Vec<TypeKey>,
    name: Option<String>,
    rank: i32,
    sequence: u64,
    source: Source,
}

impl Binding {
    pub fn contracts(&self) -> &[TypeKey] {
        &self.contracts
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    fn resolve(&self, container: &Container) -> Result<Bean> {
        match &self.source {
            Source::Instance(bean) => Ok(bean.clone()),
            Source::Singleton { factory, instance } => instance
                .get_or_try_init(|| factory(container))
                .cloned(),
        }
    }
}

#[derive(Default)]
struct BindingTable {
    by_contract: HashMap<TypeKey, Vec<Arc<Binding>>>,
    next_sequence: u64,
}

/// The dependency injection container
///
/// Bindings are keyed by structural [`TypeKey`] plus an optional name.
/// An unnamed lookup picks the highest rank, preferring unnamed bindings
/// over named ones at equal rank, then the earliest registered.
#[derive(Clone)]
pub struct Container {
    bindings: Arc<RwLock<BindingTable>>,
    catalog: TypeCatalog,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new DI container");
        Self {
            bindings: Arc::new(RwLock::new(BindingTable::default())),
            catalog: TypeCatalog::new(),
        }
    }

    /// Type hierarchy used for assignability checks.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Register a provider instance under its own type
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        let bean = Bean::new(instance);
        let key = bean.type_key().clone();
        self.insert(vec![key], None, RANK_DEFAULT, Source::Instance(bean));
    }

    /// Start a binding for an existing instance
    pub fn bind(&self, bean: Bean) -> BindingBuilder<'_> {
        BindingBuilder::new(self, Source::Instance(bean))
    }

    /// Start a lazily created singleton binding
    pub fn bind_factory(&self, factory: BeanFactory) -> BindingBuilder<'_> {
        BindingBuilder::new(
            self,
            Source::Singleton {
                factory,
                instance: OnceCell::new(),
            },
        )
    }

    fn insert(&self, contracts: Vec<TypeKey>, name: Option<String>, rank: i32, source: Source) {
        trace!("Acquiring write lock for registration");
        let mut table = self.bindings.write();
        let sequence = table.next_sequence;
        table.next_sequence += 1;

        let binding = Arc::new(Binding {
            contracts,
            name,
            rank,
            sequence,
            source,
        });
        for contract in &binding.contracts {
            table
                .by_contract
                .entry(contract.clone())
                .or_default()
                .push(binding.clone());
        }

        debug!(
            contracts = ?binding.contracts,
            name = ?binding.name,
            rank = binding.rank,
            "Binding registered in DI container"
        );
    }

    /// Look up the preferred bean for `key`, restricted to `name` when given.
    pub fn get(&self, key: &TypeKey, name: Option<&str>) -> Result<Option<Bean>> {
        let name = normalize_name(name);
        let selected = {
            let table = self.bindings.read();
            table
                .by_contract
                .get(key)
                .and_then(|candidates| select(candidates, name))
        };

        // Singleton factories run outside the lock so they can resolve
        // their own dependencies from this container.
        match selected {
            Some(binding) => {
                trace!(contract = %key, name = ?name, "Binding resolved");
                binding.resolve(self).map(Some)
            }
            None => {
                trace!(contract = %key, name = ?name, "No binding found");
                Ok(None)
            }
        }
    }

    /// Every bean bound to `key`, in lookup preference order.
    pub fn get_all(&self, key: &TypeKey) -> Result<Vec<Bean>> {
        let mut candidates = {
            let table = self.bindings.read();
            table.by_contract.get(key).cloned().unwrap_or_default()
        };
        candidates.sort_by_key(|b| preference(b));
        candidates.iter().map(|b| b.resolve(self)).collect()
    }

    /// Resolve a provider by type
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_named::<T>(None)
    }

    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: Option<&str>) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.get(&key, name)?
            .and_then(|bean| bean.get::<T>())
            .ok_or_else(|| Error::ProviderNotFound(key.to_string()))
    }

    /// Resolve `key` and extract a view, typically an `Arc<dyn Trait>`.
    pub fn resolve_view<V: Clone + Send + Sync + 'static>(
        &self,
        key: &TypeKey,
        name: Option<&str>,
    ) -> Result<V> {
        let bean = self
            .get(key, name)?
            .ok_or_else(|| Error::ProviderNotFound(key.to_string()))?;
        bean.view::<V>().ok_or_else(|| {
            Error::DependencyInjection(format!(
                "binding for {} ({}) does not provide the requested view",
                key,
                bean.type_key()
            ))
        })
    }

    /// Check if a binding exists
    pub fn has(&self, key: &TypeKey, name: Option<&str>) -> bool {
        let name = normalize_name(name);
        let table = self.bindings.read();
        let exists = table
            .by_contract
            .get(key)
            .is_some_and(|candidates| select(candidates, name).is_some());

        trace!(contract = %key, exists = exists, "Checked binding existence");
        exists
    }

    /// Number of distinct bindings.
    pub fn len(&self) -> usize {
        let table = self.bindings.read();
        let mut sequences: Vec<u64> = table
            .by_contract
            .values()
            .flatten()
            .map(|b| b.sequence)
            .collect();
        sequences.sort_unstable();
        sequences.dedup();
        sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all bindings
    pub fn clear(&self) {
        let count = self.len();
        self.bindings.write().by_contract.clear();

        debug!(binding_count = count, "Cleared all bindings from container");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder returned by [`Container::bind`] and [`Container::bind_factory`].
#[must_use = "bindings take effect only after `register`"]
pub struct BindingBuilder<'a> {
    container: &'a Container,
    source: Source,
    contracts: Vec<TypeKey>,
    name: Option<String>,
    rank: i32,
}

impl<'a> BindingBuilder<'a> {
    fn new(container: &'a Container, source: Source) -> Self {
        Self {
            container,
            source,
            contracts: Vec::new(),
            name: None,
            rank: RANK_DEFAULT,
        }
    }

    /// Add a contract the binding answers to.
    pub fn to(mut self, contract: TypeKey) -> Self {
        if !self.contracts.contains(&contract) {
            self.contracts.push(contract);
        }
        self
    }

    pub fn to_all(self, contracts: impl IntoIterator<Item = TypeKey>) -> Self {
        contracts.into_iter().fold(self, |builder, c| builder.to(c))
    }

    /// Name the binding. Blank names are treated as no name.
    pub fn named(mut self, name: Option<&str>) -> Self {
        self.name = normalize_name(name).map(str::to_string);
        self
    }

    pub fn ranked(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    pub fn register(self) -> Result<()> {
        if self.contracts.is_empty() {
            return Err(Error::DependencyInjection(
                "binding registered without any contract".to_string(),
            ));
        }
        self.container
            .insert(self.contracts, self.name, self.rank, self.source);
        Ok(())
    }
}

fn normalize_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.trim().is_empty())
}

fn preference(binding: &Binding) -> (Reverse<i32>, bool, u64) {
    (Reverse(binding.rank), binding.name.is_some(), binding.sequence)
}

fn select(candidates: &[Arc<Binding>], name: Option<&str>) -> Option<Arc<Binding>> {
    match name {
        Some(name) => candidates
            .iter()
            .filter(|b| b.name.as_deref() == Some(name))
            .min_by_key(|b| (Reverse(b.rank), b.sequence)),
        None => candidates.iter().min_by_key(|b| preference(b)),
    }
    .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    fn greeting(bean: Option<Bean>) -> &'static str {
        bean.and_then(|b| b.get::<Greeting>()).map(|g| g.0).unwrap()
    }

    #[test]
    fn test_register_and_resolve() {
        let container = Container::new();
        container.register(Greeting("hello"));

        let resolved = container.resolve::<Greeting>().unwrap();
        assert_eq!(resolved.0, "hello");
        assert!(container.has(&TypeKey::of::<Greeting>(), None));
    }

    #[test]
    fn test_resolve_missing() {
        let container = Container::new();
        let err = container.resolve::<Greeting>().unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound(_)));
    }

    #[test]
    fn test_higher_rank_wins() {
        let container = Container::new();
        let key = TypeKey::of::<Greeting>();
        container.register(Greeting("production"));
        container
            .bind(Bean::new(Greeting("override")))
            .to(key.clone())
            .ranked(RANK_MAX)
            .register()
            .unwrap();

        assert_eq!(greeting(container.get(&key, None).unwrap()), "override");
    }

    #[test]
    fn test_unnamed_preferred_then_first_registered() {
        let container = Container::new();
        let key = TypeKey::named("Greeting");
        for (value, name) in [("named", Some("n")), ("first", None), ("second", None)] {
            container
                .bind(Bean::new(Greeting(value)))
                .to(key.clone())
                .named(name)
                .register()
                .unwrap();
        }

        assert_eq!(greeting(container.get(&key, None).unwrap()), "first");
        assert_eq!(greeting(container.get(&key, Some("n")).unwrap()), "named");
        assert!(container.get(&key, Some("missing")).unwrap().is_none());
    }

    #[test]
    fn test_blank_name_means_unnamed() {
        let container = Container::new();
        let key = TypeKey::named("Greeting");
        container
            .bind(Bean::new(Greeting("blank")))
            .to(key.clone())
            .named(Some("  "))
            .register()
            .unwrap();

        assert_eq!(greeting(container.get(&key, Some("")).unwrap()), "blank");
    }

    #[test]
    fn test_generic_keys_do_not_collide() {
        let container = Container::new();
        let strings = TypeKey::generic("GenericService", [TypeKey::named("String")]);
        let numbers = TypeKey::generic("GenericService", [TypeKey::named("Number")]);
        container
            .bind(Bean::new(Greeting("strings")))
            .to(strings.clone())
            .register()
            .unwrap();
        container
            .bind(Bean::new(Greeting("numbers")))
            .to(numbers.clone())
            .register()
            .unwrap();

        assert_eq!(greeting(container.get(&strings, None).unwrap()), "strings");
        assert_eq!(greeting(container.get(&numbers, None).unwrap()), "numbers");
        assert!(container.get(&strings.raw(), None).unwrap().is_none());
    }

    #[test]
    fn test_singleton_factory_runs_once_across_contracts() {
        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory: BeanFactory = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Bean::new(Greeting("lazy")))
        });

        container
            .bind_factory(factory)
            .to(TypeKey::named("Impl"))
            .to(TypeKey::named("Contract"))
            .register()
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let a = container.get(&TypeKey::named("Impl"), None).unwrap().unwrap();
        let b = container.get(&TypeKey::named("Contract"), None).unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_factory_can_resolve_dependencies() {
        let container = Container::new();
        container.register(Greeting("dependency"));
        let factory: BeanFactory = Arc::new(|c: &Container| {
            let dep = c.resolve::<Greeting>()?;
            Ok(Bean::new(format!("wraps {}", dep.0)))
        });
        container
            .bind_factory(factory)
            .to(TypeKey::of::<String>())
            .register()
            .unwrap();

        assert_eq!(*container.resolve::<String>().unwrap(), "wraps dependency");
    }

    #[test]
    fn test_get_all_in_preference_order() {
        let container = Container::new();
        let key = TypeKey::named("Greeting");
        container.bind(Bean::new(Greeting("low"))).to(key.clone()).register().unwrap();
        container
            .bind(Bean::new(Greeting("high")))
            .to(key.clone())
            .ranked(10)
            .register()
            .unwrap();

        let all: Vec<_> = container
            .get_all(&key)
            .unwrap()
            .into_iter()
            .map(|b| b.get::<Greeting>().unwrap().0)
            .collect();
        assert_eq!(all, vec!["high", "low"]);
    }

    #[test]
    fn test_register_without_contract_fails() {
        let container = Container::new();
        assert!(container.bind(Bean::new(1u8)).register().is_err());
    }

    #[test]
    fn test_clear() {
        let container = Container::new();
        container.register(Greeting("x"));
        container.clear();
        assert!(container.is_empty());
    }
}
