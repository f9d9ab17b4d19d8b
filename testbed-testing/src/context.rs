//! Per-test-class lifecycle coordinator.
//!
//! A [`TestContextManager`] owns everything a test class shares: the mock,
//! dependency and import registries, the merged property overrides, and the
//! booted application. The application is booted lazily, on the first
//! access that needs it, and exactly once; a failed boot is remembered and
//! reported again on every later access.

use crate::binder::TestServiceListener;
use crate::class::{AppTest, TestClass, TestClassId, WebEnvironment};
use crate::dependency::DependencyContext;
use crate::import::ImportContext;
use crate::instance::TestInstance;
use crate::mock::MockContext;
use crate::properties::{PropertyCollector, PropertyOverrides};
use crate::scope::ScopeRegistry;
use crate::{FixtureError, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use testbed_client::TestClient;
use testbed_core::{AppLauncher, Bean, RunningApp, TypeKey, resource_file_path};
use tracing::{debug, error, info, warn};

/// Observable lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Registries exist, nothing booted yet.
    Created,
    Booting,
    Running,
    /// Between `before_each` and `after_each`.
    TestActive,
    /// Boot failed; the failure is replayed on every access.
    Failed,
    TornDown,
}

enum Lifecycle {
    Created,
    Running(Arc<RunningApp>),
    Failed(Arc<testbed_core::Error>),
    TornDown,
}

pub struct TestContextManager {
    class: Arc<TestClass>,
    app_test: AppTest,
    dependency_context: Mutex<DependencyContext>,
    mock_context: MockContext,
    import_context: ImportContext,
    property_overrides: PropertyOverrides,
    hook_overrides: Mutex<PropertyOverrides>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    state: Mutex<ScopeState>,
    client: OnceCell<TestClient>,
}

impl TestContextManager {
    /// Build the scope: locate the `AppTest` declaration, create mocks and
    /// collect properties. Malformed declarations fail here, before any
    /// boot attempt.
    pub fn new(class: Arc<TestClass>) -> Result<Self> {
        let app_test = class.find_app_test().ok_or_else(|| {
            FixtureError::Configuration(format!(
                "AppTest declaration was not located for {}",
                class.id()
            ))
        })?;
        let mock_context = MockContext::from_class(&class)?;
        let import_context = ImportContext::from_class(&class);
        let property_overrides = PropertyCollector::new().collect(&class, &app_test)?;

        debug!(
            class = %class.id(),
            mocks = mock_context.len(),
            imports = import_context.len(),
            properties = property_overrides.len(),
            "Created test scope"
        );

        Ok(Self {
            class,
            app_test,
            dependency_context: Mutex::new(DependencyContext::default()),
            mock_context,
            import_context,
            property_overrides,
            hook_overrides: Mutex::new(PropertyOverrides::new()),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Created),
            state: Mutex::new(ScopeState::Created),
            client: OnceCell::new(),
        })
    }

    pub fn class_id(&self) -> &TestClassId {
        self.class.id()
    }

    pub fn test_class(&self) -> &Arc<TestClass> {
        &self.class
    }

    pub fn state(&self) -> ScopeState {
        *self.state.lock()
    }

    fn set_state(&self, state: ScopeState) {
        *self.state.lock() = state;
    }

    pub fn mock_context(&self) -> &MockContext {
        &self.mock_context
    }

    /// Property overrides collected from the class declarations.
    pub fn property_overrides(&self) -> &PropertyOverrides {
        &self.property_overrides
    }

    /// Add a dependency binding. Has no effect on an application that has
    /// already booted.
    pub fn register_dependency(&self, key: TypeKey, name: Option<String>, bean: Bean) {
        self.warn_if_booted("register", &key.to_string());
        self.dependency_context.lock().add(key, name, bean);
    }

    /// Override a configuration property. Declared properties win over
    /// hook overrides for the same key; among hook overrides the last wins.
    pub fn override_property(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.warn_if_booted("override_property", &key);
        self.hook_overrides.lock().insert(key, value);
    }

    fn warn_if_booted(&self, operation: &str, target: &str) {
        if self.state() != ScopeState::Created {
            warn!(
                class = %self.class.id(),
                operation,
                target,
                "Scope already booted; registration will not reach the running application"
            );
        }
    }

    /// Overrides applied at boot: declared properties, then the random port,
    /// then hook overrides, each only where the key is still free.
    pub fn effective_overrides(&self) -> PropertyOverrides {
        let mut overrides = self.property_overrides.clone();
        if self.app_test.web_env() == WebEnvironment::RandomPort {
            overrides.put_if_absent("server.port", "0");
        }
        for (key, value) in self.hook_overrides.lock().iter() {
            overrides.put_if_absent(key, value);
        }
        overrides
    }

    fn config_path(&self) -> testbed_core::Result<PathBuf> {
        let file = self.app_test.config_file();
        if self.app_test.uses_resource_file_path() {
            resource_file_path(file)
        } else {
            Ok(PathBuf::from(file))
        }
    }

    fn boot_error(&self, source: Arc<testbed_core::Error>) -> FixtureError {
        FixtureError::Boot {
            class: self.class.id().to_string(),
            source,
        }
    }

    /// Boot the application if needed and return it.
    pub async fn initialize(&self) -> Result<Arc<RunningApp>> {
        let mut lifecycle = self.lifecycle.lock().await;
        match &*lifecycle {
            Lifecycle::Running(app) => return Ok(app.clone()),
            Lifecycle::Failed(source) => return Err(self.boot_error(source.clone())),
            Lifecycle::TornDown => {
                return Err(FixtureError::ScopeTornDown(self.class.id().to_string()));
            }
            Lifecycle::Created => {}
        }

        self.set_state(ScopeState::Booting);
        match self.boot().await {
            Ok(app) => {
                *lifecycle = Lifecycle::Running(app.clone());
                self.set_state(ScopeState::Running);
                Ok(app)
            }
            Err(err) => {
                let source = match err {
                    FixtureError::Configuration(message) => {
                        Arc::new(testbed_core::Error::Configuration(message))
                    }
                    FixtureError::Core(core) => Arc::new(core),
                    other => Arc::new(testbed_core::Error::Application(other.to_string())),
                };
                error!(class = %self.class.id(), error = %source, "Application boot failed");
                *lifecycle = Lifecycle::Failed(source.clone());
                self.set_state(ScopeState::Failed);
                Err(self.boot_error(source))
            }
        }
    }

    async fn boot(&self) -> Result<Arc<RunningApp>> {
        let listener = TestServiceListener::new(
            self.mock_context.iter().cloned().collect(),
            self.dependency_context.lock().iter().cloned().collect(),
            self.import_context.imports().to_vec(),
        );
        listener.validate()?;

        let config_path = self.config_path()?;
        info!(
            class = %self.class.id(),
            config_file = %config_path.display(),
            "Initializing test application context"
        );

        let app = AppLauncher::new(self.app_test.factory().clone(), config_path)
            .with_overrides(self.effective_overrides().to_config_overrides())
            .with_listener(Arc::new(listener))
            .start()
            .await?;
        Ok(Arc::new(app))
    }

    /// The running application, booting it if necessary.
    pub async fn app(&self) -> Result<Arc<RunningApp>> {
        self.initialize().await
    }

    /// Client bound to the application's port; one per scope.
    pub async fn test_client(&self) -> Result<TestClient> {
        let app = self.initialize().await?;
        Ok(self
            .client
            .get_or_init(|| TestClient::new(app.local_port()))
            .clone())
    }

    /// Fill unset mutable mock fields of a freshly constructed instance.
    pub fn post_process_instance(&self, instance: &mut TestInstance) {
        self.mock_context.inject_test_instance_mocks(instance);
    }

    pub async fn before_each(&self) -> Result<()> {
        let app = self.initialize().await?;
        match app.before_test().await {
            Ok(()) => {
                self.set_state(ScopeState::TestActive);
                Ok(())
            }
            Err(err) => {
                self.set_state(ScopeState::Running);
                Err(err.into())
            }
        }
    }

    /// Reset every mock, then run the application's after-test hook.
    pub async fn after_each(&self) -> Result<()> {
        let failures = self.mock_context.reset_mocks();
        if failures > 0 {
            warn!(class = %self.class.id(), failures, "Some mocks could not be reset");
        }

        let app = match &*self.lifecycle.lock().await {
            Lifecycle::Running(app) => app.clone(),
            _ => return Ok(()),
        };
        self.set_state(ScopeState::Running);
        app.after_test().await?;
        Ok(())
    }

    /// Stop the application and remove this scope from `store`. The scope
    /// is removed even when stopping fails; the failure is returned after.
    pub async fn after_all(&self, store: &ScopeRegistry) -> Result<()> {
        let previous = {
            let mut lifecycle = self.lifecycle.lock().await;
            std::mem::replace(&mut *lifecycle, Lifecycle::TornDown)
        };
        self.set_state(ScopeState::TornDown);

        let result = match previous {
            Lifecycle::Running(app) => app.stop().await,
            _ => Ok(()),
        };
        store.remove(self.class.id());
        info!(class = %self.class.id(), "Test scope torn down");

        result.map_err(|source| FixtureError::Teardown {
            class: self.class.id().to_string(),
            source,
        })
    }

    /// Resolve a bean from the running application.
    ///
    /// Tries the exact key first. Otherwise walks the supertypes of `key`
    /// breadth first and returns the first binding whose concrete type is
    /// assignable to `key`; when several ancestors match, the closest wins.
    pub async fn get_bean(&self, key: &TypeKey, name: Option<&str>) -> Result<Option<Bean>> {
        let app = self.initialize().await?;

        if *key == TypeKey::of::<RunningApp>() {
            return Ok(Some(app.bean()));
        }

        let container = app.container();
        if let Some(bean) = container.get(key, name)? {
            return Ok(Some(bean));
        }

        let catalog = container.catalog();
        for ancestor in catalog.closure(key).iter().skip(1) {
            if let Some(bean) = container.get(ancestor, name)? {
                if catalog.is_assignable(bean.type_key(), key) {
                    debug!(
                        requested = %key,
                        found_under = %ancestor,
                        "Resolved bean through supertype"
                    );
                    return Ok(Some(bean));
                }
            }
        }

        debug!(requested = %key, name = ?name, "No bean found");
        Ok(None)
    }

    /// Typed convenience over [`get_bean`](Self::get_bean).
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        Ok(self
            .get_bean(&TypeKey::of::<T>(), None)
            .await?
            .and_then(|bean| bean.get::<T>()))
    }
}
