//! Drives a test class through its extensions.
//!
//! Callback order per class:
//!
//! 1. `before_all` on every extension, in registration order
//! 2. per method: construct the instance (final fields resolved as
//!    parameters), `post_process_test_instance`, `before_each`, resolve the
//!    method parameters, run the body, then `after_each` in reverse order;
//!    `after_each` runs even when an earlier step failed
//! 3. `after_all` on every extension, in reverse order
//!
//! A panicking body fails only its own method. A fatal error (configuration
//! or boot failure) aborts the remaining methods of the class.

use crate::class::{Mutability, TestClass, TestClassId};
use crate::extension::{Extension, Parameter};
use crate::instance::TestInstance;
use crate::scope::{ExtensionContext, ScopeRegistry};
use crate::{FixtureError, Result};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use testbed_core::Bean;
use tracing::{debug, warn};

/// Result of a test body.
pub type TestResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type TestBody = Arc<dyn Fn(TestArgs) -> BoxFuture<'static, TestResult> + Send + Sync>;

/// A test method: parameters to resolve plus an async body.
#[derive(Clone)]
pub struct TestMethod {
    name: String,
    parameters: Vec<Parameter>,
    body: TestBody,
}

impl TestMethod {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        let body: TestBody = Arc::new(move |args: TestArgs| -> BoxFuture<'static, TestResult> {
            Box::pin(body(args))
        });
        Self {
            name: name.into(),
            parameters: Vec::new(),
            body,
        }
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// What a test body receives: its instance and resolved parameters.
pub struct TestArgs {
    instance: TestInstance,
    params: Vec<Bean>,
}

impl TestArgs {
    pub fn instance(&self) -> &TestInstance {
        &self.instance
    }

    pub fn param(&self, index: usize) -> Option<&Bean> {
        self.params.get(index)
    }

    /// Parameter `index` downcast to its concrete type.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.param(index).and_then(|bean| bean.get::<T>())
    }

    /// Parameter `index` as a view such as `Arc<dyn Trait>`.
    pub fn view<V: Clone + Send + Sync + 'static>(&self, index: usize) -> Option<V> {
        self.param(index).and_then(|bean| bean.view::<V>())
    }

    /// Parameter `index` cloned out of its bean, for cheap-to-clone handles
    /// such as the test client.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, index: usize) -> Option<T> {
        self.get::<T>(index).map(|value| (*value).clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    /// Not run because an earlier fatal error aborted the class.
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct MethodReport {
    pub name: String,
    pub outcome: Outcome,
}

/// Outcome of running one test class.
#[derive(Debug, Clone)]
pub struct ClassReport {
    pub class: TestClassId,
    pub methods: Vec<MethodReport>,
    /// Failures from class-level callbacks (`before_all`, `after_all`).
    pub class_errors: Vec<String>,
}

impl ClassReport {
    pub fn is_success(&self) -> bool {
        self.class_errors.is_empty() && self.methods.iter().all(|m| m.outcome == Outcome::Passed)
    }

    pub fn passed(&self) -> usize {
        self.methods
            .iter()
            .filter(|m| m.outcome == Outcome::Passed)
            .count()
    }

    pub fn outcome(&self, method: &str) -> Option<&Outcome> {
        self.methods
            .iter()
            .find(|m| m.name == method)
            .map(|m| &m.outcome)
    }

    /// Every failure message, class-level first.
    pub fn failures(&self) -> Vec<String> {
        let methods = self.methods.iter().filter_map(|m| match &m.outcome {
            Outcome::Passed => None,
            Outcome::Failed(msg) | Outcome::Aborted(msg) => Some(format!("{}: {}", m.name, msg)),
        });
        self.class_errors.iter().cloned().chain(methods).collect()
    }

    /// Panic with every failure message unless the class passed.
    pub fn assert_success(&self) {
        assert!(
            self.is_success(),
            "test class {} failed:\n{}",
            self.class,
            self.failures().join("\n")
        );
    }
}

enum MethodFailure {
    Fixture(FixtureError),
    Test(String),
}

impl MethodFailure {
    fn is_fatal(&self) -> bool {
        matches!(self, MethodFailure::Fixture(err) if err.is_fatal())
    }

    fn message(&self) -> String {
        match self {
            MethodFailure::Fixture(err) => err.to_string(),
            MethodFailure::Test(msg) => msg.clone(),
        }
    }
}

impl From<FixtureError> for MethodFailure {
    fn from(err: FixtureError) -> Self {
        MethodFailure::Fixture(err)
    }
}

/// Runs test classes against a set of extensions.
pub struct TestRunner {
    extensions: Vec<Arc<dyn Extension>>,
    store: ScopeRegistry,
}

impl TestRunner {
    pub fn new(store: ScopeRegistry) -> Self {
        Self {
            extensions: Vec::new(),
            store,
        }
    }

    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn store(&self) -> &ScopeRegistry {
        &self.store
    }

    pub async fn run(&self, class: Arc<TestClass>, methods: Vec<TestMethod>) -> ClassReport {
        let context = ExtensionContext::new(class.clone(), self.store.clone());
        let mut report = ClassReport {
            class: class.id().clone(),
            methods: Vec::with_capacity(methods.len()),
            class_errors: Vec::new(),
        };

        let mut abort = None;
        for extension in &self.extensions {
            if let Err(err) = extension.before_all(&context).await {
                let message = format!("{} before_all: {}", extension.name(), err);
                warn!(class = %class.id(), error = %message, "Class setup failed");
                report.class_errors.push(message.clone());
                abort = Some(message);
                break;
            }
        }

        for method in &methods {
            if let Some(reason) = &abort {
                report.methods.push(MethodReport {
                    name: method.name.clone(),
                    outcome: Outcome::Aborted(reason.clone()),
                });
                continue;
            }

            let outcome = match self.run_method(&context, method).await {
                Ok(()) => Outcome::Passed,
                Err(failure) => {
                    if failure.is_fatal() {
                        abort = Some(failure.message());
                    }
                    Outcome::Failed(failure.message())
                }
            };
            debug!(class = %class.id(), method = %method.name, outcome = ?outcome, "Test finished");
            report.methods.push(MethodReport {
                name: method.name.clone(),
                outcome,
            });
        }

        for extension in self.extensions.iter().rev() {
            if let Err(err) = extension.after_all(&context).await {
                report
                    .class_errors
                    .push(format!("{} after_all: {}", extension.name(), err));
            }
        }

        report
    }

    async fn run_method(
        &self,
        context: &ExtensionContext,
        method: &TestMethod,
    ) -> std::result::Result<(), MethodFailure> {
        let result = self.execute(context, method).await;

        // After-each callbacks run regardless; the first failure is reported
        let mut after_error = None;
        for extension in self.extensions.iter().rev() {
            if let Err(err) = extension.after_each(context).await {
                warn!(extension = extension.name(), error = %err, "after_each failed");
                after_error.get_or_insert(err);
            }
        }

        match (result, after_error) {
            (Err(failure), _) => Err(failure),
            (Ok(()), Some(err)) => Err(MethodFailure::Fixture(err)),
            (Ok(()), None) => Ok(()),
        }
    }

    async fn execute(
        &self,
        context: &ExtensionContext,
        method: &TestMethod,
    ) -> std::result::Result<(), MethodFailure> {
        let mut instance = self.construct(context).await?;

        for extension in &self.extensions {
            extension
                .post_process_test_instance(&mut instance, context)
                .await?;
        }
        for extension in &self.extensions {
            extension.before_each(context).await?;
        }

        let mut params = Vec::with_capacity(method.parameters.len());
        for parameter in &method.parameters {
            params.push(self.resolve(parameter, context).await?);
        }

        // A failed assertion panics; it fails this method only
        match AssertUnwindSafe((method.body)(TestArgs { instance, params }))
            .catch_unwind()
            .await
        {
            Ok(result) => result.map_err(|err| MethodFailure::Test(err.to_string())),
            Err(payload) => Err(MethodFailure::Test(panic_message(payload.as_ref()))),
        }
    }

    /// Build a test instance, resolving unset final fields as constructor
    /// parameters.
    async fn construct(&self, context: &ExtensionContext) -> Result<TestInstance> {
        let mut instance = TestInstance::new(context.test_class());
        let constructor_fields: Vec<_> = instance
            .fields()
            .iter()
            .filter(|f| f.mutability() == Mutability::Final)
            .filter(|f| !instance.is_set(f.name()))
            .cloned()
            .collect();

        for field in constructor_fields {
            let mut parameter = Parameter::new(field.key().clone());
            if let Some(name) = field.bean_name() {
                parameter = parameter.named(name);
            }
            let bean = self.resolve(&parameter, context).await?;
            instance.set(field.name(), bean);
        }
        Ok(instance)
    }

    /// Resolve through the single extension that supports the parameter.
    pub async fn resolve(&self, parameter: &Parameter, context: &ExtensionContext) -> Result<Bean> {
        let mut supporting = Vec::new();
        for extension in &self.extensions {
            if extension.supports_parameter(parameter, context).await? {
                supporting.push(extension);
            }
        }

        match supporting.as_slice() {
            [] => Err(FixtureError::ParameterNotResolvable(parameter.to_string())),
            [extension] => extension.resolve_parameter(parameter, context).await,
            many => Err(FixtureError::CompetingResolvers {
                parameter: parameter.to_string(),
                extensions: many
                    .iter()
                    .map(|e| e.name().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("test panicked: {}", detail)
}
