// Test doubles that stand in for application bindings

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use testbed_core::{Bean, TypeKey};

/// Outcome of resetting a double between test methods.
pub type ResetResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A recorded call on a test double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub method: String,
    pub args: Vec<String>,
}

/// Behavior every test double provides: record interactions, return
/// configured responses, and reset to a pristine state.
pub trait TestDouble: Send + Sync + 'static {
    fn record_call(&self, method: &str, args: Vec<String>);

    fn configure_response(&self, method: &str, response: Value);

    /// Clear interactions and configured responses.
    fn reset(&self) -> ResetResult;

    fn interactions(&self) -> Vec<Interaction>;

    fn call_count(&self) -> usize {
        self.interactions().len()
    }

    fn method_call_count(&self, method: &str) -> usize {
        self.interactions()
            .iter()
            .filter(|i| i.method == method)
            .count()
    }

    fn was_called(&self, method: &str) -> bool {
        self.method_call_count(method) > 0
    }

    fn has_no_interactions(&self) -> bool {
        self.interactions().is_empty()
    }
}

type CallLog = Arc<Mutex<Vec<Interaction>>>;

/// Shared recording state embedded in a mock type.
///
/// ```
/// use testbed_testing::{AsMock, Mock, TestDouble};
///
/// #[derive(Default)]
/// struct MockGreeter {
///     mock: Mock,
/// }
///
/// impl AsMock for MockGreeter {
///     fn as_mock(&self) -> &Mock {
///         &self.mock
///     }
/// }
///
/// impl MockGreeter {
///     fn greet(&self, who: &str) -> String {
///         self.mock
///             .invoke("greet", vec![who.to_string()], || format!("hello {who}"))
///     }
/// }
///
/// let greeter = MockGreeter::default();
/// assert_eq!(greeter.greet("bob"), "hello bob");
/// greeter.mock.returning("greet", &"stubbed");
/// assert_eq!(greeter.greet("bob"), "stubbed");
/// assert_eq!(greeter.method_call_count("greet"), 2);
/// ```
#[derive(Clone, Default)]
pub struct Mock {
    calls: CallLog,
    responses: Arc<Mutex<HashMap<String, Value>>>,
}

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a typed response for `method`.
    pub fn returning<T: Serialize + ?Sized>(&self, method: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.responses.lock().insert(method.to_string(), value);
            }
            Err(e) => tracing::error!(method, error = %e, "Failed to serialize mock response"),
        }
    }

    /// Configured response for `method`, if any and if it decodes as `T`.
    pub fn response<T: DeserializeOwned>(&self, method: &str) -> Option<T> {
        let value = self.responses.lock().get(method).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Record the call, then return the configured response or `default`.
    pub fn invoke<T, F>(&self, method: &str, args: Vec<String>, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.record(method, args);
        self.response(method).unwrap_or_else(default)
    }

    fn record(&self, method: &str, args: Vec<String>) {
        self.calls.lock().push(Interaction {
            method: method.to_string(),
            args,
        });
    }

    fn clear(&self) {
        self.calls.lock().clear();
        self.responses.lock().clear();
    }
}

/// Types built around a [`Mock`] get [`TestDouble`] for free.
pub trait AsMock: Send + Sync + 'static {
    fn as_mock(&self) -> &Mock;
}

impl AsMock for Mock {
    fn as_mock(&self) -> &Mock {
        self
    }
}

impl<T: AsMock> TestDouble for T {
    fn record_call(&self, method: &str, args: Vec<String>) {
        self.as_mock().record(method, args);
    }

    fn configure_response(&self, method: &str, response: Value) {
        self.as_mock()
            .responses
            .lock()
            .insert(method.to_string(), response);
    }

    fn reset(&self) -> ResetResult {
        self.as_mock().clear();
        Ok(())
    }

    fn interactions(&self) -> Vec<Interaction> {
        self.as_mock().calls.lock().clone()
    }
}

/// A double that can be created on demand to replace a contract.
pub trait MockTarget: TestDouble + Default {
    /// The binding this double replaces.
    fn contract() -> TypeKey;

    /// Wrap the double as a bean. Override to attach trait-object views so
    /// code resolving `Arc<dyn Contract>` receives the double.
    fn into_bean(self: Arc<Self>) -> Bean {
        Bean::from_arc(self)
    }
}

/// Recipe for creating a double: the contract it replaces plus a factory.
#[derive(Clone)]
pub struct MockSpec {
    contract: TypeKey,
    create: fn() -> MockInstance,
}

impl MockSpec {
    pub fn of<M: MockTarget>() -> Self {
        Self {
            contract: M::contract(),
            create: create_mock::<M>,
        }
    }

    pub fn contract(&self) -> &TypeKey {
        &self.contract
    }

    pub fn create(&self) -> MockInstance {
        (self.create)()
    }
}

impl std::fmt::Debug for MockSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSpec")
            .field("contract", &self.contract)
            .finish()
    }
}

fn create_mock<M: MockTarget>() -> MockInstance {
    let double = Arc::new(M::default());
    MockInstance {
        bean: double.clone().into_bean(),
        double,
    }
}

/// A created double: the bean bound into the container and a handle used
/// to reset it.
#[derive(Clone)]
pub struct MockInstance {
    bean: Bean,
    double: Arc<dyn TestDouble>,
}

impl MockInstance {
    pub fn new(bean: Bean, double: Arc<dyn TestDouble>) -> Self {
        Self { bean, double }
    }

    pub fn bean(&self) -> &Bean {
        &self.bean
    }

    pub fn double(&self) -> &Arc<dyn TestDouble> {
        &self.double
    }

    pub(crate) fn with_type_key(mut self, key: TypeKey) -> Self {
        self.bean = self.bean.with_type_key(key);
        self
    }
}
