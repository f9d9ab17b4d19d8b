// Starts a TestService for each test class and exposes it to the fixture

use crate::service::{ClientBinding, TestService};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use testbed_core::{Bean, TypeKey};
use testbed_testing::{
    Extension, ExtensionContext, ExtensionHooks, FixtureError, Parameter, PropertyCollector,
    Result, TestClassId,
};
use tracing::{debug, info};

/// Started service plus its endpoint, resolvable as a test parameter.
pub struct ServiceHandle<S> {
    service: Arc<S>,
    endpoint: Option<String>,
    clients: Vec<ClientBinding>,
}

impl<S> Clone for ServiceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            endpoint: self.endpoint.clone(),
            clients: self.clients.clone(),
        }
    }
}

impl<S: TestService> ServiceHandle<S> {
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn clients(&self) -> &[ClientBinding] {
        &self.clients
    }

    /// The first client of type `T`.
    pub fn client<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.clients.iter().find_map(|c| c.bean().get::<T>())
    }
}

type ServiceFactory<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Runs one service instance per test class.
///
/// In `before_all` the service is started; its clients are registered as
/// application dependencies and, when it exposes an endpoint, the
/// configured properties are applied with `${endpoint}` replaced. For a
/// class without an `AppTest` the clients are resolved as parameters by
/// this extension instead.
pub struct ServiceTestExtension<S: TestService> {
    name: String,
    factory: ServiceFactory<S>,
    properties: Vec<String>,
    token: String,
    register_clients: bool,
    running: Mutex<HashMap<TestClassId, ServiceHandle<S>>>,
}

impl<S: TestService> ServiceTestExtension<S> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            name: format!("ServiceTestExtension<{}>", short_type_name::<S>()),
            factory: Arc::new(factory),
            properties: Vec::new(),
            token: "endpoint".to_string(),
            register_clients: true,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// `key=value` properties applied when the service has an endpoint.
    pub fn with_properties<I, P>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.properties.extend(properties.into_iter().map(Into::into));
        self
    }

    /// Placeholder replaced by the endpoint, `endpoint` by default.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn register_clients(mut self, enabled: bool) -> Self {
        self.register_clients = enabled;
        self
    }

    pub fn handle(&self, class: &TestClassId) -> Option<ServiceHandle<S>> {
        self.running.lock().get(class).cloned()
    }

    fn handle_key() -> TypeKey {
        TypeKey::of::<ServiceHandle<S>>()
    }

    fn find_client(handle: &ServiceHandle<S>, parameter: &Parameter) -> Option<Bean> {
        handle
            .clients
            .iter()
            .filter(|c| c.key() == parameter.key())
            .find(|c| parameter.name().is_none() || c.name() == parameter.name())
            .map(|c| c.bean().clone())
    }

    fn publish(&self, context: &ExtensionContext, handle: &ServiceHandle<S>) -> Result<()> {
        let hooks = ExtensionHooks::from(context)?;
        if !hooks.is_attached() {
            return Ok(());
        }

        if self.register_clients {
            for client in &handle.clients {
                hooks.register_bean(client.key().clone(), client.name(), client.bean().clone());
            }
        }

        let Some(endpoint) = handle.endpoint() else {
            debug!(extension = %self.name, "Service has no endpoint, skipping properties");
            return Ok(());
        };
        let collector = PropertyCollector::new().with_variable(&self.token, endpoint);
        for property in &self.properties {
            let (key, value) = collector.split(property)?;
            hooks.override_property(&key, &value);
        }
        Ok(())
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[async_trait]
impl<S: TestService> Extension for ServiceTestExtension<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before_all(&self, context: &ExtensionContext) -> Result<()> {
        let service = Arc::new((self.factory)());
        let endpoint = service.start().await?;
        let handle = ServiceHandle {
            clients: service.clients(),
            service,
            endpoint,
        };
        info!(
            extension = %self.name,
            class = %context.class_id(),
            endpoint = ?handle.endpoint,
            clients = handle.clients.len(),
            "Service started"
        );
        self.running
            .lock()
            .insert(context.class_id().clone(), handle.clone());

        self.publish(context, &handle)
    }

    async fn after_all(&self, context: &ExtensionContext) -> Result<()> {
        let handle = self.running.lock().remove(context.class_id());
        if let Some(handle) = handle {
            handle.service.shutdown().await?;
            info!(extension = %self.name, class = %context.class_id(), "Service stopped");
        }
        Ok(())
    }

    async fn supports_parameter(
        &self,
        parameter: &Parameter,
        context: &ExtensionContext,
    ) -> Result<bool> {
        let Some(handle) = self.handle(context.class_id()) else {
            return Ok(false);
        };
        if *parameter.key() == Self::handle_key() {
            return Ok(true);
        }
        // Registered clients belong to the application fixture when present
        if ExtensionHooks::is_active(context) {
            return Ok(false);
        }
        Ok(Self::find_client(&handle, parameter).is_some())
    }

    async fn resolve_parameter(
        &self,
        parameter: &Parameter,
        context: &ExtensionContext,
    ) -> Result<Bean> {
        let handle = self
            .handle(context.class_id())
            .ok_or_else(|| FixtureError::ParameterNotResolvable(parameter.to_string()))?;
        if *parameter.key() == Self::handle_key() {
            return Ok(Bean::new(handle));
        }
        Self::find_client(&handle, parameter)
            .ok_or_else(|| FixtureError::ParameterNotResolvable(parameter.to_string()))
    }
}
