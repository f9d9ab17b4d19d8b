// Extension callbacks driven by the test runner

use crate::context::TestContextManager;
use crate::hooks::ExtensionHooks;
use crate::instance::TestInstance;
use crate::scope::ExtensionContext;
use crate::{FixtureError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use testbed_client::TestClient;
use testbed_core::{Bean, TypeKey};

/// A constructor or method parameter to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    key: TypeKey,
    name: Option<String>,
}

impl Parameter {
    pub fn new(key: TypeKey) -> Self {
        Self { key, name: None }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>())
    }

    /// Qualify the parameter with a binding name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (named '{}')", self.key, name),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Lifecycle callbacks, invoked by [`crate::TestRunner`] in test-framework
/// order. Every callback defaults to doing nothing.
#[async_trait]
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    async fn before_all(&self, _context: &ExtensionContext) -> Result<()> {
        Ok(())
    }

    async fn post_process_test_instance(
        &self,
        _instance: &mut TestInstance,
        _context: &ExtensionContext,
    ) -> Result<()> {
        Ok(())
    }

    async fn before_each(&self, _context: &ExtensionContext) -> Result<()> {
        Ok(())
    }

    async fn after_each(&self, _context: &ExtensionContext) -> Result<()> {
        Ok(())
    }

    async fn after_all(&self, _context: &ExtensionContext) -> Result<()> {
        Ok(())
    }

    async fn supports_parameter(
        &self,
        _parameter: &Parameter,
        _context: &ExtensionContext,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn resolve_parameter(
        &self,
        parameter: &Parameter,
        _context: &ExtensionContext,
    ) -> Result<Bean> {
        Err(FixtureError::ParameterNotResolvable(parameter.to_string()))
    }
}

/// The extension that boots the `AppTest` application and resolves beans,
/// the [`TestClient`] and the [`testbed_core::RunningApp`] handle as
/// parameters. Inert for classes without an `AppTest` declaration.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppTestExtension;

impl AppTestExtension {
    fn manager(context: &ExtensionContext) -> Result<Option<Arc<TestContextManager>>> {
        if !ExtensionHooks::is_active(context) {
            return Ok(None);
        }
        context
            .store()
            .get_or_create(context.test_class())
            .map(Some)
    }
}

#[async_trait]
impl Extension for AppTestExtension {
    fn name(&self) -> &str {
        "AppTestExtension"
    }

    async fn before_all(&self, context: &ExtensionContext) -> Result<()> {
        // Creates the scope so property and mock declarations are validated
        // before the first test
        Self::manager(context).map(|_| ())
    }

    async fn post_process_test_instance(
        &self,
        instance: &mut TestInstance,
        context: &ExtensionContext,
    ) -> Result<()> {
        if let Some(manager) = Self::manager(context)? {
            manager.post_process_instance(instance);
        }
        Ok(())
    }

    async fn before_each(&self, context: &ExtensionContext) -> Result<()> {
        match Self::manager(context)? {
            Some(manager) => manager.before_each().await,
            None => Ok(()),
        }
    }

    async fn after_each(&self, context: &ExtensionContext) -> Result<()> {
        match context.store().get(context.class_id()) {
            Some(manager) => manager.after_each().await,
            None => Ok(()),
        }
    }

    async fn after_all(&self, context: &ExtensionContext) -> Result<()> {
        match context.store().get(context.class_id()) {
            Some(manager) => manager.after_all(context.store()).await,
            None => Ok(()),
        }
    }

    async fn supports_parameter(
        &self,
        parameter: &Parameter,
        context: &ExtensionContext,
    ) -> Result<bool> {
        let Some(manager) = Self::manager(context)? else {
            return Ok(false);
        };
        if *parameter.key() == TypeKey::of::<TestClient>() {
            return Ok(true);
        }
        Ok(manager
            .get_bean(parameter.key(), parameter.name())
            .await?
            .is_some())
    }

    async fn resolve_parameter(
        &self,
        parameter: &Parameter,
        context: &ExtensionContext,
    ) -> Result<Bean> {
        let manager = Self::manager(context)?
            .ok_or_else(|| FixtureError::ParameterNotResolvable(parameter.to_string()))?;
        if *parameter.key() == TypeKey::of::<TestClient>() {
            return Ok(Bean::new(manager.test_client().await?));
        }
        manager
            .get_bean(parameter.key(), parameter.name())
            .await?
            .ok_or_else(|| FixtureError::ParameterNotResolvable(parameter.to_string()))
    }
}
