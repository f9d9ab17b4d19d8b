// Application lifecycle contract

use crate::{Container, Result, Router};
use async_trait::async_trait;
use std::sync::Arc;
use testbed_config::Configuration;

/// What an application registers while running: its bindings and routes.
pub struct Environment {
    container: Container,
    router: Router,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            container: Container::new(),
            router: Router::new(),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    pub(crate) fn take_router(&mut self) -> Router {
        std::mem::take(&mut self.router)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// An application that can be booted under test.
///
/// `run` registers bindings and routes; the launcher then serves the routes.
/// The per-test hooks default to no-ops.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    fn name(&self) -> &str {
        "application"
    }

    async fn run(&self, configuration: &Configuration, environment: &mut Environment)
    -> Result<()>;

    /// Called before each test method.
    async fn before_test(&self, _container: &Container) -> Result<()> {
        Ok(())
    }

    /// Called after each test method, after mocks are reset.
    async fn after_test(&self, _container: &Container) -> Result<()> {
        Ok(())
    }

    /// Called once when the application is torn down, after the server stops.
    async fn stop(&self, _container: &Container) -> Result<()> {
        Ok(())
    }
}

/// Creates a fresh application instance per boot.
pub type AppFactory = Arc<dyn Fn() -> Box<dyn Application> + Send + Sync>;

/// Hook invoked after the application's `run` has completed.
#[async_trait]
pub trait ServiceListener: Send + Sync {
    async fn on_run(&self, configuration: &Configuration, environment: &mut Environment)
    -> Result<()>;
}
