// Contract for services started alongside a test class

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use testbed_core::{Bean, TypeKey};

/// A typed client a service exposes to tests.
#[derive(Clone)]
pub struct ClientBinding {
    key: TypeKey,
    name: Option<String>,
    bean: Bean,
}

impl ClientBinding {
    pub fn of<T: Send + Sync + 'static>(client: T) -> Self {
        let bean = Bean::new(client);
        Self {
            key: bean.type_key().clone(),
            name: None,
            bean,
        }
    }

    /// Bind an already wrapped bean under `key`.
    pub fn from_bean(key: TypeKey, bean: Bean) -> Self {
        Self {
            key,
            name: None,
            bean,
        }
    }

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

    pub fn bean(&self) -> &Bean {
        &self.bean
    }
}

impl fmt::Debug for ClientBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBinding")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish()
    }
}

/// An external service with a start/shutdown lifecycle.
#[async_trait]
pub trait TestService: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Start the service and wait until it is ready. Returns the connection
    /// endpoint, or `None` when the service is not network exposed.
    async fn start(&self) -> Result<Option<String>>;

    /// Clients connected to the started service.
    fn clients(&self) -> Vec<ClientBinding>;

    async fn shutdown(&self) -> Result<()>;
}
