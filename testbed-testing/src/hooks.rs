//! Hook points for other extensions.
//!
//! Extensions that start external services use [`ExtensionHooks`] to add
//! bindings and configuration overrides to the application under test.
//! Every hook is a no-op when the test class declares no `AppTest`, so
//! such extensions also work on their own.
//!
//! ```no_run
//! # use testbed_testing::{ExtensionContext, ExtensionHooks, Result};
//! # struct StoreClient;
//! # fn before_all(context: &ExtensionContext, client: StoreClient) -> Result<()> {
//! ExtensionHooks::from(context)?
//!     .register(client)
//!     .override_property("store.endpoint", "http://localhost:9000");
//! # Ok(())
//! # }
//!
//! // Parameter resolvers step aside once the coordinator owns the type
//! # fn supports(context: &ExtensionContext) -> bool {
//! if ExtensionHooks::is_active(context) {
//!     return false;
//! }
//! # true
//! # }
//! ```

use crate::Result;
use crate::context::TestContextManager;
use crate::scope::ExtensionContext;
use std::sync::Arc;
use testbed_core::{Bean, TypeKey};

pub struct ExtensionHooks {
    manager: Option<Arc<TestContextManager>>,
}

impl ExtensionHooks {
    /// Whether the test class is governed by an `AppTest` declaration.
    pub fn is_active(context: &ExtensionContext) -> bool {
        context.test_class().find_app_test().is_some()
    }

    pub fn from(context: &ExtensionContext) -> Result<Self> {
        let manager = if Self::is_active(context) {
            Some(context.store().get_or_create(context.test_class())?)
        } else {
            None
        };
        Ok(Self { manager })
    }

    /// Register `instance` under its own type.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) -> &Self {
        let bean = Bean::new(instance);
        self.register_bean(bean.type_key().clone(), None, bean)
    }

    pub fn register_named<T: Send + Sync + 'static>(&self, name: &str, instance: T) -> &Self {
        let bean = Bean::new(instance);
        self.register_bean(bean.type_key().clone(), Some(name), bean)
    }

    /// Register an already wrapped bean under an explicit key.
    pub fn register_bean(&self, key: TypeKey, name: Option<&str>, bean: Bean) -> &Self {
        if let Some(manager) = &self.manager {
            manager.register_dependency(key, name.map(str::to_string), bean);
        }
        self
    }

    pub fn override_property(&self, key: &str, value: &str) -> &Self {
        if let Some(manager) = &self.manager {
            manager.override_property(key, value);
        }
        self
    }

    pub fn is_attached(&self) -> bool {
        self.manager.is_some()
    }
}
