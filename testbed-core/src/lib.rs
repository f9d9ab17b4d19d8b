//! Runtime pieces an application under test is built from.
//!
//! - [`TypeKey`], [`TypeCatalog`]: structural type identity and declared supertypes
//! - [`Bean`]: a shared, type-erased instance
//! - [`Container`]: ranked, optionally named bindings keyed by [`TypeKey`]
//! - [`Router`], [`HttpRequest`], [`HttpResponse`]: route handlers
//! - [`Application`], [`AppLauncher`], [`RunningApp`]: boot, serve and stop
//!
//! ```no_run
//! use std::sync::Arc;
//! use testbed_core::*;
//!
//! struct Hello;
//!
//! #[testbed_core::async_trait]
//! impl Application for Hello {
//!     async fn run(&self, _config: &Configuration, env: &mut Environment) -> Result<()> {
//!         env.router().get("/hello", |_req| async { Ok(HttpResponse::ok().with_text("hi")) });
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let factory: AppFactory = Arc::new(|| Box::new(Hello));
//! let app = AppLauncher::new(factory, "config.yml")
//!     .with_override(ConfigOverride::random_ports())
//!     .start()
//!     .await?;
//! println!("listening on {}", app.local_port());
//! app.stop().await?;
//! # Ok::<(), Error>(())
//! # });
//! ```

pub mod application;
pub mod bean;
pub mod container;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod message;
pub mod routing;
pub mod server;
pub mod types;

pub use application::{AppFactory, Application, Environment, ServiceListener};
pub use bean::Bean;
pub use container::{BeanFactory, Binding, BindingBuilder, Container, RANK_DEFAULT, RANK_MAX};
pub use error::{Error, Result};
pub use launcher::{AppLauncher, RunningApp, resource_file_path};
pub use message::{HttpRequest, HttpResponse};
pub use routing::{HandlerFn, Route, Router};
pub use types::{TypeCatalog, TypeDescriptor, TypeKey, inheritance_closure};

pub use testbed_config::{ConfigOverride, Configuration};

pub use async_trait::async_trait;
