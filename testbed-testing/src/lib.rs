//! Per-test-class application fixtures.
//!
//! A test class declares an [`AppTest`]: the application to boot, its
//! configuration file and property overrides. The first test that needs
//! the application boots it once for the class; every test in the class
//! shares it, and it is stopped after the last one.
//!
//! Before boot the class can replace bindings of the application:
//!
//! - [`MockBean`] declarations and mock fields bind test doubles, reset
//!   after every test
//! - [`Import`] declarations bind extra components
//! - other extensions register instances through [`ExtensionHooks`]
//!
//! All of them are bound at [`testbed_core::RANK_MAX`], so they win over
//! the application's own bindings; mocks win over dependencies, which win
//! over imports.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use testbed_testing::*;
//! use testbed_core::{Application, Configuration, Environment, HttpResponse};
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! #[testbed_core::async_trait]
//! impl Application for Hello {
//!     async fn run(&self, _c: &Configuration, env: &mut Environment) -> testbed_core::Result<()> {
//!         env.router().get("/hello", |_req| async { Ok(HttpResponse::ok().with_text("hi")) });
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let class = TestClass::new("HelloTest")
//!     .app_test(
//!         AppTest::of::<Hello>("config.yml")
//!             .use_resource_file_path(true)
//!             .web_environment(WebEnvironment::RandomPort),
//!     )
//!     .build();
//!
//! let runner = TestRunner::new(ScopeRegistry::new()).with_extension(Arc::new(AppTestExtension));
//! let report = runner
//!     .run(
//!         class,
//!         vec![TestMethod::new("says_hi", |args: TestArgs| async move {
//!             let client = args.cloned::<TestClient>(0).ok_or("no client")?;
//!             assert_eq!(client.get("hello", &[]).text().await?, "hi");
//!             Ok(())
//!         })
//!         .param(Parameter::of::<TestClient>())],
//!     )
//!     .await;
//! report.assert_success();
//! # });
//! ```

pub mod binder;
pub mod class;
pub mod context;
pub mod dependency;
pub mod double;
pub mod error;
pub mod extension;
pub mod hooks;
pub mod import;
pub mod instance;
pub mod mock;
pub mod properties;
pub mod runner;
pub mod scope;

pub use binder::TestServiceListener;
pub use class::{
    AppTest, Field, Import, MockBean, Mutability, TestClass, TestClassId, WebEnvironment,
};
pub use context::{ScopeState, TestContextManager};
pub use dependency::{DependencyContext, DependencyInfo};
pub use double::{
    AsMock, Interaction, Mock, MockInstance, MockSpec, MockTarget, ResetResult, TestDouble,
};
pub use error::{FixtureError, Result};
pub use extension::{AppTestExtension, Extension, Parameter};
pub use hooks::ExtensionHooks;
pub use import::{Component, ComponentDefinition, ImportContext, ImportedComponent};
pub use instance::TestInstance;
pub use mock::{MockContext, MockDefinition};
pub use properties::{
    PropertyCollector, PropertyOverrides, split_property, split_property_with_variable,
};
pub use runner::{
    ClassReport, MethodReport, Outcome, TestArgs, TestMethod, TestResult, TestRunner,
};
pub use scope::{ExtensionContext, ScopeRegistry};

pub use testbed_client::TestClient;
