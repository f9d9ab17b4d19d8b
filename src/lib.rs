// Testbed - per-test-class application fixtures for Rust
//
// Boots an application once per test class, shadows its bindings with
// mocks, imports and dependencies, and injects beans and an HTTP client
// into test methods.

pub use testbed_core::*;

pub use testbed_testing::{
    AppTest, AppTestExtension, AsMock, ClassReport, Component, ComponentDefinition, Extension,
    ExtensionContext, ExtensionHooks, Field, FixtureError, Import, Mock, MockBean, MockSpec,
    MockTarget, Outcome, Parameter, ScopeRegistry, TestArgs, TestClass, TestContextManager,
    TestDouble, TestInstance, TestMethod, TestResult, TestRunner, WebEnvironment,
};

pub use testbed_client::{ClientError, RequestBuilder, TestClient, TestResponse};

pub use testbed_config;
pub use testbed_testing;

#[cfg(feature = "containers")]
pub use testbed_containers;

pub mod prelude {
    pub use crate::{
        AppLauncher, AppTest, AppTestExtension, Application, AsMock, Bean, ConfigOverride,
        Configuration, Container, Environment, Extension, ExtensionHooks, Field, HttpRequest,
        HttpResponse, Import, Mock, MockBean, MockSpec, MockTarget, Parameter, ScopeRegistry,
        TestArgs, TestClass, TestClient, TestDouble, TestMethod, TestRunner, TypeKey,
        WebEnvironment, async_trait,
    };
}
