// Sample application and doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use testbed_core::{
    Application, Bean, Configuration, Container, Environment, HttpResponse, TypeDescriptor,
    TypeKey,
};
use testbed_testing::{
    AppTest, AppTestExtension, AsMock, Component, Mock, MockTarget, ScopeRegistry, TestRunner,
    WebEnvironment,
};

pub const CONFIG_FILE: &str = "config.yml";
pub const CONFIGURED_PORT: u16 = 18971;

pub fn init_logging() {
    testbed_core::logging::init_test_logging();
}

/// `WidgetApp` on a random port, configured from `tests/resources`.
pub fn widget_app_test() -> AppTest {
    AppTest::of::<WidgetApp>(CONFIG_FILE)
        .use_resource_file_path(true)
        .web_environment(WebEnvironment::RandomPort)
}

pub fn runner(store: &ScopeRegistry) -> TestRunner {
    TestRunner::new(store.clone()).with_extension(Arc::new(AppTestExtension))
}

pub trait WidgetService: Send + Sync {
    fn describe(&self, id: u64) -> String;
}

pub fn widget_service_key() -> TypeKey {
    TypeKey::of::<dyn WidgetService>()
}

/// Bean for `service` that also answers `Arc<dyn WidgetService>` lookups.
pub fn widget_bean<S: WidgetService + 'static>(service: Arc<S>) -> Bean {
    let view: Arc<dyn WidgetService> = service.clone();
    Bean::from_arc(service).with_view(view)
}

pub struct DefaultWidgetService {
    prefix: String,
}

impl WidgetService for DefaultWidgetService {
    fn describe(&self, id: u64) -> String {
        format!("{} widget {}", self.prefix, id)
    }
}

/// Application metadata read from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub description: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericService {
    pub kind: &'static str,
}

pub fn generic_key(arg: TypeKey) -> TypeKey {
    TypeKey::generic("GenericService", [arg])
}

/// Per-test hook invocations seen by the application.
#[derive(Debug, Clone, Default)]
pub struct HookCounts {
    before: Arc<AtomicUsize>,
    after: Arc<AtomicUsize>,
}

impl HookCounts {
    pub fn before(&self) -> usize {
        self.before.load(Ordering::SeqCst)
    }

    pub fn after(&self) -> usize {
        self.after.load(Ordering::SeqCst)
    }
}

/// Serves `/widgets/{widgetId}` and `/echo`, binds a `WidgetService` and
/// two `GenericService` variants.
#[derive(Default)]
pub struct WidgetApp {
    hooks: HookCounts,
}

#[testbed_core::async_trait]
impl Application for WidgetApp {
    fn name(&self) -> &str {
        "widget-app"
    }

    async fn run(&self, config: &Configuration, env: &mut Environment) -> testbed_core::Result<()> {
        let info = AppInfo {
            name: config.get("name")?,
            description: config.get_or("description", String::new()),
            prefix: config.get_or("widget.prefix", "plain".to_string()),
        };

        let container = env.container().clone();
        container.catalog().describe(
            TypeDescriptor::new(TypeKey::of::<DefaultWidgetService>())
                .implements(widget_service_key()),
        );
        container
            .bind(widget_bean(Arc::new(DefaultWidgetService {
                prefix: info.prefix.clone(),
            })))
            .to(widget_service_key())
            .register()?;

        let variants = [
            (TypeKey::of::<String>(), "string"),
            (TypeKey::named("Number"), "number"),
        ];
        for (arg, kind) in variants {
            let key = generic_key(arg);
            container
                .bind(Bean::new(GenericService { kind }).with_type_key(key.clone()))
                .to(key)
                .register()?;
        }
        container.register(info);
        container.register(self.hooks.clone());

        let lookup = container.clone();
        env.router()
            .get("/widgets/{widgetId}", move |req| {
                let container = lookup.clone();
                async move {
                    let id: u64 = req
                        .param("widgetId")
                        .and_then(|raw| raw.parse().ok())
                        .ok_or_else(|| testbed_core::Error::BadRequest("widgetId".to_string()))?;
                    let service = container
                        .resolve_view::<Arc<dyn WidgetService>>(&widget_service_key(), None)?;
                    Ok(HttpResponse::ok().with_text(service.describe(id)))
                }
            })
            .get("/echo", |req| async move { HttpResponse::ok().with_json(&req.query_map()) });
        Ok(())
    }

    async fn before_test(&self, _container: &Container) -> testbed_core::Result<()> {
        self.hooks.before.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn after_test(&self, _container: &Container) -> testbed_core::Result<()> {
        self.hooks.after.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock replacing `dyn WidgetService`.
#[derive(Default)]
pub struct MockWidgetService {
    pub mock: Mock,
}

impl AsMock for MockWidgetService {
    fn as_mock(&self) -> &Mock {
        &self.mock
    }
}

impl WidgetService for MockWidgetService {
    fn describe(&self, id: u64) -> String {
        self.mock
            .invoke("describe", vec![id.to_string()], || String::from("unmocked"))
    }
}

impl MockTarget for MockWidgetService {
    fn contract() -> TypeKey {
        widget_service_key()
    }

    fn into_bean(self: Arc<Self>) -> Bean {
        widget_bean(self)
    }
}

/// Importable `WidgetService` that reads the application configuration.
pub struct ImportedWidgetService {
    app_name: String,
}

impl WidgetService for ImportedWidgetService {
    fn describe(&self, id: u64) -> String {
        format!("imported widget {} from {}", id, self.app_name)
    }
}

impl Component for ImportedWidgetService {
    fn create(container: &Container) -> testbed_core::Result<Self> {
        let config = container.resolve::<Configuration>()?;
        Ok(Self {
            app_name: config.get("name")?,
        })
    }

    fn contracts() -> Vec<TypeKey> {
        vec![widget_service_key()]
    }

    fn into_bean(self: Arc<Self>) -> Bean {
        widget_bean(self)
    }
}

pub struct LoudWidgetService;

impl WidgetService for LoudWidgetService {
    fn describe(&self, id: u64) -> String {
        format!("WIDGET {}!", id)
    }
}

impl Component for LoudWidgetService {
    fn create(_container: &Container) -> testbed_core::Result<Self> {
        Ok(Self)
    }

    fn contracts() -> Vec<TypeKey> {
        vec![widget_service_key()]
    }

    fn into_bean(self: Arc<Self>) -> Bean {
        widget_bean(self)
    }
}

pub struct QuietWidgetService;

impl WidgetService for QuietWidgetService {
    fn describe(&self, id: u64) -> String {
        format!("widget {}...", id)
    }
}

impl Component for QuietWidgetService {
    fn create(_container: &Container) -> testbed_core::Result<Self> {
        Ok(Self)
    }

    fn service_name() -> Option<&'static str> {
        Some("quiet")
    }

    fn contracts() -> Vec<TypeKey> {
        vec![widget_service_key()]
    }

    fn into_bean(self: Arc<Self>) -> Bean {
        widget_bean(self)
    }
}
