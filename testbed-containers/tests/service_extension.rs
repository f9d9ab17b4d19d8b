// ServiceTestExtension driven through the test runner with an in-process service

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use testbed_containers::{
    ClientBinding, ServiceError, ServiceHandle, ServiceTestExtension, TestService, wait_for_port,
};
use testbed_core::{Application, Configuration, Environment};
use testbed_testing::{
    AppTest, AppTestExtension, Outcome, Parameter, ScopeRegistry, TestArgs,
    TestClass, TestMethod, TestRunner,
};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueClient {
    endpoint: Option<String>,
}

/// Listens on a loopback port while started.
struct FakeQueue {
    exposed: bool,
    stopped: Arc<AtomicBool>,
    listener: Mutex<Option<TcpListener>>,
    endpoint: Mutex<Option<String>>,
}

impl FakeQueue {
    fn new(exposed: bool, stopped: Arc<AtomicBool>) -> Self {
        Self {
            exposed,
            stopped,
            listener: Mutex::new(None),
            endpoint: Mutex::new(None),
        }
    }
}

#[testbed_core::async_trait]
impl TestService for FakeQueue {
    fn name(&self) -> &str {
        "fake-queue"
    }

    async fn start(&self) -> testbed_containers::Result<Option<String>> {
        if !self.exposed {
            return Ok(None);
        }
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| ServiceError::StartFailed(e.to_string()))?;
        let address = listener
            .local_addr()
            .map_err(|e| ServiceError::StartFailed(e.to_string()))?;
        wait_for_port(&address.to_string(), Duration::from_secs(1)).await?;

        let endpoint = format!("tcp://{}", address);
        *self.listener.lock() = Some(listener);
        *self.endpoint.lock() = Some(endpoint.clone());
        Ok(Some(endpoint))
    }

    fn clients(&self) -> Vec<ClientBinding> {
        vec![ClientBinding::of(QueueClient {
            endpoint: self.endpoint.lock().clone(),
        })]
    }

    async fn shutdown(&self) -> testbed_containers::Result<()> {
        self.listener.lock().take();
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueSettings {
    endpoint: String,
    name: String,
}

#[derive(Default)]
struct QueueApp;

#[testbed_core::async_trait]
impl Application for QueueApp {
    async fn run(&self, config: &Configuration, env: &mut Environment) -> testbed_core::Result<()> {
        env.container().register(QueueSettings {
            endpoint: config.get("queue.endpoint")?,
            name: config.get("queue.name")?,
        });
        Ok(())
    }
}

fn queue_app_test() -> AppTest {
    AppTest::of::<QueueApp>("app.yml").use_resource_file_path(true)
}

fn extension(exposed: bool, stopped: &Arc<AtomicBool>) -> ServiceTestExtension<FakeQueue> {
    let stopped = stopped.clone();
    ServiceTestExtension::new(move || FakeQueue::new(exposed, stopped.clone()))
}

fn handle_param() -> Parameter {
    Parameter::of::<ServiceHandle<FakeQueue>>()
}

#[tokio::test]
async fn test_standalone_service_resolves_handle_and_clients() {
    let stopped = Arc::new(AtomicBool::new(false));
    let service = Arc::new(extension(true, &stopped));
    let runner = TestRunner::new(ScopeRegistry::new()).with_extension(service.clone());
    let class = TestClass::new("StandaloneQueueTest").build();

    let method = TestMethod::new("uses_queue", |args: TestArgs| async move {
        let handle = args
            .get::<ServiceHandle<FakeQueue>>(0)
            .ok_or("missing handle")?;
        let client = args.get::<QueueClient>(1).ok_or("missing client")?;

        let endpoint = handle.endpoint().ok_or("no endpoint")?;
        assert!(endpoint.starts_with("tcp://127.0.0.1:"));
        assert_eq!(client.endpoint.as_deref(), Some(endpoint));
        assert_eq!(handle.client::<QueueClient>().as_deref(), Some(&*client));
        Ok(())
    })
    .param(handle_param())
    .param(Parameter::of::<QueueClient>());

    runner.run(class.clone(), vec![method]).await.assert_success();

    assert!(stopped.load(Ordering::SeqCst));
    assert!(service.handle(class.id()).is_none());
}

#[tokio::test]
async fn test_endpoint_properties_and_clients_reach_the_application() {
    let stopped = Arc::new(AtomicBool::new(false));
    let store = ScopeRegistry::new();
    let runner = TestRunner::new(store.clone())
        .with_extension(Arc::new(
            extension(true, &stopped).with_properties(["queue.endpoint=${endpoint}/orders"]),
        ))
        .with_extension(Arc::new(AppTestExtension));
    let class = TestClass::new("QueueAppTest").app_test(queue_app_test()).build();

    let method = TestMethod::new("reads_settings", |args: TestArgs| async move {
        let handle = args
            .get::<ServiceHandle<FakeQueue>>(0)
            .ok_or("missing handle")?;
        let settings = args.get::<QueueSettings>(1).ok_or("missing settings")?;
        let client = args.get::<QueueClient>(2).ok_or("missing client")?;

        let endpoint = handle.endpoint().ok_or("no endpoint")?;
        assert_eq!(settings.endpoint, format!("{}/orders", endpoint));
        assert_eq!(settings.name, "orders");
        assert_eq!(client.endpoint.as_deref(), Some(endpoint));
        Ok(())
    })
    .param(handle_param())
    .param(Parameter::of::<QueueSettings>())
    .param(Parameter::of::<QueueClient>());

    runner.run(class, vec![method]).await.assert_success();
    assert!(stopped.load(Ordering::SeqCst));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_properties_skipped_without_endpoint() {
    let stopped = Arc::new(AtomicBool::new(false));
    let runner = TestRunner::new(ScopeRegistry::new())
        .with_extension(Arc::new(
            extension(false, &stopped).with_properties(["queue.endpoint=${endpoint}"]),
        ))
        .with_extension(Arc::new(AppTestExtension));
    let class = TestClass::new("HiddenQueueTest").app_test(queue_app_test()).build();

    let method = TestMethod::new("keeps_config", |args: TestArgs| async move {
        let settings = args.get::<QueueSettings>(0).ok_or("missing settings")?;
        let client = args.get::<QueueClient>(1).ok_or("missing client")?;
        assert_eq!(settings.endpoint, "unset");
        assert_eq!(client.endpoint, None);
        Ok(())
    })
    .param(Parameter::of::<QueueSettings>())
    .param(Parameter::of::<QueueClient>());

    runner.run(class, vec![method]).await.assert_success();
}

#[tokio::test]
async fn test_custom_token_and_malformed_property() {
    let stopped = Arc::new(AtomicBool::new(false));
    let runner = TestRunner::new(ScopeRegistry::new())
        .with_extension(Arc::new(
            extension(true, &stopped)
                .with_token("bootstrapServers")
                .with_properties(["queue.endpoint=${bootstrapServers}"]),
        ))
        .with_extension(Arc::new(AppTestExtension));
    let class = TestClass::new("TokenQueueTest").app_test(queue_app_test()).build();

    let method = TestMethod::new("custom_token", |args: TestArgs| async move {
        let settings = args.get::<QueueSettings>(0).ok_or("missing settings")?;
        assert!(settings.endpoint.starts_with("tcp://"));
        Ok(())
    })
    .param(Parameter::of::<QueueSettings>());
    runner.run(class, vec![method]).await.assert_success();

    let broken_stopped = Arc::new(AtomicBool::new(false));
    let runner = TestRunner::new(ScopeRegistry::new())
        .with_extension(Arc::new(
            extension(true, &broken_stopped).with_properties(["queue.endpoint"]),
        ))
        .with_extension(Arc::new(AppTestExtension));
    let class = TestClass::new("BrokenTokenTest").app_test(queue_app_test()).build();

    let report = runner
        .run(class, vec![TestMethod::new("never", |_args: TestArgs| async { Ok(()) })])
        .await;
    assert!(report.class_errors[0].contains("Invalid property detected"));
    assert!(matches!(report.outcome("never"), Some(Outcome::Aborted(_))));
    // Started before the failure, stopped in after_all
    assert!(broken_stopped.load(Ordering::SeqCst));
}

