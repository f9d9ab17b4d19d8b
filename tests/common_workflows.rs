//! End-to-end workflow through the facade: an application with a payment
//! gateway, tested with a mocked gateway and the HTTP client.

use std::sync::Arc;
use testbed::prelude::*;

trait PaymentGateway: Send + Sync {
    fn charge(&self, cents: u64) -> bool;
}

fn gateway_key() -> TypeKey {
    TypeKey::of::<dyn PaymentGateway>()
}

struct LiveGateway;

impl PaymentGateway for LiveGateway {
    fn charge(&self, _cents: u64) -> bool {
        panic!("live gateway must not be used in tests")
    }
}

#[derive(Default)]
struct OrdersApp;

#[async_trait]
impl Application for OrdersApp {
    fn name(&self) -> &str {
        "orders"
    }

    async fn run(&self, config: &Configuration, env: &mut Environment) -> testbed::Result<()> {
        let currency: String = config.get("payments.currency")?;
        let live: Arc<dyn PaymentGateway> = Arc::new(LiveGateway);
        env.container()
            .bind(Bean::new(LiveGateway).with_view(live))
            .to(gateway_key())
            .register()?;

        let container = env.container().clone();
        env.router().post("/orders", move |req: HttpRequest| {
            let container = container.clone();
            let currency = currency.clone();
            async move {
                let order: serde_json::Value = req.json()?;
                let cents = order["cents"].as_u64().unwrap_or(0);
                let gateway =
                    container.resolve_view::<Arc<dyn PaymentGateway>>(&gateway_key(), None)?;
                let paid = gateway.charge(cents);
                HttpResponse::new(201).with_json(&serde_json::json!({
                    "paid": paid,
                    "currency": currency,
                }))
            }
        });
        Ok(())
    }
}

#[derive(Default)]
struct MockGateway {
    mock: Mock,
}

impl AsMock for MockGateway {
    fn as_mock(&self) -> &Mock {
        &self.mock
    }
}

impl PaymentGateway for MockGateway {
    fn charge(&self, cents: u64) -> bool {
        self.mock.invoke("charge", vec![cents.to_string()], || false)
    }
}

impl MockTarget for MockGateway {
    fn contract() -> TypeKey {
        gateway_key()
    }

    fn into_bean(self: Arc<Self>) -> Bean {
        let view: Arc<dyn PaymentGateway> = self.clone();
        Bean::from_arc(self).with_view(view)
    }
}

#[tokio::test]
async fn test_order_workflow_with_mocked_gateway() {
    let class = TestClass::new("OrdersWorkflowTest")
        .app_test(
            AppTest::of::<OrdersApp>("orders.yml")
                .use_resource_file_path(true)
                .web_environment(WebEnvironment::RandomPort)
                .properties(["payments.currency=USD"]),
        )
        .field(Field::mutable("gateway", gateway_key()).mock(MockSpec::of::<MockGateway>()))
        .build();

    let approved = TestMethod::new("approved_order", |args: TestArgs| async move {
        let gateway = args
            .instance()
            .get_as::<MockGateway>("gateway")
            .ok_or("gateway mock not injected")?;
        gateway.mock.returning("charge", &true);

        let client = args.cloned::<TestClient>(0).ok_or("missing client")?;
        let receipt: serde_json::Value = client
            .post("orders", &[])
            .body(&serde_json::json!({ "cents": 1250 }))
            .expect_status(201)
            .json()
            .await?;

        assert_eq!(receipt["paid"], true);
        assert_eq!(receipt["currency"], "USD");
        assert_eq!(gateway.interactions()[0].args, vec!["1250".to_string()]);
        Ok(())
    })
    .param(Parameter::of::<TestClient>());

    let declined = TestMethod::new("declined_by_default", |args: TestArgs| async move {
        let client = args.cloned::<TestClient>(0).ok_or("missing client")?;
        let receipt: serde_json::Value = client
            .post("orders", &[])
            .body(&serde_json::json!({ "cents": 99 }))
            .expect_status(201)
            .json()
            .await?;
        assert_eq!(receipt["paid"], false);
        Ok(())
    })
    .param(Parameter::of::<TestClient>());

    let store = ScopeRegistry::new();
    let report = TestRunner::new(store.clone())
        .with_extension(Arc::new(AppTestExtension))
        .run(class, vec![approved, declined])
        .await;

    report.assert_success();
    assert!(store.is_empty());
}

#[test]
fn test_configuration_overrides_without_fixture() {
    let mut config = Configuration::from_value(serde_json::json!({ "a": { "b": 1 } }));
    config.apply(&ConfigOverride::config("a.c", "two")).unwrap();
    assert_eq!(config.get_string("a.b").as_deref(), Some("1"));
    assert_eq!(config.get_string("a.c").as_deref(), Some("two"));
}
