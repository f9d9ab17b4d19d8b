//! Kafka broker for tests
//!
//! [`KafkaBroker`] runs a single-node KRaft broker in Docker and creates the
//! requested topics once it accepts connections. Its endpoint is the
//! `host:port` bootstrap address, so properties are usually written with a
//! `${bootstrapServers}` placeholder:
//!
//! ```no_run
//! use std::sync::Arc;
//! use testbed_containers::KafkaBroker;
//! use testbed_testing::{AppTestExtension, ScopeRegistry, TestRunner};
//!
//! let runner = TestRunner::new(ScopeRegistry::new())
//!     .with_extension(Arc::new(
//!         KafkaBroker::extension(["orders"])
//!             .with_properties(["kafka.bootstrapServers=${bootstrapServers}"]),
//!     ))
//!     .with_extension(Arc::new(AppTestExtension));
//! ```
//!
//! Clients are exposed as [`ProducerFactory`] and [`ConsumerFactory`]. With
//! the `kafka` feature they build `rdkafka` producers and consumers.

use crate::docker::{ContainerConfig, DockerService};
use crate::error::{Result, ServiceError};
use crate::extension::ServiceTestExtension;
use crate::service::{ClientBinding, TestService};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Placeholder replaced by the broker's bootstrap address.
pub const BOOTSTRAP_SERVERS_TOKEN: &str = "bootstrapServers";

/// Client properties for producers against the test broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerFactory {
    bootstrap_servers: String,
}

impl ProducerFactory {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
        }
    }

    pub fn bootstrap_servers(&self) -> &str {
        &self.bootstrap_servers
    }

    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("bootstrap.servers".to_string(), self.bootstrap_servers.clone());
        props.insert("acks".to_string(), "all".to_string());
        props.insert("message.timeout.ms".to_string(), "10000".to_string());
        props
    }

    #[cfg(feature = "kafka")]
    pub fn create_producer(&self) -> Result<rdkafka::producer::FutureProducer> {
        client_config(&self.properties())
            .create()
            .map_err(|e| ServiceError::ClientCreation(e.to_string()))
    }
}

/// Client properties for consumers against the test broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerFactory {
    bootstrap_servers: String,
}

impl ConsumerFactory {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
        }
    }

    pub fn bootstrap_servers(&self) -> &str {
        &self.bootstrap_servers
    }

    /// Consumers read from the earliest offset and never auto-commit.
    pub fn properties(&self, group_id: &str) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("bootstrap.servers".to_string(), self.bootstrap_servers.clone());
        props.insert("group.id".to_string(), group_id.to_string());
        props.insert("enable.auto.commit".to_string(), "false".to_string());
        props.insert("auto.offset.reset".to_string(), "earliest".to_string());
        props.insert("session.timeout.ms".to_string(), "10000".to_string());
        props
    }

    #[cfg(feature = "kafka")]
    pub fn create_consumer(&self, group_id: &str) -> Result<rdkafka::consumer::StreamConsumer> {
        client_config(&self.properties(group_id))
            .create()
            .map_err(|e| ServiceError::ClientCreation(e.to_string()))
    }
}

#[cfg(feature = "kafka")]
fn client_config(properties: &BTreeMap<String, String>) -> rdkafka::ClientConfig {
    let mut client_config = rdkafka::ClientConfig::new();
    for (key, value) in properties {
        client_config.set(key, value);
    }
    client_config
}

struct RunningBroker {
    container: DockerService,
    bootstrap_servers: String,
}

/// Single-node Kafka broker in Docker.
pub struct KafkaBroker {
    image: String,
    tag: String,
    topics: Vec<String>,
    running: Mutex<Option<RunningBroker>>,
}

impl KafkaBroker {
    pub const CONTAINER_PORT: u16 = 9092;
    const TOPICS_SCRIPT: &'static str = "/opt/kafka/bin/kafka-topics.sh";

    pub fn new() -> Self {
        Self {
            image: "apache/kafka".to_string(),
            tag: "3.8.0".to_string(),
            topics: Vec::new(),
            running: Mutex::new(None),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.image = image.into();
        self.tag = tag.into();
        self
    }

    /// Topics created once the broker is reachable.
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// An extension starting one broker with `topics` per test class,
    /// substituting `${bootstrapServers}` in its properties.
    pub fn extension<I, S>(topics: I) -> ServiceTestExtension<KafkaBroker>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        ServiceTestExtension::new(move || KafkaBroker::new().with_topics(topics.clone()))
            .with_token(BOOTSTRAP_SERVERS_TOKEN)
    }

    /// Container settings for a broker advertised on `host_port`. The
    /// advertised listener must match the published port, so the port is
    /// fixed before the container starts.
    pub fn config(&self, host_port: u16) -> ContainerConfig {
        ContainerConfig::new(&self.image, &self.tag)
            .with_name(format!("testbed-kafka-{}", uuid::Uuid::new_v4()))
            .with_container_port(Self::CONTAINER_PORT)
            .with_host_port(host_port)
            .with_env("KAFKA_NODE_ID", "1")
            .with_env("KAFKA_PROCESS_ROLES", "broker,controller")
            .with_env("KAFKA_LISTENERS", "PLAINTEXT://:9092,CONTROLLER://:9093")
            .with_env(
                "KAFKA_ADVERTISED_LISTENERS",
                format!("PLAINTEXT://localhost:{}", host_port),
            )
            .with_env("KAFKA_CONTROLLER_LISTENER_NAMES", "CONTROLLER")
            .with_env(
                "KAFKA_LISTENER_SECURITY_PROTOCOL_MAP",
                "CONTROLLER:PLAINTEXT,PLAINTEXT:PLAINTEXT",
            )
            .with_env("KAFKA_CONTROLLER_QUORUM_VOTERS", "1@localhost:9093")
            .with_env("KAFKA_OFFSETS_TOPIC_REPLICATION_FACTOR", "1")
            .with_env("KAFKA_TRANSACTION_STATE_LOG_REPLICATION_FACTOR", "1")
            .with_env("KAFKA_TRANSACTION_STATE_LOG_MIN_ISR", "1")
            .with_env("KAFKA_GROUP_INITIAL_REBALANCE_DELAY_MS", "0")
            .with_wait_timeout(60)
    }

    pub fn bootstrap_servers(&self) -> Option<String> {
        self.running.lock().as_ref().map(|b| b.bootstrap_servers.clone())
    }

    /// `kafka-topics.sh` arguments creating `topic` inside the container.
    pub fn create_topic_command(topic: &str) -> Vec<String> {
        [
            Self::TOPICS_SCRIPT,
            "--create",
            "--if-not-exists",
            "--topic",
            topic,
            "--partitions",
            "1",
            "--replication-factor",
            "1",
            "--bootstrap-server",
            "localhost:9092",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn free_port() -> Result<u16> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| ServiceError::StartFailed(format!("no free port: {}", e)))?;
        listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|e| ServiceError::StartFailed(format!("no free port: {}", e)))
    }
}

impl Default for KafkaBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestService for KafkaBroker {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn start(&self) -> Result<Option<String>> {
        let port = Self::free_port().await?;
        let container = DockerService::new(self.config(port));
        container.start().await?;

        for topic in &self.topics {
            if let Err(e) = container.exec(Self::create_topic_command(topic)).await {
                container.shutdown().await?;
                return Err(e);
            }
            debug!(topic = %topic, "Created topic");
        }

        let bootstrap_servers = format!("localhost:{}", port);
        info!(bootstrap_servers = %bootstrap_servers, topics = ?self.topics, "Kafka broker ready");
        *self.running.lock() = Some(RunningBroker {
            container,
            bootstrap_servers: bootstrap_servers.clone(),
        });
        Ok(Some(bootstrap_servers))
    }

    fn clients(&self) -> Vec<ClientBinding> {
        match self.bootstrap_servers() {
            Some(servers) => vec![
                ClientBinding::of(ProducerFactory::new(servers.clone())),
                ClientBinding::of(ConsumerFactory::new(servers)),
            ],
            None => Vec::new(),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        let running = self.running.lock().take();
        match running {
            Some(broker) => broker.container.shutdown().await,
            None => Ok(()),
        }
    }
}
