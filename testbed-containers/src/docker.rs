//! Docker-backed test services
//!
//! Containers are driven through the `docker` CLI: pull, run detached with
//! the service port published on the loopback interface, discover the
//! mapped host port, then poll it until it accepts connections.

use crate::error::{Result, ServiceError};
use crate::readiness::wait_for_port;
use crate::service::{ClientBinding, TestService};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Docker container configuration
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Docker image
    pub image: String,

    /// Image tag
    pub tag: String,

    /// Container name; generated when unset
    pub name: Option<String>,

    /// Environment variables
    pub env: BTreeMap<String, String>,

    /// Port the service listens on inside the container
    pub container_port: u16,

    /// Fixed host port; a free port is picked when unset
    pub host_port: Option<u16>,

    /// Arguments passed after the image name
    pub args: Vec<String>,

    /// How long to wait for the port to become reachable
    pub wait_timeout_secs: u64,
}

impl ContainerConfig {
    /// # Examples
    ///
    /// ```
    /// use testbed_containers::docker::ContainerConfig;
    ///
    /// let config = ContainerConfig::new("redis", "7").with_container_port(6379);
    /// assert_eq!(config.image_name(), "redis:7");
    /// ```
    pub fn new(image: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
            name: None,
            env: BTreeMap::new(),
            container_port: 80,
            host_port: None,
            args: Vec::new(),
            wait_timeout_secs: 30,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_container_port(mut self, port: u16) -> Self {
        self.container_port = port;
        self
    }

    pub fn with_host_port(mut self, port: u16) -> Self {
        self.host_port = Some(port);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_wait_timeout(mut self, seconds: u64) -> Self {
        self.wait_timeout_secs = seconds;
        self
    }

    pub fn image_name(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Arguments for `docker run`.
    pub fn run_args(&self, name: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        let host_port = self.host_port.map(|p| p.to_string()).unwrap_or_default();
        args.push("-p".to_string());
        args.push(format!("127.0.0.1:{}:{}", host_port, self.container_port));
        args.push(self.image_name());
        args.extend(self.args.iter().cloned());
        args
    }
}

/// Host port from `docker port` output such as `127.0.0.1:49153`.
pub fn parse_mapped_port(output: &str) -> Option<u16> {
    output
        .lines()
        .next()?
        .trim()
        .rsplit(':')
        .next()?
        .parse()
        .ok()
}

type ClientFactory = Arc<dyn Fn(&str) -> Vec<ClientBinding> + Send + Sync>;

struct RunningContainer {
    id: String,
    endpoint: String,
}

/// A [`TestService`] running in a Docker container.
pub struct DockerService {
    config: ContainerConfig,
    clients: Option<ClientFactory>,
    running: Mutex<Option<RunningContainer>>,
}

impl DockerService {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            clients: None,
            running: Mutex::new(None),
        }
    }

    /// Build clients from the endpoint once the container is ready.
    pub fn with_clients<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Vec<ClientBinding> + Send + Sync + 'static,
    {
        self.clients = Some(Arc::new(factory));
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn container_id(&self) -> Option<String> {
        self.running.lock().as_ref().map(|c| c.id.clone())
    }

    pub async fn is_docker_available() -> bool {
        Command::new("docker")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn docker(args: &[String]) -> std::result::Result<String, String> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn container_name(&self) -> String {
        self.config.name.clone().unwrap_or_else(|| {
            let image = self.config.image.replace(['/', ':'], "-");
            format!("testbed-{}-{}", image, uuid::Uuid::new_v4())
        })
    }

    /// Run a command inside the started container.
    pub async fn exec<I, S>(&self, command: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self
            .container_id()
            .ok_or_else(|| ServiceError::NotStarted(self.config.image_name()))?;
        let mut args = vec!["exec".to_string(), id];
        args.extend(command.into_iter().map(Into::into));
        Self::docker(&args).await.map_err(ServiceError::StartFailed)
    }

    async fn stop_container(id: &str) -> Result<()> {
        Self::docker(&["stop".to_string(), id.to_string()])
            .await
            .map(|_| ())
            .map_err(ServiceError::StopFailed)
    }
}

#[async_trait]
impl TestService for DockerService {
    fn name(&self) -> &str {
        &self.config.image
    }

    async fn start(&self) -> Result<Option<String>> {
        if !Self::is_docker_available().await {
            return Err(ServiceError::NotAvailable(
                "Docker not found. Please install Docker.".to_string(),
            ));
        }

        let image = self.config.image_name();
        debug!(image = %image, "Pulling image");
        Self::docker(&["pull".to_string(), image.clone()])
            .await
            .map_err(ServiceError::PullFailed)?;

        let name = self.container_name();
        let id = Self::docker(&self.config.run_args(&name))
            .await
            .map_err(ServiceError::StartFailed)?;

        let mapping = format!("{}/tcp", self.config.container_port);
        let port = match Self::docker(&["port".to_string(), id.clone(), mapping]).await {
            Ok(output) => parse_mapped_port(&output),
            Err(e) => {
                warn!(container = %name, error = %e, "Could not read port mapping");
                None
            }
        };
        let Some(port) = port else {
            Self::stop_container(&id).await?;
            return Err(ServiceError::StartFailed(format!(
                "no host port published for {}",
                name
            )));
        };

        let timeout = Duration::from_secs(self.config.wait_timeout_secs);
        if let Err(e) = wait_for_port(&format!("127.0.0.1:{}", port), timeout).await {
            Self::stop_container(&id).await?;
            return Err(e);
        }

        let endpoint = format!("http://localhost:{}", port);
        info!(container = %name, image = %image, endpoint = %endpoint, "Container ready");
        *self.running.lock() = Some(RunningContainer {
            id,
            endpoint: endpoint.clone(),
        });
        Ok(Some(endpoint))
    }

    fn clients(&self) -> Vec<ClientBinding> {
        let running = self.running.lock();
        match (running.as_ref(), &self.clients) {
            (Some(container), Some(factory)) => factory(&container.endpoint),
            _ => Vec::new(),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        let running = self.running.lock().take();
        match running {
            Some(container) => {
                Self::stop_container(&container.id).await?;
                info!(container = %container.id, "Container stopped");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for DockerService {
    fn drop(&mut self) {
        // Containers run with --rm, stopping removes them
        if let Some(container) = self.running.get_mut().take() {
            let _ = std::process::Command::new("docker")
                .arg("stop")
                .arg(&container.id)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

/// Connection settings for a local DynamoDB endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbSettings {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// DynamoDB Local container helper
pub struct DynamoDbLocal;

impl DynamoDbLocal {
    pub const CONTAINER_PORT: u16 = 8000;

    /// # Examples
    ///
    /// ```
    /// use testbed_containers::docker::DynamoDbLocal;
    ///
    /// let config = DynamoDbLocal::config();
    /// assert_eq!(config.container_port, 8000);
    /// ```
    pub fn config() -> ContainerConfig {
        ContainerConfig::new("amazon/dynamodb-local", "latest")
            .with_name(format!("testbed-dynamodb-{}", uuid::Uuid::new_v4()))
            .with_container_port(Self::CONTAINER_PORT)
            .with_args([
                "-jar",
                "DynamoDBLocal.jar",
                "-sharedDb",
                "-inMemory",
                "-disableTelemetry",
            ])
            .with_wait_timeout(30)
    }

    /// A service exposing [`DynamoDbSettings`] as its client.
    pub fn service() -> DockerService {
        DockerService::new(Self::config()).with_clients(|endpoint| {
            vec![ClientBinding::of(DynamoDbSettings {
                endpoint: endpoint.to_string(),
                region: "us-east-1".to_string(),
                access_key_id: "dummy".to_string(),
                secret_access_key: "dummy".to_string(),
            })]
        })
    }
}
