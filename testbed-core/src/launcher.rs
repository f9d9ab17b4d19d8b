// Boots an application from a config file and serves it

use crate::application::{AppFactory, Application, Environment, ServiceListener};
use crate::logging::{debug, info, warn};
use crate::server::Server;
use crate::{Bean, Container, Error, Result};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use testbed_config::{ConfigOverride, Configuration};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Resolve a config file name against `<crate>/tests/resources`.
///
/// The crate directory is the `CARGO_MANIFEST_DIR` of the running test
/// binary, which cargo sets for `cargo test`, or the current directory.
pub fn resource_file_path(file: &str) -> Result<PathBuf> {
    let base = match std::env::var_os("CARGO_MANIFEST_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let path = base.join("tests").join("resources").join(file);
    if !path.is_file() {
        return Err(Error::Configuration(format!(
            "resource file not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Builder that boots an application.
///
/// Order of operations: load configuration, apply overrides, bind the
/// configuration into the container, run the application, run listeners,
/// then start the server when routes were registered.
pub struct AppLauncher {
    factory: AppFactory,
    config_path: PathBuf,
    overrides: Vec<ConfigOverride>,
    listeners: Vec<Arc<dyn ServiceListener>>,
}

impl AppLauncher {
    pub fn new(factory: AppFactory, config_path: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            config_path: config_path.into(),
            overrides: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_override(mut self, config_override: ConfigOverride) -> Self {
        self.overrides.push(config_override);
        self
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = ConfigOverride>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ServiceListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn start(self) -> Result<RunningApp> {
        let started = Instant::now();
        let configuration = Configuration::load(&self.config_path, &self.overrides)?;

        let application = (self.factory)();
        let mut environment = Environment::new();
        environment
            .container()
            .register(configuration.clone());

        info!(application = application.name(), "Starting application");
        application.run(&configuration, &mut environment).await?;
        for listener in &self.listeners {
            listener.on_run(&configuration, &mut environment).await?;
        }

        let router = environment.take_router();
        let server = if router.is_empty() {
            debug!(application = application.name(), "No routes registered, not serving");
            None
        } else {
            let host = configuration
                .get_string("server.host")
                .unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = match configuration.get_string("server.port") {
                Some(raw) => raw.parse::<u16>().map_err(|_| {
                    Error::Configuration(format!("server.port is not a valid port: {}", raw))
                })?,
                None => DEFAULT_PORT,
            };
            Some(Server::start(&host, port, Arc::new(router)).await?)
        };

        let local_addr = server.as_ref().map(Server::local_addr);
        info!(
            application = application.name(),
            address = ?local_addr,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Application started"
        );

        Ok(RunningApp {
            application,
            container: environment.container().clone(),
            configuration,
            local_addr,
            server: Mutex::new(server),
        })
    }
}

/// A booted application.
pub struct RunningApp {
    application: Box<dyn Application>,
    container: Container,
    configuration: Configuration,
    local_addr: Option<SocketAddr>,
    server: Mutex<Option<Server>>,
}

impl RunningApp {
    pub fn name(&self) -> &str {
        self.application.name()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bound port, or 0 when the application serves no routes.
    pub fn local_port(&self) -> u16 {
        self.local_addr.map(|addr| addr.port()).unwrap_or(0)
    }

    pub fn bean(self: &Arc<Self>) -> Bean {
        Bean::from_arc(self.clone())
    }

    pub async fn before_test(&self) -> Result<()> {
        self.application.before_test(&self.container).await
    }

    pub async fn after_test(&self) -> Result<()> {
        self.application.after_test(&self.container).await
    }

    /// Stop the server and the application. Both are attempted; the first
    /// error is returned.
    pub async fn stop(&self) -> Result<()> {
        let server = self.server.lock().take();
        let server_result = match server {
            Some(server) => server.shutdown().await,
            None => Ok(()),
        };
        let app_result = self.application.stop(&self.container).await;

        if let Err(err) = &app_result {
            warn!(application = self.name(), error = %err, "Application stop failed");
        }
        info!(application = self.name(), "Application stopped");
        server_result.and(app_result)
    }
}

impl std::fmt::Debug for RunningApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningApp")
            .field("name", &self.name())
            .field("configuration", &self.configuration)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
