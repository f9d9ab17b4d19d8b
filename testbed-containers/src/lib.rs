//! External services for testbed fixtures.
//!
//! A [`TestService`] is started once per test class by a
//! [`ServiceTestExtension`], before the application boots. Its clients are
//! registered into the application under test and its endpoint is written
//! into configuration properties:
//!
//! ```no_run
//! use std::sync::Arc;
//! use testbed_containers::{DynamoDbLocal, ServiceTestExtension};
//! use testbed_testing::{AppTestExtension, ScopeRegistry, TestRunner};
//!
//! let runner = TestRunner::new(ScopeRegistry::new())
//!     .with_extension(Arc::new(
//!         ServiceTestExtension::new(DynamoDbLocal::service)
//!             .with_properties(["dynamo.endpoint=${endpoint}"]),
//!     ))
//!     .with_extension(Arc::new(AppTestExtension));
//! ```
//!
//! [`KafkaBroker`] does the same for a message broker, substituting
//! `${bootstrapServers}` instead of `${endpoint}`. The `kafka` feature adds
//! `rdkafka` producers and consumers to its client factories.

pub mod docker;
pub mod error;
pub mod extension;
pub mod kafka;
pub mod readiness;
pub mod service;

pub use docker::{ContainerConfig, DockerService, DynamoDbLocal, DynamoDbSettings};
pub use error::{Result, ServiceError};
pub use extension::{ServiceHandle, ServiceTestExtension};
pub use kafka::{BOOTSTRAP_SERVERS_TOKEN, ConsumerFactory, KafkaBroker, ProducerFactory};
pub use readiness::wait_for_port;
pub use service::{ClientBinding, TestService};
