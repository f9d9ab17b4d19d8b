// Errors raised by external test services

use std::time::Duration;
use testbed_testing::FixtureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Docker not available: {0}")]
    NotAvailable(String),

    #[error("Image pull failed: {0}")]
    PullFailed(String),

    #[error("Service start failed: {0}")]
    StartFailed(String),

    #[error("Service stop failed: {0}")]
    StopFailed(String),

    #[error("{address} not reachable after {timeout:?}")]
    ReadinessTimeout { address: String, timeout: Duration },

    #[error("Service {0} has not been started")]
    NotStarted(String),

    #[error("Client creation failed: {0}")]
    ClientCreation(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl From<ServiceError> for FixtureError {
    fn from(err: ServiceError) -> Self {
        FixtureError::Extension {
            extension: "service".to_string(),
            message: err.to_string(),
        }
    }
}
