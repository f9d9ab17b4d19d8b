// Errors raised by the fixture lifecycle

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    /// Malformed declarations: bad property tokens, missing declarations,
    /// ambiguous duplicate bindings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The application failed to boot. Memoized per test class.
    #[error("Failed to boot application for {class}: {source}")]
    Boot {
        class: String,
        #[source]
        source: Arc<testbed_core::Error>,
    },

    #[error("No registered extension can resolve parameter {0}")]
    ParameterNotResolvable(String),

    #[error("Competing extensions [{extensions}] can resolve parameter {parameter}")]
    CompetingResolvers {
        parameter: String,
        extensions: String,
    },

    #[error("Test scope for {0} has already been torn down")]
    ScopeTornDown(String),

    #[error("Teardown failed for {class}: {source}")]
    Teardown {
        class: String,
        #[source]
        source: testbed_core::Error,
    },

    #[error("Extension {extension} failed: {message}")]
    Extension { extension: String, message: String },

    #[error(transparent)]
    Core(#[from] testbed_core::Error),

    #[error(transparent)]
    Client(#[from] testbed_client::ClientError),
}

impl FixtureError {
    /// Errors that abort the whole test class rather than a single method.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FixtureError::Configuration(_) | FixtureError::Boot { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FixtureError>;
