//! Client errors.

use thiserror::Error;

/// Errors returned by [`crate::TestClient`] requests.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure: connection refused, timeout, malformed response.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response status did not match the expected one.
    #[error("Expected status {expected} but got {actual}: {body}")]
    UnexpectedStatus {
        expected: u16,
        actual: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response body: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Status code of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::UnexpectedStatus { actual, .. } => Some(*actual),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
