//! Error types for outbound requests.

use thiserror::Error;

/// Result type alias for forwarding operations.
pub type Result<T> = std::result::Result<T, ForwardError>;

/// Failures that prevent an outbound request from producing a response.
///
/// An upstream answering with any status code, including 4xx and 5xx, is
/// not an error here.
#[derive(Debug, Clone, Error)]
pub enum ForwardError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Request did not complete within the client timeout.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Configured timeout in seconds
        timeout_seconds: u64,
    },

    /// Client or destination is misconfigured.
    #[error("invalid forwarding configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Form data could not be encoded.
    #[error("failed to encode form body: {message}")]
    Encoding {
        /// Encoder error message
        message: String,
    },
}

impl ForwardError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Renders the error as a log-record outcome line.
    ///
    /// The message is flattened onto a single line.
    pub fn outcome_text(&self) -> String {
        let message = self.to_string().replace(['\r', '\n'], " ");
        format!("forward_error={message}")
    }
}
