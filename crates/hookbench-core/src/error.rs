//! Error types and result handling for callback operations.
//!
//! `CoreError` covers storage-level failures. `HookError` is the taxonomy
//! surfaced at the HTTP boundary, each variant carrying a stable code so
//! clients can tell failures apart without parsing messages.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested record not found".to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::InvalidInput(format!("column {index} could not be decoded: {source}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Errors surfaced to callers of the callback endpoints.
#[derive(Debug, Error)]
pub enum HookError {
    /// Request body could not be decoded (E1001).
    #[error("[E1001] Invalid request body: {reason}")]
    InvalidBody {
        /// What was wrong with the body
        reason: String,
    },

    /// Request body has a content type the service does not decode (E1002).
    #[error("[E1002] Unsupported content type: {content_type}")]
    UnsupportedContentType {
        /// The content type that was sent
        content_type: String,
    },

    /// Caller address is not on the allow-list (E1003).
    #[error("[E1003] Forbidden: address {address} is not allowed")]
    Forbidden {
        /// The rejected address
        address: String,
    },

    /// Redirect destination could not be reached (E2001).
    #[error("[E2001] Upstream unavailable: {message}")]
    UpstreamUnavailable {
        /// Transport error description
        message: String,
    },

    /// Log storage failed (E3001).
    #[error("[E3001] Storage unavailable: {0}")]
    Storage(#[from] CoreError),

    /// Generic error for wrapping other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    /// Creates an invalid body error.
    pub fn invalid_body(reason: impl Into<String>) -> Self {
        Self::InvalidBody { reason: reason.into() }
    }

    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidBody { .. } => "E1001",
            Self::UnsupportedContentType { .. } => "E1002",
            Self::Forbidden { .. } => "E1003",
            Self::UpstreamUnavailable { .. } => "E2001",
            Self::Storage(_) => "E3001",
            Self::Other(_) => "E9999",
        }
    }

    /// Returns whether the failure is the caller's fault.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBody { .. } | Self::UnsupportedContentType { .. } | Self::Forbidden { .. }
        )
    }
}
