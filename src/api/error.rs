//! Error taxonomy surfaced by every API operation

use thiserror::Error;

use super::auth::TokenStoreError;

/// Message shown when no response reached the client at all
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Unable to connect to the server. Please verify the backend is running.";

/// Errors that can occur when talking to the churn analytics API
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response reached the client (server down, DNS, refused connection)
    #[error("{message}")]
    Connection {
        /// User-facing message, distinct from any server-returned error
        message: String,
        /// The underlying transport failure
        detail: String,
    },

    /// The client-side deadline elapsed before a response arrived
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// HTTP 401: token missing, expired, or invalid
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// HTTP 4xx other than 401, with the server's explanation
    #[error("Request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// HTTP 5xx
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body was not the JSON shape we expected
    #[error("Failed to parse API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local file I/O failed (CSV export)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bearer token could not be persisted or loaded
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    /// The client was configured with something unusable
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Builds a connection error with the standard user-facing message
    pub fn connection(detail: impl Into<String>) -> Self {
        ApiError::Connection {
            message: CONNECTION_ERROR_MESSAGE.to_string(),
            detail: detail.into(),
        }
    }

    /// Whether a read may be retried after this failure
    ///
    /// Only failures without any server response qualify; an error carrying a
    /// status code is surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Connection { .. } | ApiError::Timeout { .. })
    }

    /// True for connection failures and timeouts alike
    pub fn is_connection_error(&self) -> bool {
        self.is_retryable()
    }

    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { .. } => Some(401),
            ApiError::Validation { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classifies a non-success HTTP status with the server-supplied message
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ApiError::Auth { message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Validation { status, message },
        }
    }
}
