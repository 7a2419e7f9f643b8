//! # Error Types
//!
//! Error taxonomy for destination rule management using `thiserror`.

/// Custom result type for ACL rule operations
pub type Result<T> = std::result::Result<T, AclError>;

/// Substring the ACL service puts in errors raised while an instance is locked
/// by another event. Requests failing this way succeed once the lock is released.
pub const EVENT_LOCKED_MARKER: &str = "event locked";

/// Main error type for ACL rule operations
#[derive(thiserror::Error, Debug)]
pub enum AclError {
    /// A required identity component (service, instance, ...) is absent
    #[error("{field} not found")]
    MissingField { field: &'static str },

    /// Malformed or unrecognized opaque identifier
    #[error("invalid identifier {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    /// The remote service answered without the data we expected
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The remote service answered with a status outside [200, 400)
    #[error("invalid status code {status}: {body:?}")]
    Remote { status: u16, body: String },

    /// Network or serialization failure
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No rule matched the requested identity
    #[error("{message}")]
    NotFound { message: String },

    /// The caller cancelled the operation
    #[error("operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// The retry window elapsed while the remote kept failing transiently
    #[error("{operation} timed out after {duration_ms}ms: {last_error}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        last_error: String,
    },

    /// The desired rule configuration is not acceptable
    #[error("invalid rule: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The client could not be configured
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AclError {
    /// Create a missing field error
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier { id: id.into(), reason: reason.into() }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Create a remote status error
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote { status, body: body.into() }
    }

    /// Create a transport error without an underlying source
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled { operation: operation.into() }
    }

    /// Create a timeout error
    pub fn timeout(
        operation: impl Into<String>,
        duration_ms: u64,
        last_error: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
            last_error: last_error.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Whether the remote rejected the call because the instance is locked by
    /// another event. Matches on the rendered message to stay compatible with
    /// the service, which reports the condition only in the response body.
    pub fn is_event_locked(&self) -> bool {
        if matches!(self, AclError::Cancelled { .. } | AclError::Timeout { .. }) {
            return false;
        }
        self.to_string().contains(EVENT_LOCKED_MARKER)
    }

    /// HTTP status reported by the remote, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AclError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AclError {
    fn from(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            "connection failed".to_string()
        } else if error.is_decode() {
            "failed to decode response body".to_string()
        } else {
            "request failed".to_string()
        };

        Self::Transport { message, source: Some(Box::new(error)) }
    }
}

impl From<serde_json::Error> for AclError {
    fn from(error: serde_json::Error) -> Self {
        Self::Transport {
            message: format!("JSON serialization failed: {}", error),
            source: Some(Box::new(error)),
        }
    }
}
