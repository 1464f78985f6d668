//! Error types for the DNS-SD client surface

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors reported synchronously when a discovery call cannot be initiated
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying service daemon failed to initialize
    #[error("failed to initialize mDNS daemon: {reason}")]
    DaemonInit { reason: String },

    /// A discovery operation could not be started
    #[error("failed to start {operation}: {reason}")]
    StartFailed {
        operation: &'static str,
        reason: String,
    },

    /// The backend cannot express this operation
    #[error("{operation} is not supported by this backend")]
    Unsupported { operation: &'static str },

    /// Attaching a record to a live registration failed
    #[error("failed to attach record to registration: {reason}")]
    RecordAttachFailed { reason: String },

    /// Attribute record decoding failed
    #[error("malformed attribute record: {0}")]
    Txt(#[from] TxtError),
}

/// Errors from decoding an attribute (TXT) record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxtError {
    /// A length prefix claimed more bytes than the record holds
    #[error(
        "entry length {declared} at offset {offset} exceeds the {remaining} remaining bytes"
    )]
    Truncated {
        offset: usize,
        declared: usize,
        remaining: usize,
    },
}

/// Abnormal termination of an in-flight operation, delivered via the
/// operation's failure event rather than a synchronous error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Error code reported by the underlying subsystem
    pub code: i32,
    /// Human-readable failure detail
    pub message: String,
}

impl OperationFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error {}: {}", self.code, self.message)
    }
}
