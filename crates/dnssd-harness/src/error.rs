//! Error types for the exercise harness

use dnssd_client::ClientError;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that abort session bootstrap
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid harness configuration
    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),

    /// A client call failed to start
    #[error(transparent)]
    Client(#[from] ClientError),
}
