//! Error types for skybridge.

use thiserror::Error;

/// Errors that can occur while bridging the container host and the registry.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// IO error (socket, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container host transport error
    #[error("container host error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Registry transport error
    #[error("registry error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry rejected a request with a non-success status
    #[error("registry returned {status}: {body}")]
    Status {
        /// HTTP status the registry answered with.
        status: reqwest::StatusCode,
        /// Response body, kept for the log line.
        body: String,
    },

    /// An add targeted a key the registry already holds; callers reset the
    /// TTL instead of failing
    #[error("registry already holds a record for {0}")]
    ConflictingUuid(String),

    /// The container's image carries no tag; registration is skipped
    #[error("image {0} is not tagged")]
    ImageNotTagged(String),

    /// The policy script failed to load or evaluate
    #[error("policy error: {0}")]
    Policy(String),

    /// The policy produced a record that fails validation
    #[error("invalid service record: {0}")]
    InvalidRecord(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether this error must abort the daemon. A policy that fails or
    /// yields malformed records affects every registration, so those errors
    /// are not survivable; everything else is transient.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Policy(_) | Self::InvalidRecord(_))
    }
}
