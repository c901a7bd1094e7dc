//! Error types for the task queue

use thiserror::Error;

/// Errors that can occur while queueing tasks or publishing results
#[derive(Error, Debug)]
pub enum QueueError {
    /// Invalid queue configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A task or message could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend rejected an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend's channel has been closed
    #[error("Queue closed")]
    Closed,

    /// Redis command or connection failure
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;
