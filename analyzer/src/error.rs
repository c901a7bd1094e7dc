//! Error types for the analyzer

use thiserror::Error;

use task_queue::QueueError;

/// Errors that can occur while analyzing a token
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP request itself failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote API answered with a non-success status
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A remote API answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Reading tasks or publishing progress failed
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Result type for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;
