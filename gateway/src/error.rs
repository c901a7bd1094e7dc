//! Error types for the gateway

use std::net::SocketAddr;

use thiserror::Error;

use analyzer::AnalyzerError;
use task_queue::QueueError;
use token_monitor::MonitorError;

/// Errors that can occur while assembling or serving the application
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP listener could not be bound
    #[error("Failed to bind {address}: {reason}")]
    Bind { address: SocketAddr, reason: String },

    /// The token monitor could not be created or started
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// The message queue failed
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The analyzer could not be created
    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// A message could not be serialized for browsers
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GatewayError::Bind {
            address: "127.0.0.1:8000".parse().unwrap(),
            reason: "address in use".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to bind 127.0.0.1:8000: address in use");

        let error: GatewayError = MonitorError::NoRuntime.into();
        assert!(error.to_string().starts_with("Monitor error:"));
    }
}
