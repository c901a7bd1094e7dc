//! Error types for the token monitor

use thiserror::Error;

use creation_decoder::Address;

/// Errors returned by the monitor's public API
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `start` was called outside of a tokio runtime
    #[error("No tokio runtime available to run token callbacks")]
    NoRuntime,

    /// The subscription thread could not be created
    #[error("Failed to spawn subscription thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

/// Errors raised by a streaming transport.
///
/// These never leave the subscription thread; they are logged and turned
/// into a reconnect decision.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Opening the connection or completing the handshake failed
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Writing a message failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Reading from the connection failed
    #[error("Receive failed: {0}")]
    Receive(String),

    /// Socket options could not be applied
    #[error("Socket configuration failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from handing an event to the application runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The runtime side of the hand-off is gone
    #[error("Application runtime unavailable, dropping event for mint {0}")]
    RuntimeUnavailable(Address),
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
