//! Configuration types for the token monitor
//!
//! This module defines the settings that control where the monitor connects,
//! what it subscribes to and how it recovers from dropped connections.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use creation_decoder::Address;

use crate::error::{MonitorError, Result};

/// Public mainnet RPC WebSocket endpoint
pub const DEFAULT_ENDPOINT: &str = "wss://api.mainnet-beta.solana.com";

/// Bonding-curve launch program whose logs carry creation events
pub const DEFAULT_PROGRAM_ADDRESS: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Consistency level requested for the subscribed log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Fastest, may be rolled back
    #[default]
    Processed,
    /// Voted on by a supermajority
    Confirmed,
    /// Rooted, will not be rolled back
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the TokenMonitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// WebSocket endpoint of the log-subscription service
    /// Default: public mainnet endpoint
    pub endpoint: String,

    /// Program whose logs are subscribed to
    /// Default: the bonding-curve launch program
    pub program_address: Address,

    /// Commitment level sent with the subscription
    /// Default: processed
    pub commitment: Commitment,

    /// Consecutive failed connections tolerated before giving up
    /// Default: 10
    pub max_reconnect_attempts: u32,

    /// Wait between a dropped connection and the next attempt
    /// Default: 5 seconds
    pub reconnect_delay: Duration,

    /// Socket timeout; bounds how long `stop()` takes to be noticed and how
    /// long the connect and handshake may stall
    /// Default: 1 second
    pub read_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            program_address: DEFAULT_PROGRAM_ADDRESS
                .parse()
                .unwrap_or_default(),
            commitment: Commitment::Processed,
            max_reconnect_attempts: 10,
            reconnect_delay: Duration::from_secs(5),
            read_timeout: Duration::from_secs(1),
        }
    }
}

impl MonitorConfig {
    /// Create a new MonitorConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint).map_err(|e| {
            MonitorError::Configuration(format!("Invalid endpoint {}: {e}", self.endpoint))
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(MonitorError::Configuration(format!(
                "Endpoint must use ws or wss, got {}",
                url.scheme()
            )));
        }

        if self.read_timeout.is_zero() {
            return Err(MonitorError::Configuration(
                "Read timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_program_address(mut self, address: Address) -> Self {
        self.program_address = address;
        self
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_reconnect(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_delay = delay;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.program_address.to_string(), DEFAULT_PROGRAM_ADDRESS);
        assert_eq!(config.commitment, Commitment::Processed);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let http = MonitorConfig::new().with_endpoint("https://api.mainnet-beta.solana.com");
        assert!(http.validate().is_err());

        let garbage = MonitorConfig::new().with_endpoint("not a url");
        assert!(garbage.validate().is_err());

        let zero_timeout = MonitorConfig::new().with_read_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let local = MonitorConfig::new().with_endpoint("ws://127.0.0.1:8900");
        assert!(local.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MonitorConfig::new()
            .with_endpoint("wss://rpc.example.com/?api-key=abc")
            .with_commitment(Commitment::Confirmed)
            .with_reconnect(3, Duration::from_millis(250))
            .with_read_timeout(Duration::from_millis(100));

        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_commitment_serde() {
        assert_eq!(
            serde_json::to_string(&Commitment::Finalized).unwrap(),
            "\"finalized\""
        );
        assert_eq!(Commitment::Confirmed.to_string(), "confirmed");
    }
}
