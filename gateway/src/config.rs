//! Configuration for the gateway and the assembled application

use std::net::SocketAddr;
use std::time::Duration;

use analyzer::AnalyzerConfig;
use task_queue::QueueConfig;
use token_monitor::MonitorConfig;

use crate::error::{GatewayError, Result};

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Origin of the local frontend development server
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Configuration for the HTTP and WebSocket server
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the server listens on
    /// Default: 0.0.0.0:8000
    pub bind_address: SocketAddr,

    /// Origins allowed to call the API from a browser
    /// Default: ["http://localhost:3000"]
    pub cors_origins: Vec<String>,

    /// Idle time after which a heartbeat is sent to a WebSocket client
    /// Default: 30 seconds
    pub heartbeat_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(GatewayError::Configuration(
                "heartbeat_interval must be greater than 0".to_string(),
            ));
        }

        for origin in &self.cors_origins {
            validate_origin(origin)?;
        }

        Ok(())
    }

    pub fn with_bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn with_cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// An origin is `scheme://host[:port]` with nothing after the authority.
fn validate_origin(origin: &str) -> Result<()> {
    let invalid = || GatewayError::Configuration(format!("Invalid CORS origin: {origin}"));

    let (scheme, authority) = origin.split_once("://").ok_or_else(invalid)?;
    if !matches!(scheme, "http" | "https") || authority.is_empty() || authority.contains('/') {
        return Err(invalid());
    }
    Ok(())
}

/// Configuration for every component of the application
#[derive(Debug, Clone, Default)]
pub struct ScoutConfig {
    pub monitor: MonitorConfig,
    pub queue: QueueConfig,
    pub analyzer: AnalyzerConfig,
    pub gateway: GatewayConfig,
}

impl ScoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from process environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SOLANA_WS_URL`: streaming RPC endpoint
    /// - `REDIS_URL`: enables the durable queue backend
    /// - `GEMINI_API_KEY`: enables model summaries
    /// - `TWITTER_API_ENDPOINT`: enables social search
    /// - `MAX_CONCURRENT_AI_REQUESTS`: summary concurrency cap
    /// - `TOKEN_SCOUT_BIND`: listen address, e.g. `127.0.0.1:8000`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("SOLANA_WS_URL") {
            config.monitor = config.monitor.with_endpoint(endpoint);
        }
        if let Some(url) = lookup("REDIS_URL") {
            config.queue = config.queue.with_redis_url(url);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            config.analyzer = config.analyzer.with_gemini_api_key(key);
        }
        if let Some(endpoint) = lookup("TWITTER_API_ENDPOINT") {
            config.analyzer = config.analyzer.with_social_search_endpoint(endpoint);
        }
        if let Some(value) = lookup("MAX_CONCURRENT_AI_REQUESTS") {
            let max = value.trim().parse().map_err(|_| {
                GatewayError::Configuration(format!(
                    "MAX_CONCURRENT_AI_REQUESTS must be a positive integer, got {value:?}"
                ))
            })?;
            config.analyzer = config.analyzer.with_max_concurrent_ai_requests(max);
        }
        if let Some(value) = lookup("TOKEN_SCOUT_BIND") {
            let address = value.trim().parse().map_err(|_| {
                GatewayError::Configuration(format!("TOKEN_SCOUT_BIND is not a socket address: {value:?}"))
            })?;
            config.gateway = config.gateway.with_bind_address(address);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate every component configuration
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.queue.validate()?;
        self.analyzer.validate()?;
        self.gateway.validate()
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.cors_origins, vec![DEFAULT_CORS_ORIGIN.to_string()]);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(ScoutConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case("http://localhost:3000", true)]
    #[case("https://scout.example.com", true)]
    #[case("localhost:3000", false)]
    #[case("ftp://localhost", false)]
    #[case("http://", false)]
    #[case("http://localhost:3000/app", false)]
    fn test_origin_validation(#[case] origin: &str, #[case] valid: bool) {
        let config = GatewayConfig::new().with_cors_origins([origin]);
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let config = GatewayConfig::new().with_heartbeat_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(GatewayError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SOLANA_WS_URL", "wss://rpc.example.com"),
            ("GEMINI_API_KEY", "key"),
            ("MAX_CONCURRENT_AI_REQUESTS", "5"),
            ("TOKEN_SCOUT_BIND", "127.0.0.1:9000"),
        ]);
        let config =
            ScoutConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.monitor.endpoint, "wss://rpc.example.com");
        assert_eq!(config.analyzer.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(config.analyzer.max_concurrent_ai_requests, 5);
        assert_eq!(config.gateway.bind_address.port(), 9000);
        assert!(config.queue.redis_url.is_none());
    }

    #[rstest]
    #[case("MAX_CONCURRENT_AI_REQUESTS", "many")]
    #[case("TOKEN_SCOUT_BIND", "localhost")]
    #[case("SOLANA_WS_URL", "https://rpc.example.com")]
    fn test_from_lookup_rejects_bad_values(#[case] name: &str, #[case] value: &str) {
        let result = ScoutConfig::from_lookup(|key| (key == name).then(|| value.to_string()));
        assert!(result.is_err());
    }
}
