//! Configuration for the analysis consumer

use std::time::Duration;

use crate::error::{AnalyzerError, Result};

/// Gemini REST API base URL
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model used for summaries
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the Analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Gemini API key; without one every summary is a placeholder
    /// Default: None
    pub gemini_api_key: Option<String>,

    /// Gemini REST API base URL
    pub gemini_endpoint: String,

    /// Gemini model name
    /// Default: "gemini-2.0-flash"
    pub gemini_model: String,

    /// Social search endpoint accepting `{"keyword": <mint>}`; `None`
    /// disables social search
    /// Default: None
    pub social_search_endpoint: Option<String>,

    /// Summaries allowed in flight at once
    /// Default: 3
    pub max_concurrent_ai_requests: usize,

    /// Timeout for each outbound HTTP request
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// How long the consumer waits for a task before re-checking its stop flag
    /// Default: 1 second
    pub poll_timeout: Duration,

    /// Maximum web search results kept per analysis
    /// Default: 15
    pub max_search_results: usize,

    /// Characters of each social post kept in the result
    /// Default: 100
    pub post_preview_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            social_search_endpoint: None,
            max_concurrent_ai_requests: 3,
            request_timeout: Duration::from_secs(30),
            poll_timeout: task_queue::DEFAULT_POLL_TIMEOUT,
            max_search_results: 15,
            post_preview_chars: 100,
        }
    }
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_ai_requests == 0 {
            return Err(AnalyzerError::Configuration(
                "max_concurrent_ai_requests must be greater than 0".to_string(),
            ));
        }

        if self.poll_timeout.is_zero() {
            return Err(AnalyzerError::Configuration(
                "poll_timeout must be greater than 0".to_string(),
            ));
        }

        check_url("gemini_endpoint", &self.gemini_endpoint)?;
        if let Some(endpoint) = &self.social_search_endpoint {
            check_url("social_search_endpoint", endpoint)?;
        }

        Ok(())
    }

    pub fn with_gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }

    pub fn with_gemini_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.gemini_endpoint = endpoint.into();
        self
    }

    pub fn with_gemini_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = model.into();
        self
    }

    pub fn with_social_search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.social_search_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_max_concurrent_ai_requests(mut self, max: usize) -> Self {
        self.max_concurrent_ai_requests = max;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

fn check_url(field: &str, value: &str) -> Result<()> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| AnalyzerError::Configuration(format!("Invalid {field} {value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.max_concurrent_ai_requests, 3);
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert!(config.gemini_api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = AnalyzerConfig::new().with_max_concurrent_ai_requests(0);
        assert!(config.validate().is_err());

        let config = AnalyzerConfig::new().with_social_search_endpoint("not a url");
        assert!(config.validate().is_err());

        let config = AnalyzerConfig::new()
            .with_gemini_api_key("key")
            .with_social_search_endpoint("http://127.0.0.1:9000/search");
        assert!(config.validate().is_ok());
    }
}
