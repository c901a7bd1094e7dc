//! Web and social search collaborators

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use task_queue::{SocialPost, WebSearchResult};
use token_monitor::TokenRecord;

use crate::error::{AnalyzerError, Result};

/// Finds web pages about a token
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, token: &TokenRecord) -> Result<Vec<WebSearchResult>>;
}

/// Finds social media posts mentioning a token
#[async_trait]
pub trait SocialSearch: Send + Sync {
    async fn search(&self, token: &TokenRecord) -> Result<Vec<SocialPost>>;
}

/// Links to the well-known explorer, market and community pages for a token.
///
/// Needs no network access, so it always produces results.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkDirectorySearch;

impl LinkDirectorySearch {
    pub fn links(token: &TokenRecord) -> Vec<WebSearchResult> {
        let symbol = token.symbol.to_lowercase();
        vec![
            WebSearchResult {
                title: format!("{} ({}) on pump.fun", token.name, token.symbol),
                url: format!("https://pump.fun/coin/{}", token.mint),
                snippet: format!(
                    "{} launched on pump.fun with symbol {} and total supply {}.",
                    token.name, token.symbol, token.token_total_supply
                ),
                relevance_score: 95.0,
            },
            WebSearchResult {
                title: format!("{} price and market data - CoinMarketCap", token.symbol),
                url: format!("https://coinmarketcap.com/currencies/{symbol}"),
                snippet: format!(
                    "Latest price, market cap and trading data for {} ({}).",
                    token.name, token.symbol
                ),
                relevance_score: 85.0,
            },
            WebSearchResult {
                title: format!("{} technical data - CoinGecko", token.symbol),
                url: format!("https://coingecko.com/en/coins/{symbol}"),
                snippet: format!(
                    "Price history and market indicators for {}. Virtual token reserves: {}.",
                    token.name, token.virtual_token_reserves
                ),
                relevance_score: 80.0,
            },
            WebSearchResult {
                title: format!("{} community discussion - Reddit", token.name),
                url: format!(
                    "https://reddit.com/r/cryptocurrency/search?q={}",
                    token.symbol
                ),
                snippet: format!(
                    "What the community is saying about {} ({}).",
                    token.name, token.symbol
                ),
                relevance_score: 75.0,
            },
            WebSearchResult {
                title: format!("Trade {} ({}) - DexScreener", token.name, token.symbol),
                url: format!("https://dexscreener.com/solana/{}", token.mint),
                snippet: format!(
                    "DEX pairs for {}. Virtual SOL reserves: {}.",
                    token.name, token.virtual_sol_reserves
                ),
                relevance_score: 70.0,
            },
        ]
    }
}

#[async_trait]
impl WebSearch for LinkDirectorySearch {
    async fn search(&self, token: &TokenRecord) -> Result<Vec<WebSearchResult>> {
        Ok(Self::links(token))
    }
}

#[derive(Debug, Deserialize)]
struct SocialSearchResponse {
    #[serde(default)]
    data: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    #[serde(default)]
    content: String,
    #[serde(default)]
    t_url: String,
    #[serde(default)]
    favorite_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
}

impl From<RawPost> for SocialPost {
    fn from(raw: RawPost) -> Self {
        SocialPost {
            content: raw.content,
            url: raw.t_url,
            favorite_count: raw.favorite_count,
            retweet_count: raw.retweet_count,
            reply_count: raw.reply_count,
        }
    }
}

/// Social search over an HTTP endpoint that takes `{"keyword": <mint>}`
/// and answers `{"data": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpSocialSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSocialSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SocialSearch for HttpSocialSearch {
    async fn search(&self, token: &TokenRecord) -> Result<Vec<SocialPost>> {
        debug!("Searching posts for {} ({})", token.symbol, token.mint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "keyword": token.mint }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SocialSearchResponse = response.json().await?;
        info!("Social search found {} posts for {}", parsed.data.len(), token.symbol);
        Ok(parsed.data.into_iter().map(SocialPost::from).collect())
    }
}

/// Used when no social search endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSocialSearch;

#[async_trait]
impl SocialSearch for NoSocialSearch {
    async fn search(&self, _token: &TokenRecord) -> Result<Vec<SocialPost>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use token_monitor::{Address, CreationEvent};

    fn token() -> TokenRecord {
        TokenRecord::from_event(
            CreationEvent {
                name: "Moon Dog".to_string(),
                symbol: "MDOG".to_string(),
                uri: String::new(),
                mint: Address::new([21; 32]),
                bonding_curve: Address::new([22; 32]),
                user: Address::new([23; 32]),
                creator: Address::new([23; 32]),
                timestamp: 0,
                virtual_token_reserves: 1_000_000,
                virtual_sol_reserves: 1_000_000_000,
                real_token_reserves: 0,
                token_total_supply: 0,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_link_directory_is_deterministic() {
        let token = token();
        let first = LinkDirectorySearch.search(&token).await.unwrap();
        let second = LinkDirectorySearch.search(&token).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].url, format!("https://pump.fun/coin/{}", token.mint));
        assert_eq!(first[4].url, format!("https://dexscreener.com/solana/{}", token.mint));
        assert!(first[1].url.ends_with("/mdog"));
    }

    #[tokio::test]
    async fn test_http_social_search_posts_mint() {
        let token = token();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(mockito::Matcher::Json(json!({ "keyword": token.mint })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [{
                        "content": "MDOG to the moon",
                        "t_url": "https://x.com/a/status/1",
                        "favorite_count": 12,
                        "retweet_count": 3,
                        "reply_count": 1
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let search =
            HttpSocialSearch::new(format!("{}/search", server.url()), Duration::from_secs(5))
                .unwrap();
        let posts = SocialSearch::search(&search, &token).await.unwrap();

        mock.assert_async().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://x.com/a/status/1");
        assert_eq!(posts[0].favorite_count, 12);
    }

    #[tokio::test]
    async fn test_http_social_search_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let search =
            HttpSocialSearch::new(format!("{}/search", server.url()), Duration::from_secs(5))
                .unwrap();
        let error = SocialSearch::search(&search, &token()).await.unwrap_err();
        assert!(matches!(error, AnalyzerError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_no_social_search_is_empty() {
        assert!(SocialSearch::search(&NoSocialSearch, &token())
            .await
            .unwrap()
            .is_empty());
    }
}
