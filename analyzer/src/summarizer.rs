//! Language-model summaries of a token and its search results

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use task_queue::{SocialPost, WebSearchResult};
use token_monitor::TokenRecord;

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, Result};

/// Search results that go into the prompt
const PROMPT_SEARCH_RESULTS: usize = 5;

/// The five analysis fields produced for every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub narrative_analysis: String,
    pub risk_assessment: String,
    pub market_analysis: String,
    pub ai_summary: String,
    pub investment_recommendation: String,
}

impl Summary {
    /// Stand-in used when summarizing fails
    pub fn placeholder() -> Self {
        Self {
            narrative_analysis: "Narrative analysis unavailable".to_string(),
            risk_assessment: "Risk assessment unavailable".to_string(),
            market_analysis: "Market analysis unavailable".to_string(),
            ai_summary: "AI summary unavailable".to_string(),
            investment_recommendation: "Investment recommendation unavailable".to_string(),
        }
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        token: &TokenRecord,
        web: &[WebSearchResult],
        posts: &[SocialPost],
    ) -> Result<Summary>;
}

/// Build the analysis prompt for `token`.
pub fn build_prompt(token: &TokenRecord, web: &[WebSearchResult], posts: &[SocialPost]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Analyze the narrative behind this newly launched crypto token:");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "- Name: {}", token.name);
    let _ = writeln!(prompt, "- Symbol: {}", token.symbol);
    let _ = writeln!(prompt, "- Total supply: {}", token.token_total_supply);
    let _ = writeln!(prompt, "- Virtual token reserves: {}", token.virtual_token_reserves);
    let _ = writeln!(prompt, "- Virtual SOL reserves: {}", token.virtual_sol_reserves);
    let _ = writeln!(prompt, "- Real token reserves: {}", token.real_token_reserves);

    let _ = writeln!(prompt, "\nWeb search results:");
    for result in web.iter().take(PROMPT_SEARCH_RESULTS) {
        let _ = writeln!(
            prompt,
            "Title: {}\nSnippet: {}\nLink: {}",
            result.title, result.snippet, result.url
        );
    }

    let _ = writeln!(prompt, "\nSocial posts:");
    for post in posts {
        let _ = writeln!(
            prompt,
            "Post: {}\nLink: {}\nlikes: {} reposts: {} replies: {}",
            post.content, post.url, post.favorite_count, post.retweet_count, post.reply_count
        );
    }

    prompt.push_str(
        "\nPlease analyze:\n\
         1. The project's core narrative and concept\n\
         2. A risk score from 0 to 100 (100 is the highest risk)\n\
         3. A price outlook\n\
         4. A concise but complete summary\n\
         5. An investment recommendation\n\
         Reply with JSON only:\n\
         {\n\
           \"narrative_analysis\": \"...\",\n\
           \"risk_assessment\": \"...\",\n\
           \"market_analysis\": \"...\",\n\
           \"ai_summary\": \"...\",\n\
           \"investment_recommendation\": \"...\"\n\
         }\n",
    );
    prompt
}

/// Parse a model reply, tolerating a surrounding Markdown code fence.
pub fn parse_summary(reply: &str) -> Result<Summary> {
    let trimmed = reply.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(fenced) => {
            let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
            fenced.strip_suffix("```").unwrap_or(fenced).trim()
        }
        None => trimmed,
    };

    serde_json::from_str(body)
        .map_err(|e| AnalyzerError::InvalidResponse(format!("summary is not valid JSON: {e}")))
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Summarizer backed by the Gemini `generateContent` REST API
#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GeminiSummarizer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        if config.gemini_api_key.is_none() {
            warn!("No Gemini API key configured, summaries will be placeholders");
        }

        Ok(Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                config.gemini_endpoint.trim_end_matches('/'),
                config.gemini_model
            ),
            api_key: config.gemini_api_key.clone(),
        })
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
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

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AnalyzerError::InvalidResponse(
                "reply contained no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        token: &TokenRecord,
        web: &[WebSearchResult],
        posts: &[SocialPost],
    ) -> Result<Summary> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AnalyzerError::Configuration("Gemini API key not configured".to_string())
        })?;

        let prompt = build_prompt(token, web, posts);
        debug!("Requesting summary for {} ({} chars)", token.symbol, prompt.len());
        let reply = self.generate(api_key, &prompt).await?;
        parse_summary(&reply)
    }
}

/// Shorten post content to `max_chars` characters, marking the cut with `...`.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use token_monitor::{Address, CreationEvent};

    fn token() -> TokenRecord {
        TokenRecord::from_event(
            CreationEvent {
                name: "Sun Cat".to_string(),
                symbol: "SCAT".to_string(),
                uri: String::new(),
                mint: Address::new([31; 32]),
                bonding_curve: Address::new([32; 32]),
                user: Address::new([33; 32]),
                creator: Address::new([33; 32]),
                timestamp: 0,
                virtual_token_reserves: 0,
                virtual_sol_reserves: 0,
                real_token_reserves: 0,
                token_total_supply: 0,
            },
            Utc::now(),
        )
    }

    const REPLY: &str = r#"{
        "narrative_analysis": "cat meme",
        "risk_assessment": "85",
        "market_analysis": "thin liquidity",
        "ai_summary": "another cat coin",
        "investment_recommendation": "avoid"
    }"#;

    #[rstest]
    #[case::plain(REPLY.to_string())]
    #[case::json_fence(format!("```json\n{REPLY}\n```"))]
    #[case::bare_fence(format!("```\n{REPLY}\n```"))]
    #[case::padded(format!("\n  ```json{REPLY}```  \n"))]
    fn test_parse_summary_variants(#[case] reply: String) {
        let summary = parse_summary(&reply).unwrap();
        assert_eq!(summary.narrative_analysis, "cat meme");
        assert_eq!(summary.investment_recommendation, "avoid");
    }

    #[test]
    fn test_parse_summary_rejects_prose() {
        let error = parse_summary("I cannot analyze this token.").unwrap_err();
        assert!(matches!(error, AnalyzerError::InvalidResponse(_)));
    }

    #[rstest]
    #[case("short", 100, "short")]
    #[case("abcdef", 3, "abc...")]
    #[case("abc", 3, "abc")]
    #[case("ééééé", 2, "éé...")]
    fn test_preview(#[case] content: &str, #[case] max: usize, #[case] expected: &str) {
        assert_eq!(preview(content, max), expected);
    }

    #[test]
    fn test_prompt_mentions_token_and_sources() {
        let web = vec![WebSearchResult {
            title: "SCAT on pump.fun".to_string(),
            url: "https://pump.fun/coin/x".to_string(),
            snippet: "launched".to_string(),
            relevance_score: 95.0,
        }];
        let posts = vec![SocialPost {
            content: "scat is live".to_string(),
            url: "https://x.com/p/1".to_string(),
            favorite_count: 4,
            retweet_count: 0,
            reply_count: 0,
        }];

        let prompt = build_prompt(&token(), &web, &posts);
        assert!(prompt.contains("Symbol: SCAT"));
        assert!(prompt.contains("https://pump.fun/coin/x"));
        assert!(prompt.contains("scat is live"));
        assert!(prompt.contains("\"investment_recommendation\""));
    }

    #[tokio::test]
    async fn test_gemini_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.0-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": format!("```json\n{REPLY}\n```") }] }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let config = AnalyzerConfig::new()
            .with_gemini_endpoint(server.url())
            .with_gemini_api_key("test-key");
        let summarizer = GeminiSummarizer::new(&config).unwrap();

        let summary = summarizer.summarize(&token(), &[], &[]).await.unwrap();
        mock.assert_async().await;
        assert_eq!(summary.ai_summary, "another cat coin");
    }

    #[tokio::test]
    async fn test_gemini_without_key_fails_fast() {
        let summarizer = GeminiSummarizer::new(&AnalyzerConfig::default()).unwrap();
        let error = summarizer.summarize(&token(), &[], &[]).await.unwrap_err();
        assert!(matches!(error, AnalyzerError::Configuration(_)));
    }
}
