//! Tasks, analysis results and the messages streamed to browsers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use token_monitor::TokenRecord;

/// A queued request to analyze one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    /// `<mint>_<uuid>`
    pub task_id: String,
    #[serde(rename = "token_data")]
    pub token: TokenRecord,
    pub created_at: DateTime<Utc>,
}

impl AnalysisTask {
    pub fn new(token: TokenRecord) -> Self {
        Self {
            task_id: format!("{}_{}", token.mint, Uuid::new_v4()),
            token,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

/// A search hit shown alongside an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub relevance_score: f64,
}

/// A social media post mentioning the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
}

/// Progress and findings of one token's analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub token_mint: String,
    pub token_symbol: String,
    pub token_name: String,
    pub status: AnalysisStatus,
    /// 0 to 100
    pub progress: f64,
    #[serde(default)]
    pub narrative_analysis: String,
    #[serde(default)]
    pub risk_assessment: String,
    #[serde(default)]
    pub market_analysis: String,
    #[serde(default)]
    pub web_search_results: Vec<WebSearchResult>,
    #[serde(default)]
    pub tweet_result: Vec<SocialPost>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub investment_recommendation: Option<String>,
    pub analysis_started_at: DateTime<Utc>,
    #[serde(default)]
    pub analysis_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AnalysisResult {
    /// A fresh `Pending` result for `token`
    pub fn pending(token: &TokenRecord) -> Self {
        Self {
            token_mint: token.mint.clone(),
            token_symbol: token.symbol.clone(),
            token_name: token.name.clone(),
            status: AnalysisStatus::Pending,
            progress: 0.0,
            narrative_analysis: String::new(),
            risk_assessment: String::new(),
            market_analysis: String::new(),
            web_search_results: Vec::new(),
            tweet_result: Vec::new(),
            ai_summary: None,
            investment_recommendation: None,
            analysis_started_at: Utc::now(),
            analysis_completed_at: None,
            error_message: None,
        }
    }
}

/// Kinds of message pushed to browser clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    NewToken,
    AnalysisUpdate,
    AnalysisComplete,
    AnalysisCompleteFull,
    ConnectionStatus,
    Heartbeat,
    HeartbeatResponse,
}

/// Which completion message to publish for a finished analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionKind {
    #[default]
    Simple,
    Full,
}

impl From<CompletionKind> for MessageKind {
    fn from(kind: CompletionKind) -> Self {
        match kind {
            CompletionKind::Simple => MessageKind::AnalysisComplete,
            CompletionKind::Full => MessageKind::AnalysisCompleteFull,
        }
    }
}

/// `{"type": ..., "data": ..., "timestamp": ...}` envelope sent to browsers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamMessage {
    pub fn new(kind: MessageKind, data: &impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_value(data)?,
            timestamp: Utc::now(),
        })
    }

    pub fn new_token(token: &TokenRecord) -> serde_json::Result<Self> {
        Self::new(MessageKind::NewToken, token)
    }

    pub fn connection_status(status: &str) -> Self {
        Self::with_value(
            MessageKind::ConnectionStatus,
            serde_json::json!({ "status": status }),
        )
    }

    pub fn heartbeat() -> Self {
        Self::with_value(MessageKind::Heartbeat, serde_json::json!({}))
    }

    pub fn heartbeat_response() -> Self {
        Self::with_value(
            MessageKind::HeartbeatResponse,
            serde_json::json!({ "status": "alive" }),
        )
    }

    fn with_value(kind: MessageKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
