//! # Analyzer
//!
//! Consumes analysis tasks from the [`task_queue::MessageQueue`], researches
//! each token and publishes a summary.
//!
//! The pipeline is built from three collaborators so each can be replaced:
//!
//! - [`WebSearch`]: pages about the token ([`LinkDirectorySearch`] by default)
//! - [`SocialSearch`]: posts mentioning the mint ([`HttpSocialSearch`])
//! - [`Summarizer`]: language-model analysis ([`GeminiSummarizer`])

pub mod analyzer;
pub mod config;
pub mod error;
pub mod search;
pub mod summarizer;

pub use analyzer::{Analyzer, AnalyzerStats};
pub use config::{AnalyzerConfig, DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};
pub use error::{AnalyzerError, Result};
pub use search::{HttpSocialSearch, LinkDirectorySearch, NoSocialSearch, SocialSearch, WebSearch};
pub use summarizer::{build_prompt, parse_summary, preview, GeminiSummarizer, Summarizer, Summary};
