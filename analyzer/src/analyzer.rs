//! Analysis task consumer

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use task_queue::{
    AnalysisResult, AnalysisStatus, AnalysisTask, CompletionKind, MessageQueue, SocialPost,
};
use token_monitor::TokenRecord;

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::search::{HttpSocialSearch, LinkDirectorySearch, NoSocialSearch, SocialSearch, WebSearch};
use crate::summarizer::{preview, GeminiSummarizer, Summarizer, Summary};

/// Counters for summarizer requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyzerStats {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub failed_requests: u64,
    pub active_requests: usize,
    pub max_concurrent_requests: usize,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
}

/// Consumes analysis tasks and runs the research pipeline for each.
///
/// Each task goes through web search, social search and a summary, with
/// progress published to the queue after every step. Summaries are capped at
/// `max_concurrent_ai_requests` in flight across all tasks.
pub struct Analyzer {
    queue: Arc<MessageQueue>,
    config: AnalyzerConfig,
    web: Arc<dyn WebSearch>,
    social: Arc<dyn SocialSearch>,
    summarizer: Arc<dyn Summarizer>,
    ai_permits: Semaphore,
    counters: Counters,
    running: AtomicBool,
}

impl Analyzer {
    /// Create an analyzer with the default collaborators for `config`.
    pub fn new(queue: Arc<MessageQueue>, config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let social: Arc<dyn SocialSearch> = match &config.social_search_endpoint {
            Some(endpoint) => Arc::new(HttpSocialSearch::new(endpoint, config.request_timeout)?),
            None => {
                info!("No social search endpoint configured, skipping social search");
                Arc::new(NoSocialSearch)
            }
        };
        let summarizer = Arc::new(GeminiSummarizer::new(&config)?);

        Self::with_collaborators(queue, config, Arc::new(LinkDirectorySearch), social, summarizer)
    }

    /// Create an analyzer with custom collaborators.
    pub fn with_collaborators(
        queue: Arc<MessageQueue>,
        config: AnalyzerConfig,
        web: Arc<dyn WebSearch>,
        social: Arc<dyn SocialSearch>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Analyzer initialized, max concurrent AI requests: {}",
            config.max_concurrent_ai_requests
        );

        Ok(Self {
            ai_permits: Semaphore::new(config.max_concurrent_ai_requests),
            queue,
            config,
            web,
            social,
            summarizer,
            counters: Counters::default(),
            running: AtomicBool::new(false),
        })
    }

    /// Spawn the consumer loop on the current runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let analyzer = Arc::clone(self);
        tokio::spawn(async move { analyzer.consume().await })
    }

    /// Ask the consumer loop to exit after its current poll.
    ///
    /// Pipelines already in flight run to completion.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Analyzer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> AnalyzerStats {
        AnalyzerStats {
            total_requests: self.counters.total.load(Ordering::SeqCst),
            completed_requests: self.counters.completed.load(Ordering::SeqCst),
            failed_requests: self.counters.failed.load(Ordering::SeqCst),
            active_requests: self.counters.active.load(Ordering::SeqCst),
            max_concurrent_requests: self.config.max_concurrent_ai_requests,
        }
    }

    async fn consume(self: Arc<Self>) {
        info!("Analysis consumer started");

        while self.is_running() {
            match self.queue.next_task(self.config.poll_timeout).await {
                Ok(Some(task)) => {
                    let analyzer = Arc::clone(&self);
                    tokio::spawn(async move { analyzer.process(task).await });
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to fetch analysis task: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Analysis consumer finished");
    }

    /// Run the full pipeline for one task, marking it failed on error.
    pub async fn process(&self, task: AnalysisTask) {
        let token = &task.token;
        info!("Analyzing {} ({})", token.symbol, task.task_id);

        if let Err(e) = self.analyze(token).await {
            error!("Analysis of {} failed: {}", token.symbol, e);
            if let Err(e) = self.queue.fail_analysis(&token.mint, &e.to_string()).await {
                error!("Failed to record analysis failure for {}: {}", token.symbol, e);
            }
        }
    }

    async fn analyze(&self, token: &TokenRecord) -> Result<()> {
        let mint = token.mint.as_str();
        self.queue
            .update_progress(mint, 10.0, Some(AnalysisStatus::Analyzing))
            .await?;

        let mut web = self.web.search(token).await.unwrap_or_else(|e| {
            warn!("Web search failed for {}: {}", token.symbol, e);
            Vec::new()
        });
        web.truncate(self.config.max_search_results);
        self.queue.update_progress(mint, 30.0, None).await?;

        let posts = self.social.search(token).await.unwrap_or_else(|e| {
            warn!("Social search failed for {}: {}", token.symbol, e);
            Vec::new()
        });
        self.queue.update_progress(mint, 50.0, None).await?;

        let summary = self.summarize(token, &web, &posts).await;

        let mut result = self
            .queue
            .analysis(mint)
            .unwrap_or_else(|| AnalysisResult::pending(token));
        result.narrative_analysis = summary.narrative_analysis;
        result.risk_assessment = summary.risk_assessment;
        result.market_analysis = summary.market_analysis;
        result.ai_summary = Some(summary.ai_summary);
        result.investment_recommendation = Some(summary.investment_recommendation);
        result.web_search_results = web;
        result.tweet_result = posts
            .into_iter()
            .map(|post| SocialPost {
                content: preview(&post.content, self.config.post_preview_chars),
                ..post
            })
            .collect();

        self.queue
            .complete_analysis(result, CompletionKind::Simple)
            .await?;
        Ok(())
    }

    async fn summarize(
        &self,
        token: &TokenRecord,
        web: &[task_queue::WebSearchResult],
        posts: &[SocialPost],
    ) -> Summary {
        let Ok(_permit) = self.ai_permits.acquire().await else {
            return Summary::placeholder();
        };

        self.counters.total.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Starting AI request for {} (active {}/{})",
            token.symbol, active, self.config.max_concurrent_ai_requests
        );

        let summary = match self.summarizer.summarize(token, web, posts).await {
            Ok(summary) => {
                self.counters.completed.fetch_add(1, Ordering::SeqCst);
                summary
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!("Summary for {} failed, using placeholder: {}", token.symbol, e);
                Summary::placeholder()
            }
        };

        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        summary
    }
}
