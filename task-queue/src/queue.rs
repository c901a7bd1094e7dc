//! Analysis task queue with progress tracking

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use token_monitor::TokenRecord;

use crate::backend::{MemoryBackend, QueueBackend};
use crate::config::QueueConfig;
use crate::error::Result;
use crate::model::{
    AnalysisResult, AnalysisStatus, AnalysisTask, CompletionKind, MessageKind, StreamMessage,
};

/// Queue of analysis tasks plus the stream of analysis results.
///
/// Tasks and results travel through the selected backend. When the durable
/// backend rejects a write, the write goes to an in-memory backend instead,
/// and reads drain that fallback too, so nothing written is lost for the
/// life of the process.
pub struct MessageQueue {
    primary: Arc<dyn QueueBackend>,
    fallback: Option<MemoryBackend>,
    pending: DashMap<String, AnalysisResult>,
}

impl MessageQueue {
    /// Build the queue, preferring Redis when configured and reachable.
    pub async fn initialize(config: QueueConfig) -> Result<Self> {
        config.validate()?;

        let queue = match connect_durable(&config).await {
            Some(backend) => Self::with_backend(backend),
            None => Self::in_memory(),
        };
        info!("Analysis queue using {} backend", queue.backend_name());
        Ok(queue)
    }

    /// A queue backed only by process memory
    pub fn in_memory() -> Self {
        Self {
            primary: Arc::new(MemoryBackend::new()),
            fallback: None,
            pending: DashMap::new(),
        }
    }

    /// A queue on a custom backend; durable backends get a memory fallback.
    pub fn with_backend(backend: Arc<dyn QueueBackend>) -> Self {
        let fallback = backend.is_durable().then(MemoryBackend::new);
        Self {
            primary: backend,
            fallback,
            pending: DashMap::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Enqueue `token` for analysis and start tracking it as `Pending`.
    pub async fn add_analysis_task(&self, token: &TokenRecord) -> Result<AnalysisTask> {
        let task = AnalysisTask::new(token.clone());
        let payload = serde_json::to_string(&task)?;

        self.pending
            .insert(token.mint.clone(), AnalysisResult::pending(token));

        match self.primary.push_task(payload.clone()).await {
            Ok(()) => {}
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    error!("Failed to push task to {}: {}", self.primary.name(), e);
                    fallback.push_task(payload).await?;
                }
                None => return Err(e),
            },
        }

        info!("Queued analysis task {} for {}", task.task_id, token.symbol);
        Ok(task)
    }

    /// Wait up to `timeout` for the next task.
    ///
    /// Undecodable payloads are logged and skipped.
    pub async fn next_task(&self, timeout: Duration) -> Result<Option<AnalysisTask>> {
        if let Some(fallback) = &self.fallback {
            if let Some(payload) = fallback.pop_task(Duration::ZERO).await? {
                return Ok(decode_or_skip(&payload));
            }
        }

        Ok(self
            .primary
            .pop_task(timeout)
            .await?
            .and_then(|payload| decode_or_skip(&payload)))
    }

    /// Record progress for `mint` and publish an `analysis_update`.
    ///
    /// Unknown mints are ignored.
    pub async fn update_progress(
        &self,
        mint: &str,
        progress: f64,
        status: Option<AnalysisStatus>,
    ) -> Result<()> {
        let snapshot = {
            let Some(mut entry) = self.pending.get_mut(mint) else {
                debug!("Ignoring progress for untracked mint {}", mint);
                return Ok(());
            };
            entry.progress = progress.clamp(0.0, 100.0);
            if let Some(status) = status {
                entry.status = status;
            }
            entry.value().clone()
        };

        info!("Analysis progress {} {}%", snapshot.token_symbol, snapshot.progress);
        self.publish(MessageKind::AnalysisUpdate, &snapshot).await
    }

    /// Mark an analysis finished and publish it.
    pub async fn complete_analysis(
        &self,
        mut result: AnalysisResult,
        kind: CompletionKind,
    ) -> Result<()> {
        result.status = AnalysisStatus::Completed;
        result.progress = 100.0;
        result.analysis_completed_at = Some(Utc::now());

        self.pending
            .insert(result.token_mint.clone(), result.clone());

        info!("Analysis complete for {}", result.token_symbol);
        self.publish(kind.into(), &result).await
    }

    /// Mark the analysis of `mint` failed and publish an `analysis_update`.
    pub async fn fail_analysis(&self, mint: &str, message: &str) -> Result<()> {
        let snapshot = {
            let Some(mut entry) = self.pending.get_mut(mint) else {
                return Ok(());
            };
            entry.status = AnalysisStatus::Failed;
            entry.error_message = Some(message.to_string());
            entry.analysis_completed_at = Some(Utc::now());
            entry.value().clone()
        };

        warn!("Analysis failed for {}: {}", snapshot.token_symbol, message);
        self.publish(MessageKind::AnalysisUpdate, &snapshot).await
    }

    /// Wait up to `timeout` for the next published result message.
    pub async fn next_result(&self, timeout: Duration) -> Result<Option<StreamMessage>> {
        if let Some(fallback) = &self.fallback {
            if let Some(payload) = fallback.next_result(Duration::ZERO).await? {
                return Ok(decode_or_skip(&payload));
            }
        }

        Ok(self
            .primary
            .next_result(timeout)
            .await?
            .and_then(|payload| decode_or_skip(&payload)))
    }

    /// Tasks waiting to be consumed
    pub async fn queue_len(&self) -> Result<usize> {
        let mut length = self.primary.len().await?;
        if let Some(fallback) = &self.fallback {
            length += fallback.len().await?;
        }
        Ok(length)
    }

    pub fn pending_analyses(&self) -> HashMap<String, AnalysisResult> {
        self.pending
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn analysis(&self, mint: &str) -> Option<AnalysisResult> {
        self.pending.get(mint).map(|entry| entry.value().clone())
    }

    /// Forget analyses that finished more than `max_age` ago.
    ///
    /// Returns the number of entries removed.
    pub fn clear_completed(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let before = self.pending.len();

        self.pending.retain(|_, analysis| match analysis.analysis_completed_at {
            Some(finished) => (now - finished).to_std().unwrap_or(Duration::ZERO) <= max_age,
            None => true,
        });

        let removed = before.saturating_sub(self.pending.len());
        if removed > 0 {
            info!("Cleared {} finished analyses", removed);
        }
        removed
    }

    async fn publish(&self, kind: MessageKind, result: &AnalysisResult) -> Result<()> {
        let payload = StreamMessage::new(kind, result)?.to_json()?;

        match self.primary.publish_result(payload.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    error!("Failed to publish result to {}: {}", self.primary.name(), e);
                    fallback.publish_result(payload).await
                }
                None => Err(e),
            },
        }
    }
}

fn decode_or_skip<T: DeserializeOwned>(payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping undecodable queue payload: {}", e);
            None
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_durable(config: &QueueConfig) -> Option<Arc<dyn QueueBackend>> {
    let url = config.redis_url.as_deref()?;
    match crate::redis_backend::RedisBackend::connect(url, &config.task_key, &config.result_channel)
        .await
    {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            warn!("Redis unavailable, falling back to in-memory queue: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_durable(config: &QueueConfig) -> Option<Arc<dyn QueueBackend>> {
    if let Some(url) = &config.redis_url {
        warn!(
            "Built without the redis feature, ignoring {} and using the in-memory queue",
            url
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use token_monitor::{Address, CreationEvent};

    fn token(symbol: &str, byte: u8) -> TokenRecord {
        let event = CreationEvent {
            name: format!("{symbol} token"),
            symbol: symbol.to_string(),
            uri: String::new(),
            mint: Address::new([byte; 32]),
            bonding_curve: Address::new([1; 32]),
            user: Address::new([2; 32]),
            creator: Address::new([2; 32]),
            timestamp: 0,
            virtual_token_reserves: 0,
            virtual_sol_reserves: 0,
            real_token_reserves: 0,
            token_total_supply: 0,
        };
        TokenRecord::from_event(event, Utc::now())
    }

    const WAIT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_task_round_trip_through_memory() {
        let queue = MessageQueue::in_memory();
        let queued = queue.add_analysis_task(&token("ONE", 1)).await.unwrap();
        assert_eq!(queue.queue_len().await.unwrap(), 1);

        let popped = queue.next_task(WAIT).await.unwrap().unwrap();
        assert_eq!(popped.task_id, queued.task_id);
        assert_eq!(popped.token.symbol, "ONE");
        assert_eq!(queue.queue_len().await.unwrap(), 0);
        assert!(queue.next_task(WAIT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_published_in_memory_mode() {
        let queue = MessageQueue::in_memory();
        let record = token("TWO", 2);
        queue.add_analysis_task(&record).await.unwrap();

        queue
            .update_progress(&record.mint, 30.0, Some(AnalysisStatus::Analyzing))
            .await
            .unwrap();

        let message = queue.next_result(WAIT).await.unwrap().unwrap();
        assert_eq!(message.kind, MessageKind::AnalysisUpdate);
        assert_eq!(message.data["progress"], 30.0);
        assert_eq!(message.data["status"], "ANALYZING");
    }

    #[tokio::test]
    async fn test_progress_for_unknown_mint_is_ignored() {
        let queue = MessageQueue::in_memory();
        queue.update_progress("nope", 50.0, None).await.unwrap();
        assert!(queue.next_result(WAIT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_publishes_requested_kind() {
        let queue = MessageQueue::in_memory();
        let record = token("THREE", 3);
        queue.add_analysis_task(&record).await.unwrap();

        let mut result = AnalysisResult::pending(&record);
        result.ai_summary = Some("meme coin".to_string());
        queue
            .complete_analysis(result, CompletionKind::Full)
            .await
            .unwrap();

        let message = queue.next_result(WAIT).await.unwrap().unwrap();
        assert_eq!(message.kind, MessageKind::AnalysisCompleteFull);
        assert_eq!(message.data["progress"], 100.0);

        let stored = queue.analysis(&record.mint).unwrap();
        assert_eq!(stored.status, AnalysisStatus::Completed);
        assert!(stored.analysis_completed_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_analysis_records_error() {
        let queue = MessageQueue::in_memory();
        let record = token("FOUR", 4);
        queue.add_analysis_task(&record).await.unwrap();
        queue.fail_analysis(&record.mint, "boom").await.unwrap();

        let stored = queue.analysis(&record.mint).unwrap();
        assert_eq!(stored.status, AnalysisStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("boom"));

        let message = queue.next_result(WAIT).await.unwrap().unwrap();
        assert_eq!(message.kind, MessageKind::AnalysisUpdate);
        assert_eq!(message.data["error_message"], "boom");
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_unfinished() {
        let queue = MessageQueue::in_memory();
        let done = token("DONE", 5);
        let busy = token("BUSY", 6);
        queue.add_analysis_task(&done).await.unwrap();
        queue.add_analysis_task(&busy).await.unwrap();
        queue
            .complete_analysis(AnalysisResult::pending(&done), CompletionKind::Simple)
            .await
            .unwrap();

        assert_eq!(queue.clear_completed(Duration::from_secs(3600)), 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(queue.clear_completed(Duration::from_millis(10)), 1);

        let remaining = queue.pending_analyses();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key(&busy.mint));
    }

    #[tokio::test]
    async fn test_initialize_without_redis_uses_memory() {
        let queue = MessageQueue::initialize(QueueConfig::default()).await.unwrap();
        assert_eq!(queue.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_config() {
        let config = QueueConfig::default().with_redis_url("tcp://localhost");
        assert!(MessageQueue::initialize(config).await.is_err());
    }
}
