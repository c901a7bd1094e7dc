//! Storage backends for tasks and published results
//!
//! Backends move opaque JSON strings; encoding is the queue's job. This keeps
//! the Redis backend's wire format readable by any other consumer of the
//! same keys.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{QueueError, Result};

/// A task list plus a result channel
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Short name for logs and status reports
    fn name(&self) -> &'static str;

    /// Whether the backend survives a process restart
    fn is_durable(&self) -> bool;

    async fn push_task(&self, payload: String) -> Result<()>;

    /// Wait up to `timeout` for the oldest task
    async fn pop_task(&self, timeout: Duration) -> Result<Option<String>>;

    async fn publish_result(&self, payload: String) -> Result<()>;

    /// Wait up to `timeout` for the next published result
    async fn next_result(&self, timeout: Duration) -> Result<Option<String>>;

    /// Number of tasks waiting to be popped
    async fn len(&self) -> Result<usize>;
}

/// Process-local FIFO backend built on unbounded tokio channels
pub struct MemoryBackend {
    task_tx: mpsc::UnboundedSender<String>,
    task_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    result_tx: mpsc::UnboundedSender<String>,
    result_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    queued: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            task_tx,
            task_rx: Mutex::new(task_rx),
            result_tx,
            result_rx: Mutex::new(result_rx),
            queued: AtomicUsize::new(0),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

async fn recv_within(
    receiver: &Mutex<mpsc::UnboundedReceiver<String>>,
    timeout: Duration,
) -> Result<Option<String>> {
    let mut receiver = receiver.lock().await;
    match tokio::time::timeout(timeout, receiver.recv()).await {
        Ok(Some(payload)) => Ok(Some(payload)),
        Ok(None) => Err(QueueError::Closed),
        Err(_) => Ok(None),
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn push_task(&self, payload: String) -> Result<()> {
        self.task_tx.send(payload).map_err(|_| QueueError::Closed)?;
        self.queued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pop_task(&self, timeout: Duration) -> Result<Option<String>> {
        let payload = recv_within(&self.task_rx, timeout).await?;
        if payload.is_some() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(payload)
    }

    async fn publish_result(&self, payload: String) -> Result<()> {
        self.result_tx.send(payload).map_err(|_| QueueError::Closed)
    }

    async fn next_result(&self, timeout: Duration) -> Result<Option<String>> {
        recv_within(&self.result_rx, timeout).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.queued.load(Ordering::SeqCst))
    }
}
