//! # Task Queue
//!
//! Hands newly detected tokens to the analysis consumer and carries analysis
//! progress back out to the gateway.
//!
//! Two backends implement [`QueueBackend`]:
//!
//! - [`MemoryBackend`]: always available, process-local
//! - `RedisBackend`: LPUSH/BRPOP task list and PUBLISH/SUBSCRIBE result
//!   channel, behind the `redis` cargo feature
//!
//! [`MessageQueue::initialize`] picks Redis when it is configured, compiled in
//! and answers PING; otherwise it runs in memory.

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod queue;
#[cfg(feature = "redis")]
pub mod redis_backend;

pub use backend::{MemoryBackend, QueueBackend};
pub use config::{QueueConfig, DEFAULT_POLL_TIMEOUT, DEFAULT_RESULT_CHANNEL, DEFAULT_TASK_KEY};
pub use error::{QueueError, Result};
pub use model::{
    AnalysisResult, AnalysisStatus, AnalysisTask, CompletionKind, MessageKind, SocialPost,
    StreamMessage, WebSearchResult,
};
pub use queue::MessageQueue;
#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;
