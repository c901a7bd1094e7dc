//! Redis backend: LPUSH/BRPOP task list and PUBLISH/SUBSCRIBE result channel

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Msg};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backend::QueueBackend;
use crate::error::{QueueError, Result};

type MessageStream = Pin<Box<dyn Stream<Item = Msg> + Send>>;

pub struct RedisBackend {
    commands: MultiplexedConnection,
    // BRPOP parks its connection, so it gets one of its own.
    blocking: Mutex<MultiplexedConnection>,
    results: Mutex<MessageStream>,
    task_key: String,
    result_channel: String,
}

impl RedisBackend {
    /// Connect, verify the server with PING and subscribe to the result
    /// channel so no result published after this point is missed.
    pub async fn connect(url: &str, task_key: &str, result_channel: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut commands = client.get_multiplexed_tokio_connection().await?;
        let blocking = client.get_multiplexed_tokio_connection().await?;

        let pong: String = redis::cmd("PING").query_async(&mut commands).await?;
        debug!("Redis replied {} to PING", pong);

        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(result_channel).await?;
        let results: MessageStream = Box::pin(pubsub.into_on_message());

        info!("Connected to Redis, subscribed to {}", result_channel);
        Ok(Self {
            commands,
            blocking: Mutex::new(blocking),
            results: Mutex::new(results),
            task_key: task_key.to_string(),
            result_channel: result_channel.to_string(),
        })
    }
}

#[async_trait]
impl QueueBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_durable(&self) -> bool {
        true
    }

    async fn push_task(&self, payload: String) -> Result<()> {
        let mut connection = self.commands.clone();
        let _: i64 = connection.lpush(&self.task_key, payload).await?;
        Ok(())
    }

    async fn pop_task(&self, timeout: Duration) -> Result<Option<String>> {
        let mut connection = self.blocking.lock().await;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.task_key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut *connection)
            .await?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn publish_result(&self, payload: String) -> Result<()> {
        let mut connection = self.commands.clone();
        let _: i64 = connection.publish(&self.result_channel, payload).await?;
        Ok(())
    }

    async fn next_result(&self, timeout: Duration) -> Result<Option<String>> {
        let mut results = self.results.lock().await;
        match tokio::time::timeout(timeout, results.next()).await {
            Ok(Some(message)) => Ok(Some(message.get_payload()?)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn len(&self) -> Result<usize> {
        let mut connection = self.commands.clone();
        let length: usize = connection.llen(&self.task_key).await?;
        Ok(length)
    }
}
