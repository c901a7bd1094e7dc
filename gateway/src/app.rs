//! Assembly of the monitor, queue, analyzer and gateway into one service

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use analyzer::Analyzer;
use task_queue::{AnalysisTask, MessageQueue, StreamMessage, DEFAULT_POLL_TIMEOUT};
use token_monitor::{Connector, TokenMonitor, TokenRecord, WsConnector};

use crate::config::ScoutConfig;
use crate::error::Result;
use crate::hub::ConnectionHub;
use crate::server::{GatewayServer, StatusProvider, SystemStatus};

/// Announce a newly detected token and queue it for analysis.
///
/// Browsers get the `new_token` frame before the task is queued, so the card
/// exists by the time progress updates arrive.
pub async fn announce_token(
    hub: &ConnectionHub,
    queue: &MessageQueue,
    token: TokenRecord,
) -> Result<AnalysisTask> {
    info!("New token detected: {} ({}) mint={}", token.symbol, token.name, token.mint);

    let message = StreamMessage::new_token(&token)?;
    let delivered = hub.broadcast(&message.to_json()?).await;
    info!("Announced {} to {} client(s)", token.symbol, delivered);

    Ok(queue.add_analysis_task(&token).await?)
}

/// Forward analysis messages from the queue to every browser until told to stop.
async fn forward_results(
    queue: Arc<MessageQueue>,
    hub: ConnectionHub,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    info!("Listening for analysis results");

    loop {
        let next = tokio::select! {
            _ = shutdown_rx.recv() => break,
            next = queue.next_result(DEFAULT_POLL_TIMEOUT) => next,
        };

        match next {
            Ok(Some(message)) => match message.to_json() {
                Ok(json) => {
                    hub.broadcast(&json).await;
                }
                Err(e) => error!("Failed to serialize analysis message: {}", e),
            },
            Ok(None) => {}
            Err(e) => {
                error!("Failed to read analysis results: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    info!("Analysis result forwarding stopped");
}

/// Prune finished analyses every `interval` until told to stop.
async fn prune_completed(
    queue: Arc<MessageQueue>,
    interval: Duration,
    retention: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                queue.clear_completed(retention);
            }
        }
    }

    info!("Analysis cleanup stopped");
}

/// Reports live component state for `GET /status`
struct ScoutStatus<C: Connector> {
    monitor: Arc<TokenMonitor<C>>,
    analyzer: Arc<Analyzer>,
    queue: Arc<MessageQueue>,
}

#[async_trait]
impl<C: Connector> StatusProvider for ScoutStatus<C> {
    async fn status(&self) -> SystemStatus {
        let monitor = self.monitor.status();
        let queue_len = self.queue.queue_len().await;

        SystemStatus {
            token_monitor: monitor.running.into(),
            ai_analyzer: self.analyzer.is_running().into(),
            message_queue: queue_len.is_ok().into(),
            details: Some(json!({
                "monitor": monitor,
                "analyzer": self.analyzer.stats(),
                "queue": {
                    "backend": self.queue.backend_name(),
                    "pending_tasks": queue_len.ok(),
                    "tracked_analyses": self.queue.pending_analyses().len(),
                },
            })),
        }
    }
}

/// The whole service: token monitor, analysis queue, analyzer and gateway.
///
/// # Example
///
/// ```no_run
/// use gateway::{ScoutConfig, TokenScout};
///
/// # async fn example() -> gateway::Result<()> {
/// let scout = TokenScout::start(ScoutConfig::from_env()?).await?;
/// println!("Serving on {}", scout.local_addr());
/// tokio::signal::ctrl_c().await.ok();
/// scout.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct TokenScout<C: Connector = WsConnector> {
    hub: ConnectionHub,
    queue: Arc<MessageQueue>,
    analyzer: Arc<Analyzer>,
    monitor: Arc<TokenMonitor<C>>,
    consumer: JoinHandle<()>,
    forwarder: JoinHandle<()>,
    forwarder_shutdown: mpsc::Sender<()>,
    cleanup: JoinHandle<()>,
    cleanup_shutdown: mpsc::Sender<()>,
    server: GatewayServer,
}

impl TokenScout<WsConnector> {
    /// Start every component, monitoring over WebSocket.
    pub async fn start(config: ScoutConfig) -> Result<Self> {
        Self::start_with_connector(config, WsConnector).await
    }
}

impl<C: Connector> TokenScout<C> {
    /// Start every component with a custom monitor transport.
    ///
    /// Components start in dependency order: queue, analyzer, monitor,
    /// result forwarding and cleanup, then the HTTP server.
    pub async fn start_with_connector(config: ScoutConfig, connector: C) -> Result<Self> {
        config.validate()?;
        info!("Starting token-scout");

        let queue = Arc::new(MessageQueue::initialize(config.queue.clone()).await?);
        info!("Message queue ready ({} backend)", queue.backend_name());

        let analyzer = Arc::new(Analyzer::new(Arc::clone(&queue), config.analyzer.clone())?);
        let consumer = analyzer.start();

        let hub = ConnectionHub::new();
        let monitor = match TokenMonitor::with_connector(config.monitor.clone(), connector) {
            Ok(monitor) => Arc::new(monitor),
            Err(e) => {
                analyzer.stop();
                return Err(e.into());
            }
        };

        let callback_hub = hub.clone();
        let callback_queue = Arc::clone(&queue);
        let started = monitor.start(move |token| {
            let hub = callback_hub.clone();
            let queue = Arc::clone(&callback_queue);
            async move {
                let symbol = token.symbol.clone();
                if let Err(e) = announce_token(&hub, &queue, token).await {
                    error!("Failed to handle new token {}: {}", symbol, e);
                }
            }
        });
        if let Err(e) = started {
            analyzer.stop();
            return Err(e.into());
        }

        let (forwarder_shutdown, shutdown_rx) = mpsc::channel(1);
        let forwarder = tokio::spawn(forward_results(Arc::clone(&queue), hub.clone(), shutdown_rx));

        let (cleanup_shutdown, cleanup_rx) = mpsc::channel(1);
        let cleanup = tokio::spawn(prune_completed(
            Arc::clone(&queue),
            config.queue.cleanup_interval,
            config.queue.completed_retention,
            cleanup_rx,
        ));

        let status = Arc::new(ScoutStatus {
            monitor: Arc::clone(&monitor),
            analyzer: Arc::clone(&analyzer),
            queue: Arc::clone(&queue),
        });
        let server = match GatewayServer::start(&config.gateway, hub.clone(), status).await {
            Ok(server) => server,
            Err(e) => {
                let _ = cleanup_shutdown.send(()).await;
                let _ = forwarder_shutdown.send(()).await;
                monitor.stop();
                analyzer.stop();
                return Err(e);
            }
        };

        info!("All services started");
        Ok(Self {
            hub,
            queue,
            analyzer,
            monitor,
            consumer,
            forwarder,
            forwarder_shutdown,
            cleanup,
            cleanup_shutdown,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn monitor(&self) -> &TokenMonitor<C> {
        &self.monitor
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    /// Stop every component in reverse start order.
    pub async fn shutdown(self) {
        info!("Shutting down token-scout");

        self.server.shutdown().await;

        let _ = self.cleanup_shutdown.send(()).await;
        if let Err(e) = self.cleanup.await {
            warn!("Analysis cleanup ended abnormally: {}", e);
        }

        let _ = self.forwarder_shutdown.send(()).await;
        if let Err(e) = self.forwarder.await {
            warn!("Result forwarder ended abnormally: {}", e);
        }

        self.monitor.stop();

        self.analyzer.stop();
        if let Err(e) = self.consumer.await {
            warn!("Analysis consumer ended abnormally: {}", e);
        }

        info!("All services stopped");
    }
}
