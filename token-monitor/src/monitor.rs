//! Public facade of the token monitor

use std::future::Future;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::{RunControl, SubscriptionClient, SubscriptionPhase};
use crate::config::MonitorConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{MonitorError, Result};
use crate::token::TokenRecord;
use crate::transport::{Connector, WsConnector};

/// Point-in-time view of a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub phase: SubscriptionPhase,
    pub running: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub events_dispatched: u64,
}

struct ActiveRun {
    control: Arc<RunControl>,
    _thread: JoinHandle<()>,
}

/// Watches the launch program's logs and reports every new token.
///
/// `start` must be called from inside a tokio runtime: callbacks run as tasks
/// on that runtime while the connection itself lives on a dedicated thread.
///
/// # Example
///
/// ```rust,no_run
/// use token_monitor::{MonitorConfig, TokenMonitor};
///
/// # async fn example() -> token_monitor::Result<()> {
/// let monitor = TokenMonitor::new(MonitorConfig::default())?;
/// monitor.start(|token| async move {
///     println!("{} ({}) minted at {}", token.name, token.symbol, token.mint);
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct TokenMonitor<C: Connector = WsConnector> {
    config: MonitorConfig,
    connector: Arc<C>,
    current: Mutex<Option<ActiveRun>>,
}

impl TokenMonitor<WsConnector> {
    /// Create a monitor that connects over WebSocket
    pub fn new(config: MonitorConfig) -> Result<Self> {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> TokenMonitor<C> {
    /// Create a monitor using a custom transport
    pub fn with_connector(config: MonitorConfig, connector: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(connector),
            current: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Begin monitoring. A second call while running only logs a warning.
    ///
    /// Each start after a stop begins a fresh run with a full retry budget.
    pub fn start<F, Fut>(&self, callback: F) -> Result<()>
    where
        F: Fn(TokenRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|run| run.control.is_running()) {
            warn!("Token monitor is already running");
            return Ok(());
        }

        let handle = Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;
        let dispatcher = Dispatcher::spawn(&handle, callback);
        let control = Arc::new(RunControl::new(self.config.max_reconnect_attempts));

        let client = SubscriptionClient::new(
            self.config.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&control),
            dispatcher,
        );

        let thread = thread::Builder::new()
            .name("token-monitor".to_string())
            .spawn(move || client.run())
            .map_err(MonitorError::ThreadSpawn)?;

        *current = Some(ActiveRun {
            control,
            _thread: thread,
        });
        info!("Token monitor started for {}", self.config.endpoint);
        Ok(())
    }

    /// Request a stop. Returns immediately; the subscription thread notices
    /// within one read timeout.
    pub fn stop(&self) {
        if let Some(run) = self.current.lock().as_ref() {
            if run.control.is_running() {
                run.control.stop();
                info!("Token monitor stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|run| run.control.is_running())
    }

    pub fn status(&self) -> MonitorStatus {
        match self.current.lock().as_ref() {
            Some(run) => {
                let state = run.control.snapshot();
                MonitorStatus {
                    phase: state.phase(),
                    running: state.is_running(),
                    reconnect_attempts: state.reconnect_attempts(),
                    max_reconnect_attempts: state.max_reconnect_attempts(),
                    events_dispatched: run.control.events_dispatched(),
                }
            }
            None => MonitorStatus {
                phase: SubscriptionPhase::Disconnected,
                running: false,
                reconnect_attempts: 0,
                max_reconnect_attempts: self.config.max_reconnect_attempts,
                events_dispatched: 0,
            },
        }
    }

    /// Phase updates of the current run, if one was started.
    pub fn state_changes(&self) -> Option<watch::Receiver<SubscriptionPhase>> {
        self.current
            .lock()
            .as_ref()
            .map(|run| run.control.subscribe_phase())
    }
}

impl<C: Connector> Drop for TokenMonitor<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
