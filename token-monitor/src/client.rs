//! Reconnecting subscription client
//!
//! The client runs on a dedicated OS thread: it opens a connection, sends the
//! subscription request, feeds every push message through the frame filter
//! and hands decoded events to the [`Dispatcher`]. Connection lifecycle is
//! tracked by [`SubscriptionState`], a pure state machine that owns the
//! reconnect budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use creation_decoder::extract_creation_event;

use crate::config::MonitorConfig;
use crate::dispatcher::Dispatcher;
use crate::protocol;
use crate::transport::{Connection, Connector, Inbound};

/// Lifecycle phase of the subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPhase {
    Disconnected,
    Connecting,
    Subscribed,
    PermanentlyStopped,
}

/// What to do after a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait the configured delay, then make attempt number `attempt`
    Retry { attempt: u32 },
    /// The retry budget is spent
    Exhausted,
    /// A stop was requested
    Stopped,
}

/// Connection state and reconnect budget of one monitor run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    phase: SubscriptionPhase,
    running: bool,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
}

impl SubscriptionState {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            phase: SubscriptionPhase::Disconnected,
            running: true,
            reconnect_attempts: 0,
            max_reconnect_attempts,
        }
    }

    pub fn phase(&self) -> SubscriptionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Enter `Connecting`. Returns false once the run has been stopped.
    pub fn begin_connecting(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.phase = SubscriptionPhase::Connecting;
        true
    }

    /// A connection opened. Resets the retry budget.
    ///
    /// Returns false if a stop arrived while connecting; the caller must then
    /// close the fresh connection.
    pub fn on_subscribed(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.phase = SubscriptionPhase::Subscribed;
        self.reconnect_attempts = 0;
        true
    }

    /// A connection attempt failed or an open connection ended.
    pub fn on_disconnected(&mut self) -> ReconnectDecision {
        if !self.running {
            self.phase = SubscriptionPhase::PermanentlyStopped;
            return ReconnectDecision::Stopped;
        }

        if self.reconnect_attempts < self.max_reconnect_attempts {
            self.reconnect_attempts += 1;
            self.phase = SubscriptionPhase::Disconnected;
            ReconnectDecision::Retry {
                attempt: self.reconnect_attempts,
            }
        } else {
            self.running = false;
            self.phase = SubscriptionPhase::PermanentlyStopped;
            ReconnectDecision::Exhausted
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.phase = SubscriptionPhase::PermanentlyStopped;
    }
}

/// State shared between the subscription thread and the monitor facade
pub(crate) struct RunControl {
    state: Mutex<SubscriptionState>,
    wake: Condvar,
    phase_tx: watch::Sender<SubscriptionPhase>,
    events_dispatched: Mutex<u64>,
}

impl RunControl {
    pub(crate) fn new(max_reconnect_attempts: u32) -> Self {
        let (phase_tx, _) = watch::channel(SubscriptionPhase::Disconnected);
        Self {
            state: Mutex::new(SubscriptionState::new(max_reconnect_attempts)),
            wake: Condvar::new(),
            phase_tx,
            events_dispatched: Mutex::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> SubscriptionState {
        self.state.lock().clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().is_running()
    }

    pub(crate) fn subscribe_phase(&self) -> watch::Receiver<SubscriptionPhase> {
        self.phase_tx.subscribe()
    }

    pub(crate) fn events_dispatched(&self) -> u64 {
        *self.events_dispatched.lock()
    }

    /// Request a stop and wake a thread sleeping in back-off.
    pub(crate) fn stop(&self) {
        let mut state = self.state.lock();
        state.stop();
        self.publish(&state);
        self.wake.notify_all();
    }

    fn transition<T>(&self, apply: impl FnOnce(&mut SubscriptionState) -> T) -> T {
        let mut state = self.state.lock();
        let outcome = apply(&mut state);
        self.publish(&state);
        outcome
    }

    fn publish(&self, state: &SubscriptionState) {
        self.phase_tx.send_if_modified(|phase| {
            let changed = *phase != state.phase();
            *phase = state.phase();
            changed
        });
    }

    /// Sleep for `delay` unless stopped first. Returns whether the run is
    /// still active.
    fn wait_backoff(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut state = self.state.lock();
        while state.is_running() {
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.is_running()
    }

    fn record_dispatch(&self) {
        *self.events_dispatched.lock() += 1;
    }
}

/// The connection loop of a single monitor run
pub(crate) struct SubscriptionClient<C: Connector> {
    config: MonitorConfig,
    connector: Arc<C>,
    control: Arc<RunControl>,
    dispatcher: Dispatcher,
}

impl<C: Connector> SubscriptionClient<C> {
    pub(crate) fn new(
        config: MonitorConfig,
        connector: Arc<C>,
        control: Arc<RunControl>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            connector,
            control,
            dispatcher,
        }
    }

    /// Blocking loop; returns when stopped or out of retries.
    pub(crate) fn run(self) {
        let request =
            protocol::subscribe_request(&self.config.program_address, self.config.commitment);

        loop {
            if !self.control.transition(SubscriptionState::begin_connecting) {
                break;
            }

            info!("Connecting to {}", self.config.endpoint);
            match self
                .connector
                .connect(&self.config.endpoint, self.config.read_timeout)
            {
                Ok(connection) => self.run_session(connection, &request),
                Err(e) => warn!("Connection to {} failed: {}", self.config.endpoint, e),
            }

            match self.control.transition(SubscriptionState::on_disconnected) {
                ReconnectDecision::Retry { attempt } => {
                    info!(
                        "Reconnecting in {:?} (attempt {}/{})",
                        self.config.reconnect_delay, attempt, self.config.max_reconnect_attempts
                    );
                    if !self.control.wait_backoff(self.config.reconnect_delay) {
                        break;
                    }
                }
                ReconnectDecision::Exhausted => {
                    error!(
                        "Giving up after {} reconnect attempts",
                        self.config.max_reconnect_attempts
                    );
                    break;
                }
                ReconnectDecision::Stopped => break,
            }
        }

        self.control.transition(SubscriptionState::stop);
        info!("Subscription client stopped");
    }

    fn run_session(&self, mut connection: C::Connection, request: &str) {
        if !self.control.transition(SubscriptionState::on_subscribed) {
            connection.close();
            return;
        }
        info!("Connected to {}", self.config.endpoint);

        // A failed send is not fatal on its own; the close that follows is.
        match connection.send_text(request) {
            Ok(()) => info!(
                "Subscribed to logs mentioning {} ({})",
                self.config.program_address, self.config.commitment
            ),
            Err(e) => error!("Failed to send subscription request: {}", e),
        }

        loop {
            if !self.control.is_running() {
                connection.close();
                return;
            }

            match connection.recv() {
                Ok(Inbound::Text(text)) => self.handle_message(&text),
                Ok(Inbound::Idle) => {}
                Ok(Inbound::Closed(reason)) => {
                    info!("Connection closed: {}", reason.as_deref().unwrap_or("no reason"));
                    return;
                }
                Err(e) => {
                    warn!("Transport error: {}", e);
                    connection.close();
                    return;
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        let logs = match protocol::parse_log_notification(text) {
            Ok(Some(logs)) => logs,
            Ok(None) => {
                debug!("Ignoring non-notification message");
                return;
            }
            Err(e) => {
                warn!("Failed to parse message: {}", e);
                return;
            }
        };

        if let Some(event) = extract_creation_event(&logs) {
            info!("New token detected: {} ({}) mint {}", event.name, event.symbol, event.mint);
            if self.dispatcher.dispatch(event).is_ok() {
                self.control.record_dispatch();
            }
        }
    }
}
