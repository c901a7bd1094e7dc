//! # Token Monitor
//!
//! Subscribes to the log stream of the bonding-curve launch program, decodes
//! token-creation events and hands each new token to an async callback.
//!
//! ## Architecture
//!
//! - **[`TokenMonitor`]**: public facade with `start`/`stop`/`status`
//! - **[`client`]**: connection thread and the reconnect state machine
//! - **[`dispatcher`]**: thread-to-runtime hand-off of decoded events
//! - **[`transport`]**: blocking WebSocket transport behind a trait
//! - **[`protocol`]**: subscription request and notification parsing
//!
//! The connection runs on its own OS thread so a stalled socket can never
//! block the application runtime; callbacks run as tasks on the runtime that
//! called `start`.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod token;
pub mod transport;

pub use client::{ReconnectDecision, SubscriptionPhase, SubscriptionState};
pub use config::{Commitment, MonitorConfig, DEFAULT_ENDPOINT, DEFAULT_PROGRAM_ADDRESS};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, MonitorError, Result, TransportError};
pub use monitor::{MonitorStatus, TokenMonitor};
pub use token::{TokenRecord, SOL_DECIMALS, TOKEN_DECIMALS};
pub use transport::{Connection, Connector, Inbound, WsConnection, WsConnector};

pub use creation_decoder::{Address, CreationEvent};
