//! # Gateway
//!
//! Browser-facing side of token-scout, plus the assembly of the whole service.
//!
//! - [`ConnectionHub`]: fan-out of text frames to connected WebSocket clients
//! - [`routes`] / [`GatewayServer`]: `GET /`, `GET /status` and `GET /ws`
//! - [`TokenScout`]: starts the monitor, queue, analyzer and server together
//! - [`logging`]: `tracing-subscriber` setup for the process
//!
//! Every frame sent to browsers is a [`task_queue::StreamMessage`]:
//! `new_token` as soon as a token is seen, then `analysis_update` frames for
//! progress (and failure) and a final `analysis_complete`.

pub mod app;
pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod server;

pub use app::{announce_token, TokenScout};
pub use config::{GatewayConfig, ScoutConfig, DEFAULT_BIND_ADDRESS, DEFAULT_CORS_ORIGIN};
pub use error::{GatewayError, Result};
pub use hub::{ConnectionHub, ConnectionId};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use server::{routes, ComponentState, GatewayServer, StatusProvider, SystemStatus, SERVICE_NAME};
