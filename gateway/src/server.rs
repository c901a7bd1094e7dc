//! HTTP and WebSocket server for browser clients.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Reply};

use task_queue::StreamMessage;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::hub::ConnectionHub;

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "Token Scout API";

/// Whether a component is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Running,
    Stopped,
}

impl From<bool> for ComponentState {
    fn from(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

/// Component states reported by `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub token_monitor: ComponentState,
    pub ai_analyzer: ComponentState,
    pub message_queue: ComponentState,
    /// Free-form diagnostics, omitted when empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Source of the component states served by `GET /status`
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn status(&self) -> SystemStatus;
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    system: SystemStatus,
    active_connections: usize,
    timestamp: DateTime<Utc>,
}

/// All gateway routes.
///
/// - `GET /`: health check
/// - `GET /status`: component states and the number of WebSocket clients
/// - `GET /ws`: WebSocket stream of [`StreamMessage`] frames
///
/// The HTTP routes answer CORS requests from `config.cors_origins`.
pub fn routes(
    hub: ConnectionHub,
    status: Arc<dyn StatusProvider>,
    config: &GatewayConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "message": SERVICE_NAME,
            "status": "running",
            "timestamp": Utc::now(),
        }))
    });

    let status_hub = hub.clone();
    let status_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || status_hub.clone()))
        .and(warp::any().map(move || Arc::clone(&status)))
        .and_then(status_handler);

    let cors = warp::cors()
        .allow_origins(config.cors_origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"])
        .allow_credentials(true);

    let heartbeat_interval = config.heartbeat_interval;
    let ws = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(warp::any().map(move || hub.clone()))
        .map(move |ws: Ws, remote: Option<SocketAddr>, hub: ConnectionHub| {
            let client = remote.map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
            info!("WebSocket connection request from {}", client);
            ws.on_upgrade(move |socket| run_session(socket, hub, heartbeat_interval, client))
        });

    health
        .or(status_route)
        .with(cors)
        .or(ws)
        .recover(handle_rejection)
}

async fn status_handler(
    hub: ConnectionHub,
    provider: Arc<dyn StatusProvider>,
) -> std::result::Result<impl Reply, Infallible> {
    let response = StatusResponse {
        system: provider.status().await,
        active_connections: hub.connection_count().await,
        timestamp: Utc::now(),
    };
    Ok(warp::reply::json(&response))
}

/// Reply to a text frame from a client, if it is a known command.
pub(crate) fn respond(text: &str) -> Option<String> {
    match text {
        "ping" => Some("pong".to_string()),
        "heartbeat" => StreamMessage::heartbeat_response().to_json().ok(),
        _ => None,
    }
}

fn frame(message: &StreamMessage) -> Option<Message> {
    match message.to_json() {
        Ok(json) => Some(Message::text(json)),
        Err(e) => {
            error!("Failed to serialize {:?} message: {}", message.kind, e);
            None
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &StreamMessage,
) -> std::result::Result<(), warp::Error> {
    match frame(message) {
        Some(frame) => sink.send(frame).await,
        None => Ok(()),
    }
}

/// Serve one WebSocket client until it disconnects.
///
/// The client first gets `connection_status`, then every broadcast frame.
/// After `heartbeat_interval` without a message from the client a
/// `heartbeat` frame is sent.
async fn run_session(
    socket: WebSocket,
    hub: ConnectionHub,
    heartbeat_interval: Duration,
    client: String,
) {
    let (mut sink, mut stream) = socket.split();

    if let Err(e) = send_frame(&mut sink, &StreamMessage::connection_status("connected")).await {
        warn!("Failed to greet {}: {}", client, e);
        return;
    }

    let (id, mut outbound) = hub.register().await;
    let idle = tokio::time::sleep(heartbeat_interval);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(message)) => {
                    idle.as_mut().reset(Instant::now() + heartbeat_interval);
                    if message.is_close() {
                        info!("Client {} closed the connection", client);
                        break;
                    }
                    let Ok(text) = message.to_str() else {
                        continue;
                    };
                    debug!("Received {:?} from {}", text, client);
                    match respond(text) {
                        Some(reply) => {
                            if let Err(e) = sink.send(Message::text(reply)).await {
                                warn!("Failed to reply to {}: {}", client, e);
                                break;
                            }
                        }
                        None => warn!("Unknown message from {}: {}", client, text),
                    }
                }
                Some(Err(e)) => {
                    warn!("WebSocket error from {}: {}", client, e);
                    break;
                }
                None => break,
            },
            broadcast = outbound.recv() => match broadcast {
                Some(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        warn!("Failed to forward to {}: {}", client, e);
                        break;
                    }
                }
                None => break,
            },
            () = &mut idle => {
                if let Err(e) = send_frame(&mut sink, &StreamMessage::heartbeat()).await {
                    warn!("Failed to send heartbeat to {}: {}", client, e);
                    break;
                }
                debug!("Sent heartbeat to {}", client);
                idle.as_mut().reset(Instant::now() + heartbeat_interval);
            }
        }
    }

    hub.unregister(id).await;
}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(err: warp::Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else if err.find::<warp::cors::CorsForbidden>().is_some() {
        (StatusCode::FORBIDDEN, "Origin not allowed")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "detail": message })),
        code,
    ))
}

/// Running HTTP server with graceful shutdown.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use gateway::{ConnectionHub, GatewayConfig, GatewayServer, StatusProvider};
/// # async fn example(status: Arc<dyn StatusProvider>) -> gateway::Result<()> {
/// let server = GatewayServer::start(&GatewayConfig::default(), ConnectionHub::new(), status).await?;
/// println!("Listening on {}", server.local_addr());
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct GatewayServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl GatewayServer {
    /// Bind `config.bind_address` and start serving.
    ///
    /// Binding happens before this returns, so a port of 0 is resolved in
    /// [`GatewayServer::local_addr`].
    pub async fn start(
        config: &GatewayConfig,
        hub: ConnectionHub,
        status: Arc<dyn StatusProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let routes = routes(hub, status, config);

        let (local_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(config.bind_address, async move {
                shutdown_rx.recv().await;
            })
            .map_err(|e| GatewayError::Bind {
                address: config.bind_address,
                reason: e.to_string(),
            })?;

        let server_handle = tokio::spawn(server);
        info!("Gateway listening on {}", local_addr);

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                error!("Gateway server task failed: {}", e);
            }
        }
        info!("Gateway on {} stopped", self.local_addr);
    }
}
