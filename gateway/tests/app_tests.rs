//! Integration tests for the assembled service.
//!
//! These tests verify:
//! - A detected token is announced before its analysis task is queued
//! - Analysis progress flows from the analyzer through the hub to clients
//! - The bound server answers `GET /status` with live component state
//! - Shutdown stops every component

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

use gateway::{announce_token, ConnectionHub, GatewayConfig, ScoutConfig, TokenScout};
use task_queue::{MessageQueue, QueueConfig};
use token_monitor::{
    Address, Connection, Connector, CreationEvent, Inbound, MonitorConfig, TokenRecord,
    TransportError,
};

/// Connector for a network that is never reachable
struct OfflineConnector;

struct NoConnection;

impl Connection for NoConnection {
    fn send_text(&mut self, _text: &str) -> Result<(), TransportError> {
        Err(TransportError::Send("offline".to_string()))
    }

    fn recv(&mut self) -> Result<Inbound, TransportError> {
        Ok(Inbound::Closed(None))
    }

    fn close(&mut self) {}
}

impl Connector for OfflineConnector {
    type Connection = NoConnection;

    fn connect(&self, _url: &str, _read_timeout: Duration) -> Result<NoConnection, TransportError> {
        Err(TransportError::Connect("network unreachable".to_string()))
    }
}

fn token(symbol: &str, byte: u8) -> TokenRecord {
    TokenRecord::from_event(
        CreationEvent {
            name: format!("{symbol} Coin"),
            symbol: symbol.to_string(),
            uri: "https://ipfs.io/ipfs/meta".to_string(),
            mint: Address::new([byte; 32]),
            bonding_curve: Address::new([byte.wrapping_add(1); 32]),
            user: Address::new([9; 32]),
            creator: Address::new([9; 32]),
            timestamp: 1_700_000_000,
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
        },
        Utc::now(),
    )
}

fn offline_config() -> ScoutConfig {
    ScoutConfig::default()
        .with_monitor(
            MonitorConfig::default().with_reconnect(1, Duration::from_millis(10)),
        )
        .with_gateway(
            GatewayConfig::default().with_bind_address("127.0.0.1:0".parse().unwrap()),
        )
}

async fn next_frame(rx: &mut UnboundedReceiver<String>) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no frame within timeout")
        .expect("hub closed");
    serde_json::from_str(&frame).unwrap()
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> Value {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");

    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_announce_broadcasts_then_queues() {
    let hub = ConnectionHub::new();
    let queue = MessageQueue::in_memory();
    let (_id, mut rx) = hub.register().await;

    let record = token("PEPE", 40);
    let task = announce_token(&hub, &queue, record.clone()).await.unwrap();

    let frame = next_frame(&mut rx).await;
    assert_eq!(frame["type"], "new_token");
    assert_eq!(frame["data"]["symbol"], "PEPE");
    assert_eq!(frame["data"]["mint"], record.mint);

    assert!(task.task_id.starts_with(&format!("{}_", record.mint)));
    assert_eq!(queue.queue_len().await.unwrap(), 1);
    assert!(queue.analysis(&record.mint).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_streams_analysis_and_reports_status() {
    let scout = TokenScout::start_with_connector(offline_config(), OfflineConnector)
        .await
        .unwrap();
    let (_id, mut rx) = scout.hub().register().await;

    let record = token("DOGE", 50);
    announce_token(scout.hub(), scout.queue(), record.clone())
        .await
        .unwrap();
    assert_eq!(next_frame(&mut rx).await["type"], "new_token");

    // Without a model key the analysis completes with placeholder text
    let mut progress = Vec::new();
    let completed = loop {
        let frame = next_frame(&mut rx).await;
        match frame["type"].as_str() {
            Some("analysis_update") => progress.push(frame["data"]["progress"].as_f64().unwrap()),
            Some("analysis_complete") => break frame,
            other => panic!("unexpected frame type {other:?}"),
        }
    };
    assert_eq!(progress, vec![10.0, 30.0, 50.0]);
    assert_eq!(completed["data"]["token_mint"], record.mint);
    assert_eq!(completed["data"]["status"], "COMPLETED");

    let status = http_get(scout.local_addr(), "/status").await;
    assert_eq!(status["ai_analyzer"], "running");
    assert_eq!(status["message_queue"], "running");
    assert_eq!(status["active_connections"], 1);
    assert_eq!(status["details"]["queue"]["backend"], "memory");

    let health = http_get(scout.local_addr(), "/").await;
    assert_eq!(health["status"], "running");

    let analyzer = std::sync::Arc::clone(scout.analyzer());
    scout.shutdown().await;
    assert!(!analyzer.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_finished_analyses_are_pruned() {
    let config = offline_config().with_queue(
        QueueConfig::default().with_cleanup(Duration::from_millis(50), Duration::ZERO),
    );
    let scout = TokenScout::start_with_connector(config, OfflineConnector)
        .await
        .unwrap();
    let (_id, mut rx) = scout.hub().register().await;

    let record = token("SHIB", 60);
    announce_token(scout.hub(), scout.queue(), record.clone())
        .await
        .unwrap();

    loop {
        if next_frame(&mut rx).await["type"] == "analysis_complete" {
            break;
        }
    }

    let pruned = tokio::time::timeout(Duration::from_secs(5), async {
        while scout.queue().analysis(&record.mint).is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(pruned.is_ok(), "finished analysis was never pruned");

    scout.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_network_stops_monitor() {
    let scout = TokenScout::start_with_connector(offline_config(), OfflineConnector)
        .await
        .unwrap();

    let stopped = tokio::time::timeout(Duration::from_secs(5), async {
        while scout.monitor().is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(stopped.is_ok(), "monitor kept retrying past its budget");

    let status = http_get(scout.local_addr(), "/status").await;
    assert_eq!(status["token_monitor"], "stopped");

    scout.shutdown().await;
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let first = TokenScout::start_with_connector(offline_config(), OfflineConnector)
        .await
        .unwrap();

    let taken = offline_config().with_gateway(
        GatewayConfig::default().with_bind_address(first.local_addr()),
    );
    let result = TokenScout::start_with_connector(taken, OfflineConnector).await;
    assert!(matches!(result, Err(gateway::GatewayError::Bind { .. })));

    first.shutdown().await;
}
