//! JSON-RPC messages of the log-subscription protocol

use serde::Deserialize;
use serde_json::json;

use creation_decoder::Address;

use crate::config::Commitment;

/// Request id used for the single subscription a connection makes
pub const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Build the `logsSubscribe` request for logs mentioning `address`.
pub fn subscribe_request(address: &Address, commitment: Commitment) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": SUBSCRIBE_REQUEST_ID,
        "method": "logsSubscribe",
        "params": [
            { "mentions": [address.to_string()] },
            { "commitment": commitment.as_str() },
        ],
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    params: Option<NotificationParams>,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    #[serde(default)]
    result: Option<NotificationResult>,
}

#[derive(Debug, Deserialize)]
struct NotificationResult {
    #[serde(default)]
    value: Option<LogsValue>,
}

#[derive(Debug, Deserialize)]
struct LogsValue {
    #[serde(default)]
    logs: Vec<String>,
}

/// Extract the log lines of a push notification.
///
/// Returns `Ok(None)` for well-formed messages of any other shape, such as
/// the subscription confirmation.
pub fn parse_log_notification(text: &str) -> Result<Option<Vec<String>>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(text)?;
    Ok(envelope
        .params
        .and_then(|params| params.result)
        .and_then(|result| result.value)
        .map(|value| value.logs))
}
