//! Frame filter for program log batches
//!
//! One subscription push carries the ordered log lines of a transaction.
//! Creation events only appear in transactions that initialize a mint, and
//! are emitted as base64 `Program data: ` lines. Trade events share the same
//! outer marker but start with `vdt/` once base64-encoded, so they are
//! excluded before decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::event::{decode, CreationEvent, MIN_CREATE_EVENT_SIZE};

/// Log marker for the mint-initialization instruction
pub const MINT_MARKER: &str = "Instruction: InitializeMint2";

/// Prefix of lines carrying base64 event data
pub const DATA_PREFIX: &str = "Program data: ";

/// Prefix of a different event shape that shares [`DATA_PREFIX`]
pub const EXCLUDED_PREFIX: &str = "Program data: vdt/";

/// True when any line marks a mint initialization
pub fn has_creation_marker<S: AsRef<str>>(logs: &[S]) -> bool {
    logs.iter()
        .any(|line| AsRef::<str>::as_ref(line).contains(MINT_MARKER))
}

/// Base64 payloads of the candidate lines, in log order.
///
/// Empty when the batch has no mint-initialization marker.
pub fn candidate_payloads<S: AsRef<str>>(logs: &[S]) -> Vec<&str> {
    if !has_creation_marker(logs) {
        return Vec::new();
    }

    logs.iter()
        .map(|line| AsRef::<str>::as_ref(line))
        .filter(|line| !line.starts_with(EXCLUDED_PREFIX))
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .collect()
}

/// Extract the first creation event carried by a log batch.
///
/// Lines that fail base64 or layout decoding are logged and skipped; a
/// batch that yields nothing is a normal outcome, not an error.
pub fn extract_creation_event<S: AsRef<str>>(logs: &[S]) -> Option<CreationEvent> {
    for payload in candidate_payloads(logs) {
        let raw = match STANDARD.decode(payload.trim_end()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping program data line with invalid base64: {}", e);
                continue;
            }
        };

        if raw.len() < MIN_CREATE_EVENT_SIZE {
            tracing::trace!("Skipping {}-byte program data payload", raw.len());
            continue;
        }

        match decode(&raw) {
            Ok(event) => return Some(event),
            Err(e) => {
                tracing::warn!("Skipping undecodable creation payload: {}", e);
            }
        }
    }

    None
}
