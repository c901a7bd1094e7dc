//! Hand-off from the subscription thread to the application runtime
//!
//! The subscription thread never runs application code. Decoded events are
//! sent over an unbounded channel to a pump task living on the runtime that
//! called `start`; the pump builds the [`TokenRecord`] and spawns the callback
//! as its own task, so a slow callback never delays the stream.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use creation_decoder::CreationEvent;

use crate::error::DispatchError;
use crate::token::TokenRecord;

type TokenCallback = Arc<dyn Fn(TokenRecord) -> BoxFuture<'static, ()> + Send + Sync>;

/// Thread-safe sender side of the hand-off
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<CreationEvent>,
}

impl Dispatcher {
    /// Spawn the pump task on `handle` and return the sending side.
    ///
    /// The pump exits once every `Dispatcher` clone has been dropped.
    pub fn spawn<F, Fut>(handle: &Handle, callback: F) -> Self
    where
        F: Fn(TokenRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: TokenCallback = Arc::new(move |record| Box::pin(callback(record)));
        let (sender, mut receiver) = mpsc::unbounded_channel::<CreationEvent>();

        handle.spawn(async move {
            while let Some(event) = receiver.recv().await {
                let record = TokenRecord::from_event(event, Utc::now());
                debug!("Dispatching token {} ({})", record.symbol, record.mint);
                tokio::spawn((callback)(record));
            }
            debug!("Token dispatcher pump finished");
        });

        Self { sender }
    }

    /// Queue `event` for the application runtime without waiting for it.
    pub fn dispatch(&self, event: CreationEvent) -> Result<(), DispatchError> {
        let mint = event.mint;
        self.sender.send(event).map_err(|_| {
            warn!("Token dispatcher pump is gone, dropping event for {}", mint);
            DispatchError::RuntimeUnavailable(mint)
        })
    }
}
