//! Registry of connected browser sockets.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier assigned to each connected client
pub type ConnectionId = Uuid;

/// Fans text frames out to every connected WebSocket client.
///
/// Each connection owns the receiving half of an unbounded channel; the hub
/// keeps the sending halves. A send that fails means the session has ended,
/// so that connection is dropped from the registry.
#[derive(Clone, Default)]
pub struct ConnectionHub {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// Returns its id and the receiver that yields every frame addressed to it.
    ///
    /// # Example
    ///
    /// ```
    /// # use gateway::ConnectionHub;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let hub = ConnectionHub::new();
    /// let (id, mut frames) = hub.register().await;
    /// hub.broadcast("hello").await;
    /// assert_eq!(frames.recv().await.as_deref(), Some("hello"));
    /// hub.unregister(id).await;
    /// # }
    /// ```
    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut connections = self.connections.write().await;
        connections.insert(id, tx);
        info!("WebSocket client {} connected, {} active", id, connections.len());
        (id, rx)
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id).is_some();
        if removed {
            info!("WebSocket client {} disconnected, {} active", id, connections.len());
        }
        removed
    }

    /// Send `text` to one connection.
    pub async fn send_to(&self, id: ConnectionId, text: impl Into<String>) -> bool {
        let delivered = match self.connections.read().await.get(&id) {
            Some(sender) => sender.send(text.into()).is_ok(),
            None => return false,
        };

        if !delivered {
            self.unregister(id).await;
        }
        delivered
    }

    /// Send `text` to every connection, pruning the ones that are gone.
    ///
    /// Returns the number of connections the frame was delivered to.
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;

        {
            let connections = self.connections.read().await;
            if connections.is_empty() {
                debug!("No WebSocket clients connected, skipping broadcast");
                return 0;
            }

            for (id, sender) in connections.iter() {
                if sender.send(text.to_string()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            warn!("Dropping {} closed WebSocket connection(s)", dead.len());
            let mut connections = self.connections.write().await;
            for id in dead {
                connections.remove(&id);
            }
        }

        debug!("Broadcast delivered to {} client(s)", delivered);
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let hub = ConnectionHub::new();
        let (first, _rx1) = hub.register().await;
        let (second, _rx2) = hub.register().await;
        assert_ne!(first, second);
        assert_eq!(hub.connection_count().await, 2);

        assert!(hub.unregister(first).await);
        assert!(!hub.unregister(first).await);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_dropped_receivers() {
        let hub = ConnectionHub::new();
        let (_alive, mut rx) = hub.register().await;
        let (_gone, dropped) = hub.register().await;
        drop(dropped);

        assert_eq!(hub.broadcast("frame").await, 1);
        assert_eq!(rx.recv().await.as_deref(), Some("frame"));
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_without_clients() {
        assert_eq!(ConnectionHub::new().broadcast("nobody").await, 0);
    }

    #[tokio::test]
    async fn test_send_to_single_connection() {
        let hub = ConnectionHub::new();
        let (target, mut target_rx) = hub.register().await;
        let (_other, mut other_rx) = hub.register().await;

        assert!(hub.send_to(target, "just you").await);
        assert_eq!(target_rx.recv().await.as_deref(), Some("just you"));
        assert!(other_rx.try_recv().is_err());

        assert!(!hub.send_to(Uuid::new_v4(), "nobody").await);
    }
}
