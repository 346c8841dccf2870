//! Registry of live client connections
//!
//! Each accepted WebSocket gets a server-assigned id and an unbounded
//! channel; the socket task drains the channel into the socket.

use crate::error::{GameError, Result};
use crate::transport::publisher::EventSink;
use crate::types::{ConnectionId, ServerEvent};
use crate::utils::{current_timestamp, generate_connection_id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound half of a live connection
#[derive(Debug)]
struct ConnectionHandle {
    tx: mpsc::UnboundedSender<ServerEvent>,
    connected_at: DateTime<Utc>,
}

/// All currently connected clients
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    total_accepted: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection, returning its id and the receiver for
    /// events addressed to it.
    pub fn register(&self) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = generate_connection_id();

        let mut connections = self
            .connections
            .write()
            .map_err(|_| GameError::Internal {
                message: "Failed to acquire connections lock".to_string(),
            })?;
        connections.insert(
            id,
            ConnectionHandle {
                tx,
                connected_at: current_timestamp(),
            },
        );
        self.total_accepted.fetch_add(1, Ordering::Relaxed);

        info!(
            "Registered connection {} - active connections: {}",
            id,
            connections.len()
        );
        Ok((id, rx))
    }

    /// Forget a connection; returns whether it was registered
    pub fn unregister(&self, id: ConnectionId) -> Result<bool> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| GameError::Internal {
                message: "Failed to acquire connections lock".to_string(),
            })?;

        match connections.remove(&id) {
            Some(handle) => {
                let lifetime = current_timestamp() - handle.connected_at;
                info!(
                    "Unregistered connection {} after {}s - active connections: {}",
                    id,
                    lifetime.num_seconds(),
                    connections.len()
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections
            .read()
            .map(|connections| connections.contains_key(&id))
            .unwrap_or(false)
    }

    /// Number of currently open connections
    pub fn count(&self) -> usize {
        self.connections
            .read()
            .map(|connections| connections.len())
            .unwrap_or(0)
    }

    /// Connections accepted since startup
    pub fn total_accepted(&self) -> u64 {
        self.total_accepted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSink for ConnectionRegistry {
    async fn deliver(&self, to: ConnectionId, event: ServerEvent) -> Result<()> {
        let connections = self
            .connections
            .read()
            .map_err(|_| GameError::Internal {
                message: "Failed to acquire connections lock".to_string(),
            })?;

        let handle = connections
            .get(&to)
            .ok_or(GameError::ConnectionNotFound { connection: to })?;

        debug!("Delivering {} to {}", event.name(), to);
        handle
            .tx
            .send(event)
            .map_err(|_| GameError::ConnectionNotFound { connection: to })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameOver, Winner};

    fn game_over() -> ServerEvent {
        ServerEvent::GameOver(GameOver { winner: Winner::X })
    }

    #[tokio::test]
    async fn test_register_and_deliver() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = registry.register().unwrap();

        assert!(registry.is_connected(id));
        assert_eq!(registry.count(), 1);

        registry.deliver(id, game_over()).await.unwrap();
        assert_eq!(rx.recv().await, Some(game_over()));
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        let unknown = generate_connection_id();

        let err = registry.deliver(unknown, game_over()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<GameError>(),
            Some(&GameError::ConnectionNotFound { connection: unknown })
        );
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.register().unwrap();
        let (_other, _other_rx) = registry.register().unwrap();

        assert!(registry.unregister(id).unwrap());
        assert!(!registry.unregister(id).unwrap());
        assert!(!registry.is_connected(id));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.total_accepted(), 2);
    }
}
