//! Outbound event delivery to individual connections

use crate::error::Result;
use crate::types::{ConnectionId, ServerEvent};
use async_trait::async_trait;

/// Capability to send one event to one connection.
///
/// Delivery is fire-and-forget: the coordinator never waits for an
/// acknowledgement from the client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver `event` to the connection `to`
    async fn deliver(&self, to: ConnectionId, event: ServerEvent) -> Result<()>;
}

/// Event sink that records deliveries in memory (for tests and benchmarks)
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    delivered: std::sync::Mutex<Vec<(ConnectionId, ServerEvent)>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries in order
    pub fn delivered(&self) -> Vec<(ConnectionId, ServerEvent)> {
        self.delivered
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events delivered to a single connection, in order
    pub fn delivered_to(&self, id: ConnectionId) -> Vec<ServerEvent> {
        self.delivered()
            .into_iter()
            .filter(|(to, _)| *to == id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Count deliveries with the given wire event name
    pub fn count_events_named(&self, name: &str) -> usize {
        self.delivered()
            .iter()
            .filter(|(_, event)| event.name() == name)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.delivered.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn deliver(&self, to: ConnectionId, event: ServerEvent) -> Result<()> {
        if let Ok(mut events) = self.delivered.lock() {
            events.push((to, event));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameOver, Winner};
    use crate::utils::generate_connection_id;

    #[tokio::test]
    async fn test_recording_sink_filters_by_connection() {
        let sink = RecordingEventSink::new();
        let alice = generate_connection_id();
        let bob = generate_connection_id();
        let event = ServerEvent::GameOver(GameOver {
            winner: Winner::Draw,
        });

        sink.deliver(alice, event.clone()).await.unwrap();
        sink.deliver(bob, event.clone()).await.unwrap();

        assert_eq!(sink.delivered().len(), 2);
        assert_eq!(sink.delivered_to(alice), vec![event]);
        assert_eq!(sink.count_events_named("gameover"), 2);

        sink.clear();
        assert!(sink.delivered().is_empty());
    }
}
