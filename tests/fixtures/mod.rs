//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tictac_room::coordinator::GameService;
use tictac_room::error::GameError;
use tictac_room::metrics::MetricsCollector;
use tictac_room::transport::{ConnectionRegistry, RecordingEventSink};
use tictac_room::types::{ClientEvent, ConnectionId, Mark, MoveRequest, ServerEvent};
use tictac_room::utils::generate_connection_id;
use tokio::sync::mpsc::UnboundedReceiver;

/// Game service wired to an in-memory recording sink
pub struct TestSystem {
    pub game: Arc<GameService>,
    pub sink: Arc<RecordingEventSink>,
    pub metrics: Arc<MetricsCollector>,
}

pub fn create_test_system(notify_rejected_moves: bool) -> TestSystem {
    let sink = Arc::new(RecordingEventSink::new());
    let metrics = Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
    let game = Arc::new(GameService::new(
        sink.clone(),
        metrics.clone(),
        notify_rejected_moves,
    ));

    TestSystem {
        game,
        sink,
        metrics,
    }
}

impl TestSystem {
    pub async fn find_game(&self, id: ConnectionId, name: &str) -> Result<(), GameError> {
        self.game.handle_event(id, find_game(name)).await
    }

    /// Queue two fresh connections and return them in pairing order (X, O)
    pub async fn start_game(&self, first: &str, second: &str) -> (ConnectionId, ConnectionId) {
        let x = generate_connection_id();
        let o = generate_connection_id();
        self.find_game(x, first).await.expect("first findgame");
        self.find_game(o, second).await.expect("second findgame");
        (x, o)
    }

    pub async fn play(
        &self,
        mover: ConnectionId,
        opponent: ConnectionId,
        target: usize,
        mark: Mark,
    ) -> Result<(), GameError> {
        self.game
            .handle_event(mover, move_event(target, mark, opponent))
            .await
    }

    pub fn event_names_for(&self, id: ConnectionId) -> Vec<&'static str> {
        self.sink
            .delivered_to(id)
            .iter()
            .map(|event| event.name())
            .collect()
    }
}

/// Game service delivering through real connection channels
pub struct ConnectedSystem {
    pub game: Arc<GameService>,
    pub connections: Arc<ConnectionRegistry>,
}

pub fn create_connected_system() -> ConnectedSystem {
    let connections = Arc::new(ConnectionRegistry::new());
    let metrics = Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
    let game = Arc::new(GameService::new(connections.clone(), metrics, false));

    ConnectedSystem { game, connections }
}

pub fn find_game(name: &str) -> ClientEvent {
    ClientEvent::FindGame(name.to_string())
}

pub fn move_event(target: usize, playingas: Mark, opponent_id: ConnectionId) -> ClientEvent {
    ClientEvent::Move(MoveRequest {
        target,
        playingas,
        opponent_id,
    })
}

/// Everything currently buffered for a connection
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
