//! Game service: the single critical section around the coordinator
//!
//! Every inbound event and every disconnect runs under one async mutex, and
//! the resulting events are delivered before the lock is released. Events
//! from one transition therefore reach each connection in the order they
//! were produced, and no two transitions interleave.

use crate::coordinator::machine::{GameCoordinator, GameStats, Outbound, PlayerState};
use crate::error::GameError;
use crate::metrics::MetricsCollector;
use crate::transport::publisher::EventSink;
use crate::types::{ClientEvent, ConnectionId, MoveRejected, ServerEvent};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared entry point for all connections
pub struct GameService {
    coordinator: Mutex<GameCoordinator>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<MetricsCollector>,
    notify_rejected_moves: bool,
}

impl GameService {
    pub fn new(
        sink: Arc<dyn EventSink>,
        metrics: Arc<MetricsCollector>,
        notify_rejected_moves: bool,
    ) -> Self {
        Self {
            coordinator: Mutex::new(GameCoordinator::new()),
            sink,
            metrics,
            notify_rejected_moves,
        }
    }

    /// Apply an inbound event and deliver whatever it produces.
    ///
    /// Rejections are returned for logging; they never close the connection.
    pub async fn handle_event(
        &self,
        from: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), GameError> {
        let timer = self.metrics.start_timer();
        let event_name = event.name();
        let move_target = match &event {
            ClientEvent::Move(request) => Some(request.target),
            ClientEvent::FindGame(_) => None,
        };

        let mut coordinator = self.coordinator.lock().await;
        let session_started_at = coordinator
            .sessions()
            .session_of(from)
            .map(|session| session.created_at());

        let result = coordinator.handle(from, event);
        let outcome = match result {
            Ok(outbound) => {
                match move_target {
                    Some(_) => self.metrics.record_move("applied"),
                    None => self.metrics.record_player_queued(),
                }
                self.record_transition(&outbound, session_started_at);
                self.deliver_all(outbound).await;
                Ok(())
            }
            Err(err) => {
                if let Some(target) = move_target {
                    self.metrics.record_move(err.code());
                    if self.notify_rejected_moves {
                        let rejection = ServerEvent::MoveRejected(MoveRejected {
                            target,
                            reason: err.code().to_string(),
                        });
                        self.deliver_all(vec![Outbound::new(from, rejection)]).await;
                    }
                }
                Err(err)
            }
        };
        self.metrics.update_from_game_stats(&coordinator.stats());
        drop(coordinator);

        let status = match &outcome {
            Ok(()) => "ok",
            Err(err) => err.code(),
        };
        self.metrics.record_message(event_name, status);
        self.metrics
            .record_event_processing(event_name, timer.stop());
        outcome
    }

    /// Clean up after a closed connection
    pub async fn handle_disconnect(&self, id: ConnectionId) {
        let mut coordinator = self.coordinator.lock().await;
        let outbound = coordinator.disconnect(id);

        if outbound
            .iter()
            .any(|o| matches!(o.event, ServerEvent::OpponentLeft(_)))
        {
            self.metrics.record_game_abandoned();
        }
        self.deliver_all(outbound).await;
        self.metrics.update_from_game_stats(&coordinator.stats());
    }

    /// Snapshot of coordinator counters
    pub async fn stats(&self) -> GameStats {
        self.coordinator.lock().await.stats()
    }

    pub async fn player_state(&self, id: ConnectionId) -> PlayerState {
        self.coordinator.lock().await.player_state(id)
    }

    pub fn notify_rejected_moves(&self) -> bool {
        self.notify_rejected_moves
    }

    fn record_transition(&self, outbound: &[Outbound], session_started_at: Option<DateTime<Utc>>) {
        if outbound
            .iter()
            .any(|o| matches!(o.event, ServerEvent::StartGame(_)))
        {
            self.metrics.record_game_started();
        }

        let winner = outbound.iter().find_map(|o| match &o.event {
            ServerEvent::GameOver(game_over) => Some(game_over.winner),
            _ => None,
        });
        if let Some(winner) = winner {
            self.metrics.record_game_finished(winner);
            if let Some(started_at) = session_started_at {
                if let Ok(duration) = (current_timestamp() - started_at).to_std() {
                    self.metrics.record_game_duration(duration);
                }
            }
        }
    }

    async fn deliver_all(&self, outbound: Vec<Outbound>) {
        for Outbound { to, event } in outbound {
            let name = event.name();
            match self.sink.deliver(to, event).await {
                Ok(()) => debug!("Sent {} to {}", name, to),
                // The recipient may have closed between the transition and delivery;
                // its own disconnect will clean up.
                Err(e) => warn!("Failed to deliver {} to {}: {}", name, to, e),
            }
        }
    }
}

impl std::fmt::Debug for GameService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameService")
            .field("notify_rejected_moves", &self.notify_rejected_moves)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::publisher::{MockEventSink, RecordingEventSink};
    use crate::types::{Mark, MoveRequest};
    use crate::utils::generate_connection_id;
    use mockall::predicate::*;

    fn metrics() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"))
    }

    fn recording_service(notify: bool) -> (GameService, Arc<RecordingEventSink>) {
        let sink = Arc::new(RecordingEventSink::new());
        let service = GameService::new(sink.clone(), metrics(), notify);
        (service, sink)
    }

    async fn start_game(service: &GameService) -> (ConnectionId, ConnectionId) {
        let alice = generate_connection_id();
        let bob = generate_connection_id();
        service
            .handle_event(alice, ClientEvent::FindGame("Alice".to_string()))
            .await
            .unwrap();
        service
            .handle_event(bob, ClientEvent::FindGame("Bob".to_string()))
            .await
            .unwrap();
        (alice, bob)
    }

    fn mv(target: usize, playingas: Mark, opponent_id: ConnectionId) -> ClientEvent {
        ClientEvent::Move(MoveRequest {
            target,
            playingas,
            opponent_id,
        })
    }

    #[tokio::test]
    async fn test_pairing_delivers_start_to_both() {
        let mut sink = MockEventSink::new();
        sink.expect_deliver()
            .withf(|_, event| event.name() == "startgame")
            .times(2)
            .returning(|_, _| Ok(()));

        let service = GameService::new(Arc::new(sink), metrics(), false);
        start_game(&service).await;

        assert_eq!(service.stats().await.games_started, 1);
    }

    #[tokio::test]
    async fn test_first_player_receives_nothing() {
        let mut sink = MockEventSink::new();
        sink.expect_deliver().never();

        let service = GameService::new(Arc::new(sink), metrics(), false);
        let alice = generate_connection_id();
        service
            .handle_event(alice, ClientEvent::FindGame("Alice".to_string()))
            .await
            .unwrap();

        assert_eq!(
            service.player_state(alice).await,
            PlayerState::WaitingForOpponent
        );
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_fail_event() {
        let mut sink = MockEventSink::new();
        sink.expect_deliver()
            .times(2)
            .returning(|to, _| Err(GameError::ConnectionNotFound { connection: to }.into()));

        let service = GameService::new(Arc::new(sink), metrics(), false);
        start_game(&service).await;
    }

    #[tokio::test]
    async fn test_rejected_move_is_silent_by_default() {
        let (service, sink) = recording_service(false);
        let (alice, bob) = start_game(&service).await;
        sink.clear();

        let err = service.handle_event(bob, mv(0, Mark::O, alice)).await.unwrap_err();
        assert_eq!(err, GameError::NotYourTurn { connection: bob });
        assert!(sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_move_notifies_when_enabled() {
        let mut sink = MockEventSink::new();
        sink.expect_deliver()
            .withf(|_, event| event.name() == "startgame")
            .times(2)
            .returning(|_, _| Ok(()));
        sink.expect_deliver()
            .withf(|_, event| event.name() == "moverejected")
            .times(1)
            .returning(|_, _| Ok(()));

        let service = GameService::new(Arc::new(sink), metrics(), true);
        let (alice, bob) = start_game(&service).await;

        let err = service.handle_event(bob, mv(4, Mark::O, alice)).await.unwrap_err();
        assert_eq!(err.code(), "not_your_turn");
    }

    #[tokio::test]
    async fn test_rejection_payload_names_reason() {
        let (service, sink) = recording_service(true);
        let (alice, bob) = start_game(&service).await;

        service.handle_event(alice, mv(4, Mark::X, bob)).await.unwrap();
        sink.clear();
        service
            .handle_event(bob, mv(4, Mark::O, alice))
            .await
            .unwrap_err();

        assert_eq!(
            sink.delivered_to(bob),
            vec![ServerEvent::MoveRejected(MoveRejected {
                target: 4,
                reason: "cell_occupied".to_string(),
            })]
        );
        assert!(sink.delivered_to(alice).is_empty());
    }

    #[tokio::test]
    async fn test_move_events_arrive_in_order() {
        let (service, sink) = recording_service(false);
        let (alice, bob) = start_game(&service).await;
        sink.clear();

        service.handle_event(alice, mv(0, Mark::X, bob)).await.unwrap();

        let names: Vec<&str> = sink
            .delivered_to(bob)
            .iter()
            .map(|event| event.name())
            .collect();
        assert_eq!(names, vec!["gamestate", "move"]);
    }

    #[tokio::test]
    async fn test_disconnect_notifies_opponent() {
        let sink = Arc::new(RecordingEventSink::new());
        let service_metrics = metrics();
        let service = GameService::new(sink.clone(), service_metrics.clone(), false);
        let (alice, bob) = start_game(&service).await;
        sink.clear();

        service.handle_disconnect(bob).await;

        assert_eq!(sink.delivered_to(alice).len(), 1);
        assert_eq!(sink.count_events_named("opponentleft"), 1);
        assert_eq!(service.player_state(alice).await, PlayerState::Idle);
        assert_eq!(service.stats().await.games_abandoned, 1);
        assert_eq!(
            service_metrics
                .game()
                .games_finished_total
                .with_label_values(&["abandoned"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_winning_game_records_metrics() {
        let sink = Arc::new(RecordingEventSink::new());
        let service_metrics = metrics();
        let service = GameService::new(sink.clone(), service_metrics.clone(), false);
        let (alice, bob) = start_game(&service).await;

        for (mover, opponent, target, mark) in [
            (alice, bob, 0, Mark::X),
            (bob, alice, 4, Mark::O),
            (alice, bob, 1, Mark::X),
            (bob, alice, 8, Mark::O),
            (alice, bob, 2, Mark::X),
        ] {
            service
                .handle_event(mover, mv(target, mark, opponent))
                .await
                .unwrap();
        }

        assert_eq!(sink.count_events_named("gameover"), 2);
        let game = service_metrics.game();
        assert_eq!(game.games_finished_total.with_label_values(&["x"]).get(), 1);
        assert_eq!(game.moves_total.with_label_values(&["applied"]).get(), 5);
        assert_eq!(game.active_sessions.get(), 0);
        assert_eq!(
            service_metrics
                .connections()
                .messages_total
                .with_label_values(&["move", "ok"])
                .get(),
            5
        );
    }

    #[tokio::test]
    async fn test_deliver_targets_the_opponent() {
        let mut sink = MockEventSink::new();
        let alice = generate_connection_id();
        let bob = generate_connection_id();
        sink.expect_deliver()
            .with(eq(alice), always())
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_deliver()
            .with(eq(bob), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let service = GameService::new(Arc::new(sink), metrics(), false);
        service
            .handle_event(alice, ClientEvent::FindGame("Alice".to_string()))
            .await
            .unwrap();
        service
            .handle_event(bob, ClientEvent::FindGame("Bob".to_string()))
            .await
            .unwrap();
    }
}
