//! Per-connection WebSocket loop
//!
//! The socket is split in two: a send task drains the connection's event
//! channel (plus keepalive pings) into the socket, while the read loop parses
//! frames and hands them to the game service. When the read side ends the
//! connection is unregistered and the game service is told about the
//! disconnect.

use crate::coordinator::service::GameService;
use crate::metrics::MetricsCollector;
use crate::transport::connection::ConnectionRegistry;
use crate::transport::messages::MessageUtils;
use crate::types::{ClientEvent, ConnectionId};
use crate::utils::log_safe_name;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Everything a connection task needs from the running service
#[derive(Clone)]
pub struct ConnectionContext {
    pub game: Arc<GameService>,
    pub connections: Arc<ConnectionRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub max_name_length: usize,
    pub keepalive_interval: Duration,
    /// Fires once when the service begins shutting down
    pub shutdown: broadcast::Sender<()>,
}

/// Drive one accepted WebSocket until either side closes it.
pub async fn serve_connection(socket: WebSocket, ctx: ConnectionContext) {
    // Subscribe before registering so a shutdown during setup is not missed
    let shutdown = ctx.shutdown.subscribe();
    let (id, mut events) = match ctx.connections.register() {
        Ok(registered) => registered,
        Err(e) => {
            error!("Failed to register connection: {}", e);
            return;
        }
    };
    ctx.metrics.record_connection_opened();
    info!("Client {} connected", id);

    let (mut ws_tx, ws_rx) = socket.split();

    let keepalive = ctx.keepalive_interval;
    let send_task = tokio::spawn(async move {
        let mut ping_interval = interval(keepalive);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ping_interval.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let text = match MessageUtils::serialize_server_event(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Dropping {} for {}: {}", event.name(), id, e);
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    read_frames(&ctx, id, ws_rx, shutdown).await;

    if let Err(e) = ctx.connections.unregister(id) {
        warn!("Failed to unregister {}: {}", id, e);
    }
    ctx.game.handle_disconnect(id).await;
    send_task.abort();
    ctx.metrics.record_connection_closed();

    info!("Client {} disconnected", id);
}

/// Read frames until the client goes away or the service shuts down.
async fn read_frames<S, E>(
    ctx: &ConnectionContext,
    id: ConnectionId,
    mut frames: S,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            msg = frames.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(ctx, id, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary frame from {}", id);
                        ctx.metrics.record_message("binary", "invalid_message");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping replies are sent by the WebSocket layer
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket error for {}: {}", id, e);
                        break;
                    }
                }
            }
            _ = shutdown.recv() => {
                debug!("Closing {} for shutdown", id);
                break;
            }
        }
    }
}

/// Parse one text frame and pass it to the game service.
///
/// Malformed frames and rejected moves are logged; the connection stays open.
pub async fn handle_text(ctx: &ConnectionContext, id: ConnectionId, text: &str) {
    let event = match MessageUtils::parse_client_event(text, ctx.max_name_length) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected frame from {}: {}", id, e);
            ctx.metrics.record_message("unknown", e.code());
            return;
        }
    };

    match &event {
        ClientEvent::FindGame(name) => info!(
            "Connection {} looking for a game as {}",
            id,
            log_safe_name(name, ctx.max_name_length)
        ),
        ClientEvent::Move(request) => debug!(
            "Connection {} moves to {} against {}",
            id, request.target, request.opponent_id
        ),
    }

    if let Err(e) = ctx.game.handle_event(id, event).await {
        if e.is_move_rejection() {
            debug!("Move from {} rejected: {}", id, e);
        } else {
            warn!("Event from {} rejected: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mark, ServerEvent};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn context() -> ConnectionContext {
        let metrics =
            Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
        let connections = Arc::new(ConnectionRegistry::new());
        let game = Arc::new(GameService::new(connections.clone(), metrics.clone(), true));
        let (shutdown, _) = broadcast::channel(1);
        ConnectionContext {
            game,
            connections,
            metrics,
            max_name_length: 16,
            keepalive_interval: Duration::from_secs(30),
            shutdown,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_text_frames_reach_registered_connections() {
        let ctx = context();
        let (alice, mut alice_rx) = ctx.connections.register().unwrap();
        let (bob, mut bob_rx) = ctx.connections.register().unwrap();

        handle_text(&ctx, alice, r#"{"event":"findgame","data":"Alice"}"#).await;
        handle_text(&ctx, bob, r#"{"event":"findgame","data":"Bob"}"#).await;

        let alice_events = drain(&mut alice_rx);
        assert_eq!(alice_events.len(), 1);
        match &alice_events[0] {
            ServerEvent::StartGame(started) => {
                assert_eq!(started.opponent_id, bob);
                assert_eq!(started.playingas, Mark::X);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(drain(&mut bob_rx).len(), 1);

        let frame = format!(
            r#"{{"event":"move","data":{{"target":4,"playingas":"X","opponentId":"{}"}}}}"#,
            bob
        );
        handle_text(&ctx, alice, &frame).await;

        let names: Vec<&str> = drain(&mut bob_rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["gamestate", "move"]);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let ctx = context();
        let (alice, mut alice_rx) = ctx.connections.register().unwrap();

        handle_text(&ctx, alice, "{not json").await;
        handle_text(&ctx, alice, r#"{"event":"findgame","data":""}"#).await;

        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(ctx.game.stats().await.players_queued, 0);
        assert_eq!(
            ctx.metrics
                .connections()
                .messages_total
                .with_label_values(&["unknown", "invalid_message"])
                .get(),
            2
        );
    }

    #[tokio::test]
    async fn test_rejected_move_notification_reaches_mover() {
        let ctx = context();
        let (alice, _alice_rx) = ctx.connections.register().unwrap();
        let (bob, mut bob_rx) = ctx.connections.register().unwrap();

        handle_text(&ctx, alice, r#"{"event":"findgame","data":"Alice"}"#).await;
        handle_text(&ctx, bob, r#"{"event":"findgame","data":"Bob"}"#).await;
        drain(&mut bob_rx);

        let frame = format!(
            r#"{{"event":"move","data":{{"target":0,"playingas":"O","opponentId":"{}"}}}}"#,
            alice
        );
        handle_text(&ctx, bob, &frame).await;

        let events = drain(&mut bob_rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "moverejected");
    }

    #[tokio::test]
    async fn test_shutdown_during_setup_closes_connection() {
        let ctx = context();
        let shutdown = ctx.shutdown.subscribe();
        let (alice, _alice_rx) = ctx.connections.register().unwrap();

        // Shutdown fires before the read loop starts polling
        ctx.shutdown.send(()).unwrap();

        let frames = futures::stream::pending::<Result<Message, axum::Error>>();
        tokio::time::timeout(
            Duration::from_secs(1),
            read_frames(&ctx, alice, frames, shutdown),
        )
        .await
        .expect("read loop should stop on shutdown");
    }

    #[tokio::test]
    async fn test_read_frames_until_stream_ends() {
        let ctx = context();
        let shutdown = ctx.shutdown.subscribe();
        let (alice, _alice_rx) = ctx.connections.register().unwrap();

        let frames = futures::stream::iter(vec![
            Ok::<_, axum::Error>(Message::Binary(Bytes::from_static(b"\x01"))),
            Ok(Message::Text(r#"{"event":"findgame","data":"Alice"}"#.into())),
        ]);
        read_frames(&ctx, alice, frames, shutdown).await;

        assert_eq!(ctx.game.stats().await.players_waiting, 1);
        assert_eq!(
            ctx.metrics
                .connections()
                .messages_total
                .with_label_values(&["binary", "invalid_message"])
                .get(),
            1
        );
    }
}
