//! Common types used throughout the game service

use crate::game::board::Board;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle for a live bidirectional connection
pub type ConnectionId = Uuid;

/// Symbol a participant plays as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// Assigned to the first-paired participant, who moves first
    X,
    O,
}

impl Mark {
    /// The other mark
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// A connection that requested a game but has not been paired yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingPlayer {
    pub id: ConnectionId,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

/// One side of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub mark: Mark,
}

/// Winner reported in a `gameover` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "X")]
    X,
    #[serde(rename = "O")]
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::X => write!(f, "X"),
            Winner::O => write!(f, "O"),
            Winner::Draw => write!(f, "draw"),
        }
    }
}

/// Wire Message Types
/// Move request sent by the player whose turn it is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub target: usize,
    pub playingas: Mark,
    pub opponent_id: ConnectionId,
}

/// Sent to each participant individually when a session is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    pub player_name: String,
    pub opponent_name: String,
    pub player_id: ConnectionId,
    pub opponent_id: ConnectionId,
    pub playingas: Mark,
}

/// Relay of an accepted move to the opponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRelay {
    pub target: usize,
    pub playingas: Mark,
}

/// Terminal notification for both participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOver {
    pub winner: Winner,
}

/// Explicit rejection of an invalid move (opt-in)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRejected {
    pub target: usize,
    pub reason: String,
}

/// Sent to the remaining participant when the other side disconnects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentLeft {
    pub opponent_id: ConnectionId,
}

/// Events a client can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    FindGame(String),
    Move(MoveRequest),
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::FindGame(_) => "findgame",
            ClientEvent::Move(_) => "move",
        }
    }
}

/// Events the server sends to a single connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    StartGame(GameStarted),
    GameState(Board),
    Move(MoveRelay),
    GameOver(GameOver),
    MoveRejected(MoveRejected),
    OpponentLeft(OpponentLeft),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::StartGame(_) => "startgame",
            ServerEvent::GameState(_) => "gamestate",
            ServerEvent::Move(_) => "move",
            ServerEvent::GameOver(_) => "gameover",
            ServerEvent::MoveRejected(_) => "moverejected",
            ServerEvent::OpponentLeft(_) => "opponentleft",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_move_wire_format() {
        let opponent = Uuid::new_v4();
        let raw = json!({
            "event": "move",
            "data": { "target": 4, "playingas": "O", "opponentId": opponent }
        });

        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::Move(MoveRequest {
                target: 4,
                playingas: Mark::O,
                opponent_id: opponent,
            })
        );
    }

    #[test]
    fn test_find_game_wire_format() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"findgame","data":"Alice"}"#).unwrap();
        assert_eq!(event, ClientEvent::FindGame("Alice".to_string()));
        assert_eq!(event.name(), "findgame");
    }

    #[test]
    fn test_start_game_payload_keys() {
        let player_id = Uuid::new_v4();
        let opponent_id = Uuid::new_v4();
        let event = ServerEvent::StartGame(GameStarted {
            player_name: "Alice".to_string(),
            opponent_name: "Bob".to_string(),
            player_id,
            opponent_id,
            playingas: Mark::X,
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "startgame");
        assert_eq!(value["data"]["playerName"], "Alice");
        assert_eq!(value["data"]["opponentName"], "Bob");
        assert_eq!(value["data"]["opponentId"], opponent_id.to_string());
        assert_eq!(value["data"]["playingas"], "X");
    }

    #[test]
    fn test_game_over_winner_values() {
        let draw = serde_json::to_value(ServerEvent::GameOver(GameOver {
            winner: Winner::Draw,
        }))
        .unwrap();
        assert_eq!(draw["data"]["winner"], "draw");

        let win = serde_json::to_value(GameOver {
            winner: Mark::O.into(),
        })
        .unwrap();
        assert_eq!(win["winner"], "O");
    }

    #[test]
    fn test_mark_opponent() {
        assert_eq!(Mark::X.opponent(), Mark::O);
        assert_eq!(Mark::O.opponent(), Mark::X);
    }
}
