//! Session registry: exclusive owner of every in-progress game
//!
//! Sessions are keyed by a canonical pair of connection ids, so a lookup
//! succeeds no matter which participant initiates it. The registry validates
//! and writes moves but leaves turn flipping and outcome evaluation to the
//! coordinator.

use crate::error::GameError;
use crate::game::board::{Board, CELL_COUNT};
use crate::lobby::queue::PairedEvent;
use crate::types::{ConnectionId, Mark, Participant};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Order-independent identifier for the session between two connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(ConnectionId, ConnectionId);

impl SessionKey {
    /// Canonical key for a pair; argument order does not matter.
    pub fn new(a: ConnectionId, b: ConnectionId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.0 == id || self.1 == id
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// Result of a validated write
pub type MoveResult = Result<Board, GameError>;

/// One game between exactly two participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    key: SessionKey,
    participants: [Participant; 2],
    board: Board,
    turn: ConnectionId,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Participants in pairing order (X first)
    pub fn participants(&self) -> &[Participant; 2] {
        &self.participants
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Connection currently allowed to move
    pub fn turn(&self) -> ConnectionId {
        self.turn
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn participant(&self, id: ConnectionId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// The other side of the session from `id`
    pub fn opponent_of(&self, id: ConnectionId) -> Option<&Participant> {
        if self.participants[0].id == id {
            Some(&self.participants[1])
        } else if self.participants[1].id == id {
            Some(&self.participants[0])
        } else {
            None
        }
    }

    pub fn mark_of(&self, id: ConnectionId) -> Option<Mark> {
        self.participant(id).map(|p| p.mark)
    }
}

/// Owns all active sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionKey, Session>,
    by_connection: HashMap<ConnectionId, SessionKey>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a freshly paired couple with an empty board.
    pub fn create(
        &mut self,
        first: Participant,
        second: Participant,
        first_turn: ConnectionId,
    ) -> Result<SessionKey, GameError> {
        let key = SessionKey::new(first.id, second.id);

        for id in [first.id, second.id] {
            if self.by_connection.contains_key(&id) {
                return Err(GameError::AlreadyInGame { connection: id });
            }
        }
        if first_turn != first.id && first_turn != second.id {
            return Err(GameError::NotAParticipant {
                connection: first_turn,
                session: key.to_string(),
            });
        }

        self.by_connection.insert(first.id, key);
        self.by_connection.insert(second.id, key);
        self.sessions.insert(
            key,
            Session {
                key,
                participants: [first, second],
                board: Board::new(),
                turn: first_turn,
                created_at: current_timestamp(),
            },
        );

        info!("Created session {} - active sessions: {}", key, self.sessions.len());
        Ok(key)
    }

    /// Convenience wrapper around [`SessionRegistry::create`] for a pairing
    pub fn create_from_pairing(&mut self, paired: PairedEvent) -> Result<SessionKey, GameError> {
        let first_turn = paired.first_turn();
        self.create(paired.first, paired.second, first_turn)
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Look up the session shared by two connections, in either order
    pub fn find(&self, a: ConnectionId, b: ConnectionId) -> Option<&Session> {
        self.sessions.get(&SessionKey::new(a, b))
    }

    /// Session a connection currently belongs to
    pub fn session_of(&self, id: ConnectionId) -> Option<&Session> {
        self.by_connection
            .get(&id)
            .and_then(|key| self.sessions.get(key))
    }

    /// Validate and write a move. Does not flip the turn or evaluate the board.
    pub fn apply_move(
        &mut self,
        key: &SessionKey,
        mover: ConnectionId,
        index: usize,
        mark: Mark,
    ) -> MoveResult {
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| GameError::SessionNotFound {
                session: key.to_string(),
            })?;

        if session.turn != mover {
            return Err(GameError::NotYourTurn { connection: mover });
        }
        if index >= CELL_COUNT {
            return Err(GameError::InvalidIndex { index });
        }
        if !session.board.is_empty_at(index) {
            return Err(GameError::CellOccupied { index });
        }

        session.board.place(index, mark);
        debug!("Session {} - {} placed {} at {}", key, mover, mark, index);
        Ok(session.board)
    }

    /// Hand the turn to `participant`
    pub fn set_turn(
        &mut self,
        key: &SessionKey,
        participant: ConnectionId,
    ) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| GameError::SessionNotFound {
                session: key.to_string(),
            })?;

        if !key.contains(participant) {
            return Err(GameError::NotAParticipant {
                connection: participant,
                session: key.to_string(),
            });
        }

        session.turn = participant;
        Ok(())
    }

    /// Remove a session. Destroying a missing session is a no-op.
    pub fn destroy(&mut self, key: &SessionKey) -> Option<Session> {
        let session = self.sessions.remove(key)?;
        for participant in &session.participants {
            self.by_connection.remove(&participant.id);
        }
        info!(
            "Destroyed session {} - active sessions: {}",
            key,
            self.sessions.len()
        );
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
