//! Error types for the game service
//!
//! Domain failures are modelled by [`GameError`]; service and startup code
//! uses the anyhow-based [`Result`] alias for consistent propagation.

use crate::types::ConnectionId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for matchmaking and move validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Session not found: {session}")]
    SessionNotFound { session: String },

    #[error("Not your turn: {connection}")]
    NotYourTurn { connection: ConnectionId },

    #[error("Cell {index} is already occupied")]
    CellOccupied { index: usize },

    #[error("Cell index {index} is out of range")]
    InvalidIndex { index: usize },

    #[error("Matchmaking queue is inconsistent: {message}")]
    QueueStateInconsistent { message: String },

    #[error("Connection {connection} is already waiting for an opponent")]
    AlreadyQueued { connection: ConnectionId },

    #[error("Connection {connection} is already in a game")]
    AlreadyInGame { connection: ConnectionId },

    #[error("Connection {connection} is not a participant of session {session}")]
    NotAParticipant {
        connection: ConnectionId,
        session: String,
    },

    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Connection not found: {connection}")]
    ConnectionNotFound { connection: ConnectionId },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl GameError {
    /// Stable machine-readable code, used as the rejection reason on the wire
    /// and as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound { .. } => "session_not_found",
            GameError::NotYourTurn { .. } => "not_your_turn",
            GameError::CellOccupied { .. } => "cell_occupied",
            GameError::InvalidIndex { .. } => "invalid_index",
            GameError::QueueStateInconsistent { .. } => "queue_state_inconsistent",
            GameError::AlreadyQueued { .. } => "already_queued",
            GameError::AlreadyInGame { .. } => "already_in_game",
            GameError::NotAParticipant { .. } => "not_a_participant",
            GameError::InvalidMessage { .. } => "invalid_message",
            GameError::ConnectionNotFound { .. } => "connection_not_found",
            GameError::Configuration { .. } => "configuration",
            GameError::Internal { .. } => "internal",
        }
    }

    /// Whether this error is a move-validation failure
    pub fn is_move_rejection(&self) -> bool {
        matches!(
            self,
            GameError::SessionNotFound { .. }
                | GameError::NotYourTurn { .. }
                | GameError::CellOccupied { .. }
                | GameError::InvalidIndex { .. }
        )
    }
}
