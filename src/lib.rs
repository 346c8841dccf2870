//! Tictac Room - realtime two-player tic-tac-toe matchmaking service
//!
//! Players connect over WebSockets, are paired first-come first-served, and
//! play server-authoritative games: the server validates every move, detects
//! wins and draws, and relays state to both participants.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod game;
pub mod lobby;
pub mod metrics;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{GameError, Result};
pub use types::*;

// Re-export key components
pub use coordinator::{GameCoordinator, GameService, Outbound};
pub use game::{evaluate, Board, Outcome};
pub use lobby::MatchmakingQueue;
pub use session::SessionRegistry;
pub use transport::{EventSink, RecordingEventSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
