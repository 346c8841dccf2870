//! Matchmaking for the game service
//!
//! This module holds the waiting queue that pairs anonymous connections
//! into two-player games.

pub mod queue;

// Re-export commonly used types
pub use queue::{MatchmakingQueue, PairedEvent};
