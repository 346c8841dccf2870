//! Matchmaking queue for connections waiting on an opponent
//!
//! Pairing is strictly first-come first-served: every time two players are
//! waiting, the two oldest are removed and matched.

use crate::error::GameError;
use crate::types::{ConnectionId, Mark, Participant, WaitingPlayer};
use crate::utils::current_timestamp;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Two waiting players combined into a new game
#[derive(Debug, Clone, PartialEq)]
pub struct PairedEvent {
    /// First dequeued, plays X and moves first
    pub first: Participant,
    /// Second dequeued, plays O
    pub second: Participant,
}

impl PairedEvent {
    /// Participant whose turn it is when the session opens
    pub fn first_turn(&self) -> ConnectionId {
        self.first.id
    }
}

/// FIFO queue of waiting players
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: VecDeque<WaitingPlayer>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player and pair the two oldest waiters once two are present.
    ///
    /// A connection may only wait once; enqueueing it again is rejected.
    pub fn enqueue(
        &mut self,
        id: ConnectionId,
        name: impl Into<String>,
    ) -> Result<Option<PairedEvent>, GameError> {
        if self.contains(id) {
            return Err(GameError::AlreadyQueued { connection: id });
        }

        self.waiting.push_back(WaitingPlayer {
            id,
            name: name.into(),
            joined_at: current_timestamp(),
        });
        debug!(
            "Connection {} queued - waiting: {}",
            id,
            self.waiting.len()
        );

        if self.waiting.len() < 2 {
            return Ok(None);
        }

        let (first, second) = match (self.waiting.pop_front(), self.waiting.pop_front()) {
            (Some(first), Some(second)) => (first, second),
            _ => {
                return Err(GameError::QueueStateInconsistent {
                    message: "queue reported two waiters but could not dequeue them".to_string(),
                })
            }
        };

        info!(
            "Paired {} ({}) with {} ({}) - still waiting: {}",
            first.id,
            first.name,
            second.id,
            second.name,
            self.waiting.len()
        );

        Ok(Some(PairedEvent {
            first: Participant {
                id: first.id,
                name: first.name,
                mark: Mark::X,
            },
            second: Participant {
                id: second.id,
                name: second.name,
                mark: Mark::O,
            },
        }))
    }

    /// Remove a waiting player, e.g. when its connection closes.
    pub fn remove(&mut self, id: ConnectionId) -> Option<WaitingPlayer> {
        let position = self.waiting.iter().position(|player| player.id == id)?;
        self.waiting.remove(position)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.waiting.iter().any(|player| player.id == id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Snapshot of the waiting players in arrival order
    pub fn waiting(&self) -> Vec<WaitingPlayer> {
        self.waiting.iter().cloned().collect()
    }
}
