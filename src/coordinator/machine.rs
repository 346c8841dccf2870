//! Event-driven game state machine
//!
//! Each inbound event is a transition over the queue and session registry
//! that returns the outbound events to deliver. Nothing here performs I/O,
//! so a full game can be driven deterministically in tests.

use crate::error::GameError;
use crate::game::board::{evaluate, Outcome};
use crate::lobby::queue::MatchmakingQueue;
use crate::session::registry::{SessionKey, SessionRegistry};
use crate::types::{
    ClientEvent, ConnectionId, GameOver, GameStarted, MoveRelay, MoveRequest, OpponentLeft,
    Participant, ServerEvent, Winner,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// An event addressed to one connection
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn new(to: ConnectionId, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Connected, never asked for a game or its game ended
    Idle,
    WaitingForOpponent,
    InGame(SessionKey),
}

/// Counters about coordinator activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    /// Total find-game requests accepted into the queue
    pub players_queued: u64,
    pub games_started: u64,
    pub games_won: u64,
    pub games_drawn: u64,
    /// Sessions ended because a participant disconnected
    pub games_abandoned: u64,
    pub moves_applied: u64,
    pub moves_rejected: u64,
    /// Current number of sessions in play
    pub active_sessions: usize,
    /// Current number of players waiting for an opponent
    pub players_waiting: usize,
}

/// Owns the matchmaking queue and the session registry
#[derive(Debug, Default)]
pub struct GameCoordinator {
    queue: MatchmakingQueue,
    sessions: SessionRegistry,
    stats: GameStats,
}

impl GameCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch an inbound event from `from`
    pub fn handle(
        &mut self,
        from: ConnectionId,
        event: ClientEvent,
    ) -> Result<Vec<Outbound>, GameError> {
        match event {
            ClientEvent::FindGame(name) => self.find_game(from, name),
            ClientEvent::Move(request) => self.play_move(from, request),
        }
    }

    /// Queue `from` for a game, starting a session when an opponent is available.
    pub fn find_game(
        &mut self,
        from: ConnectionId,
        name: String,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.sessions.session_of(from).is_some() {
            return Err(GameError::AlreadyInGame { connection: from });
        }

        let paired = self.queue.enqueue(from, name)?;
        self.stats.players_queued += 1;
        let paired = match paired {
            Some(paired) => paired,
            None => return Ok(Vec::new()),
        };

        let first = paired.first.clone();
        let second = paired.second.clone();
        let key = self.sessions.create_from_pairing(paired)?;
        self.stats.games_started += 1;

        info!(
            "Game {} started - {} ({}) vs {} ({})",
            key, first.name, first.mark, second.name, second.mark
        );

        Ok(vec![
            Outbound::new(first.id, ServerEvent::StartGame(start_payload(&first, &second))),
            Outbound::new(second.id, ServerEvent::StartGame(start_payload(&second, &first))),
        ])
    }

    /// Validate and apply a move, then report the new state or the result.
    pub fn play_move(
        &mut self,
        from: ConnectionId,
        request: MoveRequest,
    ) -> Result<Vec<Outbound>, GameError> {
        let result = self.try_play_move(from, &request);
        match &result {
            Ok(_) => self.stats.moves_applied += 1,
            Err(e) => {
                self.stats.moves_rejected += 1;
                debug!("Move by {} to {} dropped: {}", from, request.target, e);
            }
        }
        result
    }

    fn try_play_move(
        &mut self,
        from: ConnectionId,
        request: &MoveRequest,
    ) -> Result<Vec<Outbound>, GameError> {
        let key = SessionKey::new(from, request.opponent_id);
        let session = self
            .sessions
            .get(&key)
            .ok_or_else(|| GameError::SessionNotFound {
                session: key.to_string(),
            })?;

        let mark = session
            .mark_of(from)
            .ok_or_else(|| GameError::NotAParticipant {
                connection: from,
                session: key.to_string(),
            })?;
        if mark != request.playingas {
            warn!(
                "Connection {} claimed mark {} but plays {} in session {}",
                from, request.playingas, mark, key
            );
        }
        let participants = session.participants().clone();

        let board = self.sessions.apply_move(&key, from, request.target, mark)?;

        let outcome = evaluate(&board);
        let winner = match outcome {
            Outcome::Win(mark) => Some(Winner::from(mark)),
            Outcome::Draw => Some(Winner::Draw),
            Outcome::None => None,
        };

        if let Some(winner) = winner {
            self.sessions.destroy(&key);
            match winner {
                Winner::Draw => self.stats.games_drawn += 1,
                _ => self.stats.games_won += 1,
            }
            info!(
                "Game {} over after {} moves - winner: {}",
                key,
                board.occupied(),
                winner
            );
            return Ok(participants
                .iter()
                .map(|p| Outbound::new(p.id, ServerEvent::GameOver(GameOver { winner })))
                .collect());
        }

        let opponent = participants
            .iter()
            .find(|p| p.id != from)
            .map(|p| p.id)
            .ok_or_else(|| GameError::Internal {
                message: format!("session {} has no opponent for {}", key, from),
            })?;
        self.sessions.set_turn(&key, opponent)?;

        let mut outbound: Vec<Outbound> = participants
            .iter()
            .map(|p| Outbound::new(p.id, ServerEvent::GameState(board)))
            .collect();
        outbound.push(Outbound::new(
            opponent,
            ServerEvent::Move(MoveRelay {
                target: request.target,
                playingas: mark,
            }),
        ));
        Ok(outbound)
    }

    /// Clean up after a closed connection: leave the queue, or abort its game
    /// and tell the opponent.
    pub fn disconnect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        if self.queue.remove(id).is_some() {
            info!("Connection {} left the matchmaking queue", id);
            return Vec::new();
        }

        let key = match self.sessions.session_of(id) {
            Some(session) => session.key(),
            None => return Vec::new(),
        };
        let session = match self.sessions.destroy(&key) {
            Some(session) => session,
            None => return Vec::new(),
        };
        self.stats.games_abandoned += 1;

        match session.opponent_of(id) {
            Some(opponent) => {
                info!(
                    "Game {} abandoned by {} - notifying {}",
                    key, id, opponent.id
                );
                vec![Outbound::new(
                    opponent.id,
                    ServerEvent::OpponentLeft(OpponentLeft { opponent_id: id }),
                )]
            }
            None => Vec::new(),
        }
    }

    pub fn player_state(&self, id: ConnectionId) -> PlayerState {
        if let Some(session) = self.sessions.session_of(id) {
            PlayerState::InGame(session.key())
        } else if self.queue.contains(id) {
            PlayerState::WaitingForOpponent
        } else {
            PlayerState::Idle
        }
    }

    pub fn stats(&self) -> GameStats {
        GameStats {
            active_sessions: self.sessions.len(),
            players_waiting: self.queue.len(),
            ..self.stats.clone()
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }
}

fn start_payload(player: &Participant, opponent: &Participant) -> GameStarted {
    GameStarted {
        player_name: player.name.clone(),
        opponent_name: opponent.name.clone(),
        player_id: player.id,
        opponent_id: opponent.id,
        playingas: player.mark,
    }
}
