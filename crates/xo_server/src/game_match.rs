//! Per-match state machine: seating, turn arbitration and termination.
//!
//! ```text
//! Waiting ──admit──▶ InProgress ──winning/final move──▶ Finished(Won | Draw)
//!    │                   │
//!    └──leave/expire──▶ Abandoned ◀──leave/send failure──┘
//! ```
//!
//! `Finished` and `Abandoned` are absorbing. A `Match` is always used behind
//! a lock; every method here runs to completion without awaiting.

use crate::broadcaster;
use crate::connection::ConnectionHandle;
use crate::error::{MoveRejection, SessionError, TransportError};
use crate::protocol::{MatchSnapshot, PlayerView, ResultTag, ServerMessage, Turn};
use crate::registry::MatchId;
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use xo_rules::{Board, Outcome, Position, Symbol, rules};

/// A connected player seated in a match.
#[derive(Debug, Clone, new)]
pub struct Participant {
    name: String,
    symbol: Symbol,
    handle: ConnectionHandle,
}

impl Participant {
    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assigned symbol.
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Handle to the participant's connection.
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

/// One of the two seats in a match.
#[derive(Debug, Clone, Default)]
pub enum Slot {
    /// Nobody sits here.
    #[default]
    Empty,
    /// Seat is taken.
    Occupied(Participant),
}

impl Slot {
    /// The seated participant, if any.
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(participant) => Some(participant),
        }
    }

    /// Returns true if a participant is seated.
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }
}

/// Why a match ended without a game result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbandonCause {
    /// This symbol's connection was lost.
    Disconnected(Symbol),
    /// Nobody joined before the waiting timeout.
    Expired,
}

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Creator seated, waiting for an opponent.
    Waiting,
    /// Both seats taken, moves accepted.
    InProgress,
    /// Game reached a result.
    Finished(Outcome),
    /// Game ended early.
    Abandoned(AbandonCause),
}

impl Phase {
    /// Finished or abandoned.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished(_) | Phase::Abandoned(_))
    }
}

/// What an accepted move did to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Turn passed to the opponent.
    Continued,
    /// The move ended the game.
    Finished(Outcome),
    /// The move was applied but delivering it failed, ending the match.
    Abandoned(AbandonCause),
}

impl MoveOutcome {
    /// Returns true if the match is over after this move.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MoveOutcome::Continued)
    }
}

/// One two-player game.
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    slots: [Slot; 2],
    board: Board,
    turn: Symbol,
    phase: Phase,
    history: Vec<(Symbol, Position)>,
    created_at: Instant,
}

fn seat(symbol: Symbol) -> usize {
    match symbol {
        Symbol::X => 0,
        Symbol::O => 1,
    }
}

impl Match {
    /// Creates a waiting match with the creator seated as X.
    #[instrument(skip(handle))]
    pub fn new(id: MatchId, creator: String, handle: ConnectionHandle) -> Self {
        info!("Creating match");
        Self {
            id,
            slots: [
                Slot::Occupied(Participant::new(creator, Symbol::X, handle)),
                Slot::Empty,
            ],
            board: Board::new(),
            turn: Symbol::X,
            phase: Phase::Waiting,
            history: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// Match id.
    pub fn id(&self) -> &MatchId {
        &self.id
    }

    /// Current board.
    pub fn board(&self) -> Board {
        self.board
    }

    /// Symbol allowed to move next.
    pub fn turn(&self) -> Symbol {
        self.turn
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Accepted moves in order.
    pub fn history(&self) -> &[(Symbol, Position)] {
        &self.history
    }

    /// When the match was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Participant holding `symbol`, if seated.
    pub fn participant(&self, symbol: Symbol) -> Option<&Participant> {
        self.slots[seat(symbol)].participant()
    }

    /// Number of seated participants.
    pub fn participant_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_occupied()).count()
    }

    /// Full state for clients.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id.clone(),
            board: self.board,
            turn: self.turn,
            phase: self.phase,
            players: self
                .slots
                .iter()
                .filter_map(Slot::participant)
                .map(|p| PlayerView {
                    name: p.name().to_string(),
                    symbol: p.symbol(),
                })
                .collect(),
            moves: self.history.len(),
        }
    }

    /// Tells the creator the match exists.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn announce_created(&mut self) -> Result<(), TransportError> {
        let Some(creator) = self.participant(Symbol::X) else {
            return Err(TransportError::Disconnected(Symbol::X));
        };
        let message = ServerMessage::MatchCreated {
            match_id: self.id.clone(),
            symbol: Symbol::X,
        };
        let result = broadcaster::send_to(creator, message);
        if let Err(err) = result {
            warn!(error = %err, "Creator unreachable");
            self.abandon(AbandonCause::Disconnected(Symbol::X));
        }
        result
    }

    /// Seats a second participant as O and starts the game.
    ///
    /// Terminal matches report `NotFound` so a finished id can never be
    /// rejoined; a match that already has an opponent reports `Full`.
    #[instrument(skip(self, handle), fields(match_id = %self.id))]
    pub fn admit(&mut self, name: String, handle: ConnectionHandle) -> Result<Symbol, SessionError> {
        if self.phase.is_terminal() {
            debug!(phase = ?self.phase, "Join refused, match is over");
            return Err(SessionError::NotFound);
        }
        if self.phase != Phase::Waiting || self.slots[seat(Symbol::O)].is_occupied() {
            warn!("Join refused, match already has 2 players");
            return Err(SessionError::Full);
        }

        let creator = self
            .participant(Symbol::X)
            .map(|p| p.name().to_string())
            .unwrap_or_default();
        self.slots[seat(Symbol::O)] =
            Slot::Occupied(Participant::new(name.clone(), Symbol::O, handle));
        self.phase = Phase::InProgress;
        info!(joiner = %name, %creator, "Match paired");

        let snapshot = self.snapshot();
        let mut failures = Vec::new();
        if let Some(x) = self.participant(Symbol::X) {
            let message = ServerMessage::OpponentJoined {
                opponent: name,
                snapshot: snapshot.clone(),
            };
            failures.extend(broadcaster::send_to(x, message).err());
        }
        if let Some(o) = self.participant(Symbol::O) {
            let message = ServerMessage::Joined {
                match_id: self.id.clone(),
                symbol: Symbol::O,
                opponent: creator,
                snapshot,
            };
            failures.extend(broadcaster::send_to(o, message).err());
        }
        self.fail_transport(&failures);
        Ok(Symbol::O)
    }

    /// Validates and applies a move from `submitter`.
    ///
    /// Checks run in a fixed order: phase, turn, range, occupancy. A rejected
    /// move leaves the board and turn untouched and is reported to the
    /// submitter only.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn submit_move(
        &mut self,
        submitter: Symbol,
        turn: Turn,
    ) -> Result<MoveOutcome, MoveRejection> {
        match self.validate(submitter, turn) {
            Ok(position) => Ok(self.apply(submitter, position)),
            Err(rejection) => {
                warn!(%submitter, row = turn.row, col = turn.col, %rejection, "Move rejected");
                self.reject(submitter, turn, rejection);
                Err(rejection)
            }
        }
    }

    fn validate(&self, submitter: Symbol, turn: Turn) -> Result<Position, MoveRejection> {
        if self.phase != Phase::InProgress {
            return Err(MoveRejection::InvalidPhase);
        }
        if submitter != self.turn || turn.symbol.is_some_and(|claimed| claimed != submitter) {
            return Err(MoveRejection::NotYourTurn);
        }
        let position = Position::new(turn.row, turn.col).ok_or(MoveRejection::OutOfRange)?;
        if rules::is_cell_occupied(&self.board, position) {
            return Err(MoveRejection::CellOccupied);
        }
        Ok(position)
    }

    fn reject(&mut self, submitter: Symbol, turn: Turn, reason: MoveRejection) {
        let Some(participant) = self.participant(submitter) else {
            return;
        };
        let message = ServerMessage::MoveRejected {
            reason,
            row: turn.row,
            col: turn.col,
        };
        if let Err(err) = broadcaster::send_to(participant, message) {
            self.fail_transport(&[err]);
        }
    }

    fn apply(&mut self, symbol: Symbol, position: Position) -> MoveOutcome {
        self.board = self.board.with_mark(position, symbol);
        self.history.push((symbol, position));
        debug!(
            %symbol,
            row = position.row(),
            col = position.col(),
            moves = self.history.len(),
            "Move applied"
        );

        if let Some(outcome) = rules::evaluate(&self.board) {
            self.finish(outcome);
            return MoveOutcome::Finished(outcome);
        }

        self.turn = symbol.opponent();
        let message = ServerMessage::MoveApplied {
            symbol,
            position,
            snapshot: self.snapshot(),
        };
        let failures = broadcaster::broadcast(&self.slots, &message);
        self.fail_transport(&failures);
        match self.phase {
            Phase::Abandoned(cause) => MoveOutcome::Abandoned(cause),
            _ => MoveOutcome::Continued,
        }
    }

    /// Sends a snapshot to `symbol` only.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn send_snapshot(&mut self, symbol: Symbol) {
        let Some(participant) = self.participant(symbol) else {
            return;
        };
        let message = ServerMessage::Snapshot {
            snapshot: self.snapshot(),
        };
        if let Err(err) = broadcaster::send_to(participant, message) {
            self.fail_transport(&[err]);
        }
    }

    /// Removes `symbol` after its connection ended.
    ///
    /// A live match is abandoned and the survivor told. Afterwards the match
    /// is always terminal.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn leave(&mut self, symbol: Symbol) {
        if !self.phase.is_terminal() {
            info!(%symbol, phase = ?self.phase, "Participant left live match");
            self.abandon(AbandonCause::Disconnected(symbol));
        }
        self.slots[seat(symbol)] = Slot::Empty;
    }

    /// Abandons a waiting match once it has waited `max_wait`.
    ///
    /// Returns true if the match expired.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn expire_if_stale(&mut self, now: Instant, max_wait: Duration) -> bool {
        if self.phase != Phase::Waiting
            || now.saturating_duration_since(self.created_at) < max_wait
        {
            return false;
        }
        info!(waited = ?now.saturating_duration_since(self.created_at), "Match expired");
        self.abandon(AbandonCause::Expired);
        true
    }

    fn finish(&mut self, outcome: Outcome) {
        self.phase = Phase::Finished(outcome);
        info!(match_id = %self.id, %outcome, moves = self.history.len(), "Match finished");
        debug!(board = %self.board.display(), "Final board");
        let snapshot = self.snapshot();
        for participant in self.slots.iter().filter_map(Slot::participant) {
            let result = match outcome.winner() {
                None => ResultTag::Draw,
                Some(winner) if winner == participant.symbol() => ResultTag::Win,
                Some(_) => ResultTag::Lose,
            };
            // Best effort: the game is over either way.
            let _ = broadcaster::conclude(participant, result, Some(snapshot.clone()));
        }
    }

    fn abandon(&mut self, cause: AbandonCause) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = Phase::Abandoned(cause);
        info!(match_id = %self.id, ?cause, "Match abandoned");
        let snapshot = self.snapshot();
        match cause {
            AbandonCause::Disconnected(lost) => {
                if let Some(survivor) = self.participant(lost.opponent()) {
                    let _ = broadcaster::conclude(
                        survivor,
                        ResultTag::OpponentDisconnected,
                        Some(snapshot),
                    );
                }
                // The lost side may still be reachable (e.g. buffer full).
                if let Some(lost) = self.participant(lost) {
                    let _ = lost.handle().close(ResultTag::OpponentDisconnected);
                }
            }
            AbandonCause::Expired => {
                for participant in self.slots.iter().filter_map(Slot::participant) {
                    let _ = broadcaster::conclude(
                        participant,
                        ResultTag::MatchExpired,
                        Some(snapshot.clone()),
                    );
                }
            }
        }
    }

    fn fail_transport(&mut self, failures: &[TransportError]) {
        if let Some(first) = failures.first() {
            warn!(match_id = %self.id, error = %first, "Delivery failed, ending match");
            self.abandon(AbandonCause::Disconnected(first.symbol()));
        }
    }
}
