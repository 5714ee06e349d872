//! Error types for match sessions and move handling.

use crate::protocol::ResultTag;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use xo_rules::Symbol;

/// Reason a submitted move was refused.
///
/// Rejections are recovered locally: the board is untouched and only the
/// submitter is told. The variant names double as wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum MoveRejection {
    /// Target cell already holds a symbol.
    #[display("Cell is already occupied")]
    CellOccupied,
    /// Submitter does not own the current turn.
    #[display("It's not your turn")]
    NotYourTurn,
    /// Row or column outside 0-2.
    #[display("Position is off the board")]
    OutOfRange,
    /// Match is not in progress (still waiting, or already over).
    #[display("Match is not in progress")]
    InvalidPhase,
}

impl std::error::Error for MoveRejection {}

/// Failure to attach a connection to a match.
///
/// Ends only the connecting attempt; the target match is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SessionError {
    /// No live match has this id.
    #[display("Match not found")]
    NotFound,
    /// Match already holds two participants.
    #[display("Match is full")]
    Full,
}

impl SessionError {
    /// Close tag reported to the rejected connection.
    pub fn close_tag(self) -> ResultTag {
        match self {
            SessionError::NotFound => ResultTag::InvalidMatchId,
            SessionError::Full => ResultTag::RoomFull,
        }
    }
}

impl std::error::Error for SessionError {}

/// Error returned by [`MatchRegistry::submit_move`](crate::MatchRegistry::submit_move).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MoveError {
    /// The match refused the move.
    #[display("Move rejected: {}", _0)]
    Rejected(MoveRejection),
    /// The match has already been evicted from the registry.
    #[display("Match no longer exists")]
    MatchGone,
}

impl std::error::Error for MoveError {}

impl From<MoveRejection> for MoveError {
    fn from(rejection: MoveRejection) -> Self {
        MoveError::Rejected(rejection)
    }
}

/// Outbound delivery to a participant failed.
///
/// Never retried. The match treats the participant as disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransportError {
    /// The connection's worker is gone.
    #[display("Connection for {} is closed", _0)]
    Disconnected(Symbol),
    /// The connection's outbound buffer is full.
    #[display("Outbound buffer for {} is full", _0)]
    Backpressure(Symbol),
}

impl TransportError {
    /// Symbol of the participant whose delivery failed.
    pub fn symbol(self) -> Symbol {
        match self {
            TransportError::Disconnected(symbol) | TransportError::Backpressure(symbol) => symbol,
        }
    }
}

impl std::error::Error for TransportError {}

/// Inbound frame could not be decoded.
#[derive(Debug, Display)]
pub enum ProtocolError {
    /// Frame was not valid JSON for any client message.
    #[display("Malformed message: {}", _0)]
    Malformed(serde_json::Error),
    /// Legacy `command#body` frame named an unknown command.
    #[display("Unknown command {:?}", _0)]
    UnknownCommand(String),
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Malformed(err) => Some(err),
            ProtocolError::UnknownCommand(_) => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err)
    }
}
