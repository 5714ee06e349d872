//! Wire messages exchanged with clients.
//!
//! Frames are JSON objects tagged by `type`. Inbound frames may also use the
//! legacy `make_turn#{"x":0,"y":1}` text form.

use crate::error::{MoveRejection, ProtocolError};
use crate::game_match::Phase;
use crate::registry::MatchId;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use xo_rules::{Board, Position, Symbol};

/// A move as submitted by a client.
///
/// Coordinates are raw so that off-board values reach the match and get an
/// explicit `OutOfRange` rejection instead of a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Target row (expected 0-2).
    pub row: i64,
    /// Target column (expected 0-2).
    pub col: i64,
    /// Symbol the client believes it plays. The connection's role is
    /// authoritative; a mismatch is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
}

impl Turn {
    /// Creates a turn without an explicit symbol.
    pub fn at(row: i64, col: i64) -> Self {
        Self {
            row,
            col,
            symbol: None,
        }
    }
}

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Place the sender's symbol.
    MakeTurn(Turn),
    /// Ask for a full snapshot of the match.
    Sync,
}

/// Legacy turn body: `x` is the row, `y` the column.
#[derive(Debug, Deserialize)]
struct LegacyTurn {
    x: i64,
    y: i64,
    #[serde(default)]
    symbol: Option<Symbol>,
}

impl ClientMessage {
    /// Decodes a text frame.
    #[instrument(level = "debug")]
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        if let Some((command, body)) = text.split_once('#')
            && !text.starts_with('{')
        {
            return match command {
                "make_turn" => {
                    let legacy: LegacyTurn = serde_json::from_str(body)?;
                    Ok(ClientMessage::MakeTurn(Turn {
                        row: legacy.x,
                        col: legacy.y,
                        symbol: legacy.symbol,
                    }))
                }
                "sync" => Ok(ClientMessage::Sync),
                other => Err(ProtocolError::UnknownCommand(other.to_string())),
            };
        }
        Ok(serde_json::from_str(text)?)
    }
}

/// Terminal result and close tag sent to a connection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
pub enum ResultTag {
    /// Recipient completed a line.
    Win,
    /// Opponent completed a line.
    Lose,
    /// Board filled with no line.
    Draw,
    /// Joined match already had two participants.
    RoomFull,
    /// Joined match id is unknown or already over.
    InvalidMatchId,
    /// Opponent's connection was lost mid-game.
    OpponentDisconnected,
    /// Nobody joined before the waiting timeout.
    MatchExpired,
}

impl ResultTag {
    /// Tag text used as the WebSocket close reason.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// One seat in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Display name.
    pub name: String,
    /// Assigned symbol.
    pub symbol: Symbol,
}

/// Full state of a match at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Match id.
    pub match_id: MatchId,
    /// Board cells in row-major order.
    pub board: Board,
    /// Symbol allowed to move next.
    pub turn: Symbol,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Seated participants.
    pub players: Vec<PlayerView>,
    /// Number of accepted moves.
    pub moves: usize,
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A new match was created for the sender.
    MatchCreated {
        /// Id to share with the opponent.
        match_id: MatchId,
        /// Creator's symbol (always X).
        symbol: Symbol,
    },
    /// The sender joined an existing match.
    Joined {
        /// Joined match id.
        match_id: MatchId,
        /// Joiner's symbol (always O).
        symbol: Symbol,
        /// Creator's display name.
        opponent: String,
        /// State at the moment of pairing.
        snapshot: MatchSnapshot,
    },
    /// A second participant joined the sender's match.
    OpponentJoined {
        /// Joiner's display name.
        opponent: String,
        /// State at the moment of pairing.
        snapshot: MatchSnapshot,
    },
    /// The sender's move was refused.
    MoveRejected {
        /// Why the move was refused.
        reason: MoveRejection,
        /// Row as submitted.
        row: i64,
        /// Column as submitted.
        col: i64,
    },
    /// A move was accepted and the game continues.
    MoveApplied {
        /// Symbol that moved.
        symbol: Symbol,
        /// Where it moved.
        position: Position,
        /// State after the move.
        snapshot: MatchSnapshot,
    },
    /// Reply to [`ClientMessage::Sync`].
    Snapshot {
        /// Current state.
        snapshot: MatchSnapshot,
    },
    /// Final message before the connection is closed.
    GameOver {
        /// Result from the recipient's point of view.
        result: ResultTag,
        /// Final state, when the connection was part of a match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<MatchSnapshot>,
    },
    /// An inbound frame could not be understood.
    Error {
        /// Human-readable description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_turn() {
        let msg = ClientMessage::decode(r#"{"type":"make_turn","row":1,"col":2}"#).unwrap();
        assert_eq!(msg, ClientMessage::MakeTurn(Turn::at(1, 2)));
    }

    #[test]
    fn test_decode_json_turn_with_symbol() {
        let msg =
            ClientMessage::decode(r#"{"type":"make_turn","row":0,"col":0,"symbol":"O"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::MakeTurn(Turn {
                row: 0,
                col: 0,
                symbol: Some(Symbol::O),
            })
        );
    }

    #[test]
    fn test_decode_legacy_turn() {
        let msg = ClientMessage::decode(r#"make_turn#{"x":2,"y":0}"#).unwrap();
        assert_eq!(msg, ClientMessage::MakeTurn(Turn::at(2, 0)));
    }

    #[test]
    fn test_decode_keeps_off_board_coordinates() {
        let msg = ClientMessage::decode(r#"{"type":"make_turn","row":-1,"col":7}"#).unwrap();
        assert_eq!(msg, ClientMessage::MakeTurn(Turn::at(-1, 7)));
    }

    #[test]
    fn test_decode_sync() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"sync"}"#).unwrap(),
            ClientMessage::Sync
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            ClientMessage::decode("resign#{}"),
            Err(ProtocolError::UnknownCommand(cmd)) if cmd == "resign"
        ));
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejection_wire_shape() {
        let msg = ServerMessage::MoveRejected {
            reason: MoveRejection::CellOccupied,
            row: 0,
            col: 0,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "move_rejected", "reason": "CellOccupied", "row": 0, "col": 0})
        );
    }

    #[test]
    fn test_result_tag_text() {
        assert_eq!(ResultTag::OpponentDisconnected.as_str(), "OpponentDisconnected");
        assert_eq!(ResultTag::RoomFull.to_string(), "RoomFull");
    }
}
