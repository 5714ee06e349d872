//! Per-connection glue between a socket worker and the registry.

use crate::broadcaster;
use crate::connection::ConnectionHandle;
use crate::error::{MoveError, MoveRejection, SessionError};
use crate::game_match::{MoveOutcome, Participant};
use crate::protocol::{ClientMessage, ServerMessage, Turn};
use crate::registry::{MatchId, MatchRegistry};
use tracing::{debug, info, instrument, warn};
use xo_rules::Symbol;

/// What a client asked for when it connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    player_name: String,
    match_id: Option<MatchId>,
}

impl ConnectRequest {
    /// Builds a request. The name is trimmed; an empty or blank match id
    /// means "create a new match".
    pub fn new(player_name: impl AsRef<str>, match_id: Option<impl AsRef<str>>) -> Self {
        Self {
            player_name: player_name.as_ref().trim().to_string(),
            match_id: match_id
                .map(|id| id.as_ref().trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    /// Trimmed display name (may be empty).
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Match to join, if any.
    pub fn match_id(&self) -> Option<&str> {
        self.match_id.as_deref()
    }
}

/// A connection attached to a match.
///
/// Dropping a session without calling [`Session::close`] leaves the seat
/// taken until the match ends some other way, so workers always close it.
#[derive(Debug)]
pub struct Session {
    registry: MatchRegistry,
    participant: Participant,
    match_id: MatchId,
}

impl Session {
    /// Creates or joins a match for a new connection.
    ///
    /// On failure the connection has already been sent its close tag
    /// (`RoomFull` or `InvalidMatchId`); the target match is untouched.
    #[instrument(skip(registry, handle))]
    pub fn open(
        registry: &MatchRegistry,
        request: ConnectRequest,
        handle: ConnectionHandle,
    ) -> Result<Self, SessionError> {
        let (match_id, symbol) = match request.match_id() {
            None => {
                let id = registry.create_match(request.player_name(), handle.clone());
                (id, Symbol::X)
            }
            Some(id) => match registry.join_match(id, request.player_name(), handle.clone()) {
                Ok(symbol) => (id.to_string(), symbol),
                Err(err) => {
                    warn!(match_id = id, error = %err, "Connection refused");
                    let tag = err.close_tag();
                    let _ = handle.send(ServerMessage::GameOver {
                        result: tag,
                        snapshot: None,
                    });
                    let _ = handle.close(tag);
                    return Err(err);
                }
            },
        };
        info!(%match_id, %symbol, "Session attached");
        Ok(Self {
            registry: registry.clone(),
            participant: Participant::new(request.player_name, symbol, handle),
            match_id,
        })
    }

    /// Match this session belongs to.
    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// Symbol assigned to this connection.
    pub fn symbol(&self) -> Symbol {
        self.participant.symbol()
    }

    /// Decodes and handles one text frame.
    ///
    /// Malformed frames get an `error` reply and are otherwise ignored.
    #[instrument(skip(self, text), fields(match_id = %self.match_id, symbol = %self.symbol()))]
    pub fn handle_text(&self, text: &str) {
        match ClientMessage::decode(text) {
            Ok(message) => self.handle(message),
            Err(err) => {
                debug!(error = %err, "Undecodable frame");
                self.reply(ServerMessage::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    /// Handles one decoded client message.
    pub fn handle(&self, message: ClientMessage) {
        match message {
            ClientMessage::MakeTurn(turn) => self.make_turn(turn),
            ClientMessage::Sync => {
                if !self.registry.sync(&self.match_id, self.symbol()) {
                    self.reply(ServerMessage::Error {
                        message: "Match no longer exists".to_string(),
                    });
                }
            }
        }
    }

    fn make_turn(&self, turn: Turn) {
        match self.registry.submit_move(&self.match_id, self.symbol(), turn) {
            Ok(MoveOutcome::Continued) => {}
            Ok(outcome) => debug!(?outcome, "Move ended the match"),
            // The match already told the submitter.
            Err(MoveError::Rejected(_)) => {}
            Err(MoveError::MatchGone) => {
                self.reply(ServerMessage::MoveRejected {
                    reason: MoveRejection::InvalidPhase,
                    row: turn.row,
                    col: turn.col,
                });
            }
        }
    }

    /// Sends a message to this connection only.
    ///
    /// A reply that cannot be queued counts as a lost connection, the same
    /// as any other failed delivery: the match is abandoned.
    pub fn reply(&self, message: ServerMessage) {
        if let Err(err) = broadcaster::send_to(&self.participant, message) {
            warn!(match_id = %self.match_id, error = %err, "Reply failed, leaving match");
            self.registry.leave_match(&self.match_id, self.symbol());
        }
    }

    /// Reports that the connection ended.
    #[instrument(skip(self), fields(match_id = %self.match_id, symbol = %self.symbol()))]
    pub fn close(self) {
        info!("Session closed");
        self.registry.leave_match(&self.match_id, self.symbol());
    }
}
