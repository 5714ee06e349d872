//! Two-player tic-tac-toe match server.
//!
//! Connections arrive over WebSockets at `/xo-game/{player_name}` (create)
//! or `/xo-game/{player_name}/{match_id}` (join). Each match pairs exactly
//! two connections, referees their moves with [`xo_rules`], and closes both
//! connections with a result tag when it ends.
//!
//! The pieces, bottom-up:
//!
//! - [`ConnectionHandle`] / [`Outbox`]: non-blocking delivery to one socket
//! - [`Match`]: per-match state machine and turn validation
//! - [`MatchRegistry`]: concurrent map of live matches
//! - [`Session`]: per-connection glue used by socket workers
//! - [`GameServer`]: axum routes and the expiry sweeper
//!
//! # Example
//!
//! ```
//! use xo_server::{ConnectRequest, ConnectionHandle, MatchRegistry, Session};
//!
//! let registry = MatchRegistry::new();
//! let (alice, _alice_out) = ConnectionHandle::channel(8);
//! let host = Session::open(&registry, ConnectRequest::new("alice", None::<&str>), alice).unwrap();
//!
//! let (bob, _bob_out) = ConnectionHandle::channel(8);
//! let guest = Session::open(&registry, ConnectRequest::new("bob", Some(host.match_id())), bob).unwrap();
//! assert_eq!(registry.participant_count(guest.match_id()), Some(2));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod broadcaster;
mod config;
mod connection;
mod error;
mod game_match;
mod protocol;
mod registry;
mod server;
mod session;

pub use config::{ConfigError, HOST_ENV, PORT_ENV, ServerConfig};
pub use connection::{ConnectionHandle, Outbox, Outgoing, SendFailure};
pub use error::{MoveError, MoveRejection, ProtocolError, SessionError, TransportError};
pub use game_match::{AbandonCause, Match, MoveOutcome, Participant, Phase, Slot};
pub use protocol::{
    ClientMessage, MatchSnapshot, PlayerView, ResultTag, ServerMessage, Turn,
};
pub use registry::{MatchId, MatchRegistry, SharedMatch};
pub use server::GameServer;
pub use session::{ConnectRequest, Session};
