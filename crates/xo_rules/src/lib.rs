//! Pure tic-tac-toe game logic for the strictly_xo match server.
//!
//! Nothing in this crate performs I/O or holds shared state. Every function
//! works on a [`Board`] value, so matches running on different tasks can call
//! into the rules concurrently without coordination.
//!
//! # Example
//!
//! ```
//! use xo_rules::{Board, Outcome, Position, Symbol, rules};
//!
//! let mut board = Board::new();
//! for col in 0..3 {
//!     let pos = Position::new(0, col).expect("in range");
//!     board = board.with_mark(pos, Symbol::X);
//! }
//! assert_eq!(rules::winning_symbol(&board), Some(Symbol::X));
//! assert_eq!(rules::evaluate(&board), Some(Outcome::Won(Symbol::X)));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod position;
pub mod rules;
mod types;

pub use position::Position;
pub use types::{Board, BoardParseError, Cell, Outcome, Symbol};
