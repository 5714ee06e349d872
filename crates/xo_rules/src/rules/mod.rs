//! Turn validation rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`] snapshot. They hold no state and perform
//! no I/O, so every match can call them from its own task.

pub mod draw;
pub mod win;

pub use draw::{is_draw, is_full};
pub use win::{LINES, winning_line, winning_symbol};

use crate::{Board, Outcome, Position};
use tracing::instrument;

/// Checks whether the cell at `pos` already holds a symbol.
#[instrument]
pub fn is_cell_occupied(board: &Board, pos: Position) -> bool {
    board.get(pos).is_occupied()
}

/// Evaluates whether the board is terminal.
///
/// A completed line wins; only when no line is complete does a full board
/// count as a draw. Returns `None` while the game can continue.
#[instrument]
pub fn evaluate(board: &Board) -> Option<Outcome> {
    if let Some(symbol) = winning_symbol(board) {
        return Some(Outcome::Won(symbol));
    }
    is_full(board).then_some(Outcome::Draw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    #[test]
    fn test_occupied_check() {
        let board: Board = "X../.../...".parse().unwrap();
        assert!(is_cell_occupied(&board, Position::new(0, 0).unwrap()));
        assert!(!is_cell_occupied(&board, Position::new(0, 1).unwrap()));
    }

    #[test]
    fn test_evaluate_in_progress() {
        let board: Board = "XO./.X./...".parse().unwrap();
        assert_eq!(evaluate(&board), None);
    }

    #[test]
    fn test_evaluate_win_on_full_board_is_not_draw() {
        // Last move fills the board and completes the left column.
        let board: Board = "XOX/XOO/XXO".parse().unwrap();
        assert!(is_full(&board));
        assert_eq!(evaluate(&board), Some(Outcome::Won(Symbol::X)));
    }

    #[test]
    fn test_evaluate_draw() {
        let board: Board = "XOX/XOO/OXX".parse().unwrap();
        assert_eq!(evaluate(&board), Some(Outcome::Draw));
    }
}
