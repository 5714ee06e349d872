//! Win detection logic for tic-tac-toe.

use crate::{Board, Cell, Symbol};
use tracing::instrument;

/// The eight winning lines as row-major indices, in scan order:
/// rows top to bottom, columns left to right, then both diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the first completed line and its symbol, if any.
#[instrument]
pub fn winning_line(board: &Board) -> Option<(Symbol, [usize; 3])> {
    let cells = board.cells();
    LINES.into_iter().find_map(|line @ [a, b, c]| match cells[a] {
        Cell::Occupied(symbol) if cells[b] == cells[a] && cells[c] == cells[a] => {
            Some((symbol, line))
        }
        _ => None,
    })
}

/// Returns the symbol holding three in a row, `None` otherwise.
///
/// With two players alternating, a single move can complete lines for only
/// one symbol, so the first match in scan order is unambiguous.
#[instrument]
pub fn winning_symbol(board: &Board) -> Option<Symbol> {
    winning_line(board).map(|(symbol, _)| symbol)
}
