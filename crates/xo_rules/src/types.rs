//! Core domain types for tic-tac-toe.

use crate::position::Position;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Mark a participant places on the board.
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
    strum::EnumIter,
)]
pub enum Symbol {
    /// Symbol of the match creator (moves first).
    X,
    /// Symbol of the joining participant.
    O,
}

impl Symbol {
    /// Returns the other symbol.
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// A single cell of the board.
///
/// Serialized as `null`, `"X"` or `"O"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<Symbol>", into = "Option<Symbol>")]
pub enum Cell {
    /// Nobody has played here yet.
    Empty,
    /// Cell holds a symbol.
    Occupied(Symbol),
}

impl Cell {
    /// Returns the symbol in this cell, if any.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(symbol) => Some(symbol),
        }
    }

    /// Returns true if the cell holds a symbol.
    pub fn is_occupied(self) -> bool {
        matches!(self, Cell::Occupied(_))
    }
}

impl From<Option<Symbol>> for Cell {
    fn from(symbol: Option<Symbol>) -> Self {
        symbol.map_or(Cell::Empty, Cell::Occupied)
    }
}

impl From<Cell> for Option<Symbol> {
    fn from(cell: Cell) -> Self {
        cell.symbol()
    }
}

/// 3x3 board in row-major order.
///
/// The board is a plain value. Placing a mark produces a new board and leaves
/// the original untouched, so a snapshot handed to another task never changes
/// underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Cell; 9],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; 9],
        }
    }

    /// Gets the cell at a position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.index()]
    }

    /// Returns a copy of this board with `symbol` written at `pos`.
    ///
    /// Occupancy is not checked here; callers validate with
    /// [`rules::is_cell_occupied`](crate::rules::is_cell_occupied) first.
    #[must_use]
    pub fn with_mark(&self, pos: Position, symbol: Symbol) -> Self {
        let mut next = *self;
        next.cells[pos.index()] = Cell::Occupied(symbol);
        next
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let symbol = match self.cells[row * 3 + col] {
                    Cell::Empty => ".",
                    Cell::Occupied(Symbol::X) => "X",
                    Cell::Occupied(Symbol::O) => "O",
                };
                result.push_str(symbol);
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when a board layout string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum BoardParseError {
    /// Layout contained a character other than `X`, `O`, `.` or a separator.
    #[display("Unexpected character {:?} in board layout", _0)]
    UnexpectedChar(char),
    /// Layout did not describe exactly nine cells.
    #[display("Board layout has {} cells, expected 9", _0)]
    WrongLength(usize),
}

impl std::error::Error for BoardParseError {}

impl FromStr for Board {
    type Err = BoardParseError;

    /// Parses a layout such as `"XO./.X./..O"`.
    ///
    /// `X` and `O` are marks, `.` is empty; whitespace, `|` and `/` are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = Vec::with_capacity(9);
        for ch in s.chars() {
            match ch {
                'X' | 'x' => cells.push(Cell::Occupied(Symbol::X)),
                'O' | 'o' => cells.push(Cell::Occupied(Symbol::O)),
                '.' => cells.push(Cell::Empty),
                '|' | '/' => {}
                c if c.is_whitespace() => {}
                c => return Err(BoardParseError::UnexpectedChar(c)),
            }
        }
        let len = cells.len();
        let cells: [Cell; 9] = cells
            .try_into()
            .map_err(|_| BoardParseError::WrongLength(len))?;
        Ok(Self { cells })
    }
}

/// Terminal result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// A symbol completed a line.
    Won(Symbol),
    /// Board filled up with no completed line.
    Draw,
}

impl Outcome {
    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Symbol> {
        match self {
            Outcome::Won(symbol) => Some(*symbol),
            Outcome::Draw => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Won(symbol) => write!(f, "{} wins", symbol),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_mark_leaves_original_untouched() {
        let board = Board::new();
        let pos = Position::new(1, 1).unwrap();
        let next = board.with_mark(pos, Symbol::X);

        assert_eq!(board.get(pos), Cell::Empty);
        assert_eq!(next.get(pos), Cell::Occupied(Symbol::X));
        assert_ne!(board, next);
    }

    #[test]
    fn test_boards_compare_by_value() {
        let pos = Position::new(0, 2).unwrap();
        let a = Board::new().with_mark(pos, Symbol::O);
        let b = Board::new().with_mark(pos, Symbol::O);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_layout() {
        let board: Board = "XO./.X./..O".parse().unwrap();
        assert_eq!(board.occupied_count(), 4);
        assert_eq!(board.get(Position::new(0, 1).unwrap()), Cell::Occupied(Symbol::O));
        assert_eq!(board.get(Position::new(2, 2).unwrap()), Cell::Occupied(Symbol::O));
    }

    #[test]
    fn test_parse_rejects_bad_layout() {
        assert_eq!(
            "XO.".parse::<Board>(),
            Err(BoardParseError::WrongLength(3))
        );
        assert_eq!(
            "XO.Z.....".parse::<Board>(),
            Err(BoardParseError::UnexpectedChar('Z'))
        );
    }

    #[test]
    fn test_display_grid() {
        let board: Board = "X../.O./...".parse().unwrap();
        assert_eq!(board.display(), "X|.|.\n-+-+-\n.|O|.\n-+-+-\n.|.|.");
    }

    #[test]
    fn test_outcome_winner() {
        assert_eq!(Outcome::Won(Symbol::O).winner(), Some(Symbol::O));
        assert_eq!(Outcome::Draw.winner(), None);
    }

    #[test]
    fn test_opponent() {
        assert_eq!(Symbol::X.opponent(), Symbol::O);
        assert_eq!(Symbol::O.opponent(), Symbol::X);
    }
}
