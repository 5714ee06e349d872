//! Validated board coordinates.

use serde::{Deserialize, Serialize};

/// A cell coordinate with `row` and `col` both in `0..=2`.
///
/// Wire messages carry raw integers; converting them through
/// [`Position::new`] is the only way to obtain a `Position`, so any value of
/// this type indexes the board safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPosition", into = "RawPosition")]
pub struct Position {
    row: u8,
    col: u8,
}

impl Position {
    /// Creates a position, or `None` if either coordinate is outside `0..=2`.
    pub fn new(row: i64, col: i64) -> Option<Self> {
        if (0..3).contains(&row) && (0..3).contains(&col) {
            Some(Self {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    /// Creates a position from a row-major index (0-8).
    pub fn from_index(index: usize) -> Option<Self> {
        (index < 9).then(|| Self {
            row: (index / 3) as u8,
            col: (index % 3) as u8,
        })
    }

    /// Row-major index into the board (0-8).
    pub fn index(self) -> usize {
        self.row as usize * 3 + self.col as usize
    }

    /// Row (0-2).
    pub fn row(self) -> u8 {
        self.row
    }

    /// Column (0-2).
    pub fn col(self) -> u8 {
        self.col
    }

    /// All nine positions in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..9).filter_map(Self::from_index)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Serialize, Deserialize)]
struct RawPosition {
    row: i64,
    col: i64,
}

impl TryFrom<RawPosition> for Position {
    type Error = String;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Position::new(raw.row, raw.col)
            .ok_or_else(|| format!("position ({}, {}) is off the board", raw.row, raw.col))
    }
}

impl From<Position> for RawPosition {
    fn from(pos: Position) -> Self {
        Self {
            row: pos.row.into(),
            col: pos.col.into(),
        }
    }
}
