//! Board representation and terminal outcome evaluation

use crate::types::Mark;
use serde::{Deserialize, Serialize};

/// Number of cells on the board
pub const CELL_COUNT: usize = 9;

/// All winning triples: rows, columns, then diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Terminal state of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Game continues
    None,
    Win(Mark),
    Draw,
}

/// Fixed 3x3 grid in row-major order. Serializes as a 9-element array of
/// `null`, `"X"` or `"O"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([Option<Mark>; CELL_COUNT]);

impl Board {
    /// Creates an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from explicit cells
    pub fn from_cells(cells: [Option<Mark>; CELL_COUNT]) -> Self {
        Self(cells)
    }

    /// Cell at `index`, `None` when out of range
    pub fn get(&self, index: usize) -> Option<Option<Mark>> {
        self.0.get(index).copied()
    }

    /// Whether `index` is in range and unoccupied
    pub fn is_empty_at(&self, index: usize) -> bool {
        matches!(self.get(index), Some(None))
    }

    /// Writes a mark without validation; callers check range and occupancy.
    pub(crate) fn place(&mut self, index: usize, mark: Mark) {
        self.0[index] = Some(mark);
    }

    pub fn cells(&self) -> &[Option<Mark>; CELL_COUNT] {
        &self.0
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Number of occupied cells
    pub fn occupied(&self) -> usize {
        self.0.iter().filter(|cell| cell.is_some()).count()
    }
}

/// Determine whether the board is won, drawn, or still in play.
///
/// Lines are scanned in [`WINNING_LINES`] order and the first complete line
/// decides the winner.
pub fn evaluate(board: &Board) -> Outcome {
    let cells = board.cells();

    for [a, b, c] in WINNING_LINES {
        if let Some(mark) = cells[a] {
            if cells[b] == Some(mark) && cells[c] == Some(mark) {
                return Outcome::Win(mark);
            }
        }
    }

    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::None
    }
}
