//! Game rules for the 3x3 board
//!
//! The board evaluator is a pure function over a fixed grid; it holds no
//! session state.

pub mod board;

pub use board::{evaluate, Board, Outcome, CELL_COUNT, WINNING_LINES};
