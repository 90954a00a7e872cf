//! Error taxonomy for generation and navigation.
//!
//! Only `GenerationInconsistency` is fatal (it aborts a map build). The other
//! variants are recovered where they occur; none of them escapes `tick`.

use thiserror::Error;

use super::types::GridCoord;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("generation inconsistency at {coord}: {reason}")]
    GenerationInconsistency { coord: GridCoord, reason: String },

    #[error("grid index ({row}, {col}) outside {rows}x{cols} grid")]
    OutOfBounds {
        row: isize,
        col: isize,
        rows: usize,
        cols: usize,
    },

    #[error("grid cell {0} is already occupied")]
    Occupied(GridCoord),

    #[error("invalid agent state: {0}")]
    InvalidAgentState(String),
}

/// Shorthand result type for the simulation core
pub type SimResult<T> = Result<T, SimError>;
