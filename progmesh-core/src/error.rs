//! Error types for progmesh

use thiserror::Error;

/// Main error type for progmesh operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    #[error("Triangle {triangle} is degenerate: vertices {a} and {b} share a position")]
    DegenerateTriangle { triangle: usize, a: u32, b: u32 },

    #[error("Index {index} does not fit in a 16-bit index buffer")]
    IndexOverflow { index: u32 },

    #[error("Buffer layout error: {0}")]
    BufferLayout(String),

    #[error("Reduction exhausted at LOD level {level} after {collapses} collapses")]
    ReductionExhausted { level: usize, collapses: usize },

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for progmesh operations
pub type Result<T> = std::result::Result<T, Error>;
