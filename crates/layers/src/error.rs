//! Layer error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Fixed-point error: {0}")]
    FixedPoint(#[from] qscale_fixed_point::FixedPointError),
}

pub type Result<T> = std::result::Result<T, LayerError>;
