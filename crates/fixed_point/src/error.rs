//! Fixed-point error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FixedPointError {
    #[error("Invalid scale factor: {value} is not finite")]
    InvalidScale { value: f64 },

    #[error("Scale factor {value} cannot be represented as a 15-bit mantissa with shift 1..=63")]
    ScaleOutOfRange { value: f64 },

    #[error("Unknown rounding mode token: {0:?}")]
    UnknownRoundingMode(String),

    #[error("Invalid shift: {0} (must be -31..=30)")]
    InvalidShift(i32),
}

pub type Result<T> = std::result::Result<T, FixedPointError>;
