//! qscale Fixed-Point Rescaling
//!
//! Emulates the fixed-point rescale stage of dedicated inference hardware.
//! A floating-point scale factor is reduced to a 15-bit mantissa and a right
//! shift, and 32-bit accumulators are multiplied and shifted with
//! round-half-to-even on a 64-bit intermediate.
//!
//! Three rounding policies are selectable through [`RoundingConfig`]:
//! - `DoubleRound`: double-precision multiply and round (reference path)
//! - `SingleRound`: power-of-two normalized multiply, then a rounding divide
//! - `EvRound`: 15-bit mantissa / 64-bit product / round-half-to-even shift

mod config;
mod element;
mod error;
mod normalize;
mod quantize;
mod rescale;
mod round;

pub use config::{
    MultiplierRoundingMode, RoundingConfig, RoundingMode, DEBUG_ENV, ROUND_MODE_ENV,
};
pub use element::AccumElement;
pub use error::{FixedPointError, Result};
pub use normalize::{normalize_scale, MantissaShift, FRAC_BITS, MAX_MANTISSA, MAX_SHIFT};
pub use quantize::{
    multiply_by_quantized_multiplier, quantize_multiplier, QuantRoundMode, QuantizedMultiplier,
};
pub use rescale::{
    multiply_buffer, rescale_double_round, rescale_ev_round, rescale_single_round,
    rescale_two_stage, scale_buffer, IntermediateRounding,
};
pub use round::{ll_round, round_half_away};
