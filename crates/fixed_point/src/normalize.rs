//! Scale factor → (mantissa, shift) normalization
//!
//! Hardware applies a rescale as `(acc * mpy) >> shift`, with `mpy` limited to
//! a positive 15-bit value and `shift` limited to `1..=63`. This module finds
//! the pair that matches the reference procedure bit for bit.

use crate::error::{FixedPointError, Result};

/// Fractional bits of the normalized mantissa before shift adjustment
pub const FRAC_BITS: i32 = 16;

/// Largest right shift the hardware supports
pub const MAX_SHIFT: u32 = 63;

/// Largest mantissa (15-bit signed positive range)
pub const MAX_MANTISSA: u32 = 32767;

/// Upper normalization bound, kept just under 0.5 so that
/// `round(f * 2^FRAC_BITS)` stays clear of the 15-bit limit.
const UPPER_BOUND: f64 = 0.5 * (65536.0 - 0.51) / 65536.0;

const LOWER_BOUND: f64 = UPPER_BOUND / 2.0;

/// Fixed-point approximation `mpy / 2^shift` of a scale factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MantissaShift {
    /// 15-bit mantissa (odd whenever `shift > 1`)
    pub mpy: u32,
    /// Right shift, `1..=63`
    pub shift: u32,
}

impl MantissaShift {
    /// Pair returned for a zero scale; multiplies every accumulator to zero
    pub const ZERO: Self = Self { mpy: 0, shift: 1 };

    /// Value represented by this pair
    pub fn to_f64(self) -> f64 {
        self.mpy as f64 / 2f64.powi(self.shift as i32)
    }

    /// Check if this pair encodes a zero scale
    pub fn is_zero(self) -> bool {
        self.mpy == 0
    }
}

impl std::fmt::Display for MantissaShift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/2^{}", self.mpy, self.shift)
    }
}

/// Reduce a scale factor to a hardware mantissa/shift pair.
///
/// Operates on `|scale|`; the caller owns the sign. A zero scale yields
/// [`MantissaShift::ZERO`] without entering the normalization loops.
///
/// # Errors
/// - [`FixedPointError::InvalidScale`] for NaN or infinite input
/// - [`FixedPointError::ScaleOutOfRange`] when no pair with `1 ≤ mpy ≤ 32767`
///   and `1 ≤ shift ≤ 63` exists (scales of roughly 16384 and above, or so
///   small that the mantissa rounds to zero at the maximum shift)
pub fn normalize_scale(scale: f64) -> Result<MantissaShift> {
    if !scale.is_finite() {
        return Err(FixedPointError::InvalidScale { value: scale });
    }

    let magnitude = scale.abs();
    if magnitude == 0.0 {
        return Ok(MantissaShift::ZERO);
    }

    // Bring the magnitude into [LOWER_BOUND, UPPER_BOUND)
    let mut normalized = magnitude;
    let mut shift_adj: i32 = 0;
    while normalized >= UPPER_BOUND {
        normalized /= 2.0;
        shift_adj -= 1;
    }
    while normalized < LOWER_BOUND {
        normalized *= 2.0;
        shift_adj += 1;
    }

    if FRAC_BITS + shift_adj > MAX_SHIFT as i32 {
        shift_adj = MAX_SHIFT as i32 - FRAC_BITS;
    }

    let total_shift = FRAC_BITS + shift_adj;
    if total_shift < 1 {
        return Err(FixedPointError::ScaleOutOfRange { value: scale });
    }

    // Round the original magnitude, not the normalized one: after the
    // shift cap they are no longer related by 2^FRAC_BITS.
    let mut mpy = (magnitude * 2f64.powi(total_shift)).round() as u64;
    let mut shift = total_shift as u32;

    if mpy == 0 {
        return Err(FixedPointError::ScaleOutOfRange { value: scale });
    }

    while mpy % 2 == 0 && shift > 1 {
        mpy >>= 1;
        shift -= 1;
    }

    if mpy > MAX_MANTISSA as u64 {
        return Err(FixedPointError::ScaleOutOfRange { value: scale });
    }

    Ok(MantissaShift {
        mpy: mpy as u32,
        shift,
    })
}
