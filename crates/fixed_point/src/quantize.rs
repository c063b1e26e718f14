//! Baseline integer-multiplier quantization
//!
//! Layers that precompute a Q31 multiplier and exponent use these routines
//! on the DoubleRound path. A real multiplier is encoded as
//! `multiplier * 2^(shift - 31)` with `multiplier` in `[2^30, 2^31)`.

use serde::{Deserialize, Serialize};

use crate::error::{FixedPointError, Result};

/// Smallest exponent kept; smaller multipliers flush to zero
const MIN_SHIFT: i32 = -31;

/// Largest exponent supported
const MAX_SHIFT: i32 = 30;

/// Rounding discriminator for [`multiply_by_quantized_multiplier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuantRoundMode {
    /// Rounding doubling high multiply, then a rounding divide by 2^n
    #[default]
    DoublingHighMul,
    /// One 64-bit product, one rounding right shift
    SingleRounding,
}

/// Q31 multiplier with power-of-two exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QuantizedMultiplier {
    pub multiplier: i32,
    pub shift: i32,
}

impl QuantizedMultiplier {
    /// Value represented by this multiplier
    pub fn to_f64(self) -> f64 {
        self.multiplier as f64 * 2f64.powi(self.shift - 31)
    }
}

/// Encode a real multiplier as a Q31 value and exponent.
///
/// Multipliers below `2^-32` flush to zero.
pub fn quantize_multiplier(real: f64) -> Result<QuantizedMultiplier> {
    if !real.is_finite() {
        return Err(FixedPointError::InvalidScale { value: real });
    }
    if real == 0.0 {
        return Ok(QuantizedMultiplier::default());
    }

    // real = q * 2^shift, |q| in [0.5, 1)
    let mut q = real.abs();
    let mut shift = 0i32;
    while q >= 1.0 {
        q /= 2.0;
        shift += 1;
    }
    while q < 0.5 {
        q *= 2.0;
        shift -= 1;
    }

    let mut q_fixed = (q * (1i64 << 31) as f64).round() as i64;
    if q_fixed == 1i64 << 31 {
        q_fixed /= 2;
        shift += 1;
    }

    if shift < MIN_SHIFT {
        return Ok(QuantizedMultiplier::default());
    }
    if shift > MAX_SHIFT {
        return Err(FixedPointError::InvalidShift(shift));
    }

    let multiplier = if real < 0.0 { -q_fixed } else { q_fixed };
    Ok(QuantizedMultiplier {
        multiplier: multiplier as i32,
        shift,
    })
}

/// Multiply `x` by a quantized multiplier with the selected rounding.
pub fn multiply_by_quantized_multiplier(
    x: i32,
    quantized: QuantizedMultiplier,
    mode: QuantRoundMode,
) -> Result<i32> {
    check_shift(quantized.shift)?;
    Ok(multiply_unchecked(x, quantized, mode))
}

pub(crate) fn check_shift(shift: i32) -> Result<()> {
    if (MIN_SHIFT..=MAX_SHIFT).contains(&shift) {
        Ok(())
    } else {
        Err(FixedPointError::InvalidShift(shift))
    }
}

/// Caller guarantees `shift` in `MIN_SHIFT..=MAX_SHIFT`
pub(crate) fn multiply_unchecked(x: i32, quantized: QuantizedMultiplier, mode: QuantRoundMode) -> i32 {
    let QuantizedMultiplier { multiplier, shift } = quantized;
    match mode {
        QuantRoundMode::DoublingHighMul => {
            let left_shift = shift.max(0) as u32;
            let right_shift = (-shift).max(0) as u32;
            let shifted = saturate_i32((x as i64) << left_shift);
            let high = saturating_rounding_doubling_high_mul(shifted, multiplier);
            rounding_divide_by_pot(high, right_shift)
        }
        QuantRoundMode::SingleRounding => {
            let total_shift = (31 - shift) as u32;
            let round = 1i64 << (total_shift - 1);
            let product = (x as i64) * (multiplier as i64);
            saturate_i32((product + round) >> total_shift)
        }
    }
}

/// High 32 bits of `2 * a * b`, rounded half toward positive infinity
fn saturating_rounding_doubling_high_mul(a: i32, b: i32) -> i32 {
    if a == i32::MIN && b == i32::MIN {
        return i32::MAX;
    }
    let ab = (a as i64) * (b as i64);
    let nudge: i64 = if ab >= 0 { 1 << 30 } else { 1 - (1 << 30) };
    // Division truncates toward zero
    ((ab + nudge) / (1i64 << 31)) as i32
}

/// `x / 2^exponent`, rounded half away from zero
fn rounding_divide_by_pot(x: i32, exponent: u32) -> i32 {
    if exponent == 0 {
        return x;
    }
    let x = x as i64;
    let mask = (1i64 << exponent) - 1;
    let remainder = x & mask;
    let threshold = (mask >> 1) + i64::from(x < 0);
    let result = (x >> exponent) + i64::from(remainder > threshold);
    result as i32
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
