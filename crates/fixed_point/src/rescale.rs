//! In-place accumulator rescaling
//!
//! [`scale_buffer`] is the entry point numeric layers call after
//! accumulation with `scale = input_scale * weight_scale / output_scale`.
//! [`multiply_buffer`] serves layers that precomputed a Q31 multiplier.

use crate::config::{MultiplierRoundingMode, RoundingConfig, RoundingMode};
use crate::element::AccumElement;
use crate::error::{FixedPointError, Result};
use crate::normalize::{normalize_scale, MantissaShift};
use crate::quantize::{check_shift, multiply_unchecked, QuantRoundMode, QuantizedMultiplier};
use crate::round::{ll_round, round_half_away};

/// How the two-stage path stores the intermediate product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermediateRounding {
    /// Keep the product at the element's native storage precision
    Store,
    /// Round the product to an integer before storing
    Round,
}

/// Rescale `buffer` by `scale` under the configured rounding mode.
///
/// `name` identifies the calling layer in debug dumps.
pub fn scale_buffer<E: AccumElement>(
    config: &RoundingConfig,
    name: &str,
    buffer: &mut [E],
    scale: f64,
) -> Result<()> {
    if !scale.is_finite() {
        return Err(FixedPointError::InvalidScale { value: scale });
    }

    match config.mode {
        RoundingMode::DoubleRound => {
            if config.debug {
                tracing::info!(layer = name, mode = %config.mode, scale, count = buffer.len(), "Rescale");
            }
            rescale_double_round(buffer, scale);
        }
        RoundingMode::SingleRound => {
            let (mul, shift) = rescale_single_round(buffer, scale);
            if config.debug {
                tracing::info!(layer = name, mode = %config.mode, scale, mul, shift, count = buffer.len(), "Rescale");
            }
        }
        RoundingMode::EvRound => {
            let pair = rescale_ev_round(buffer, scale)?;
            if config.debug {
                tracing::info!(
                    layer = name,
                    mode = %config.mode,
                    scale,
                    mpy = pair.mpy,
                    shift = pair.shift,
                    count = buffer.len(),
                    "Rescale"
                );
            }
        }
    }

    Ok(())
}

/// Rescale `buffer` for a layer that precomputed a Q31 multiplier.
///
/// The DoubleRound path applies `multiplier` with `round_mode`. The EVRound
/// path ignores `multiplier` and re-derives mantissa/shift from `scale`.
pub fn multiply_buffer<E: AccumElement>(
    config: &RoundingConfig,
    name: &str,
    buffer: &mut [E],
    multiplier: QuantizedMultiplier,
    round_mode: QuantRoundMode,
    scale: f64,
) -> Result<()> {
    let mode = config.multiplier_mode();

    if config.debug {
        tracing::info!(
            layer = name,
            mode = %mode,
            scale,
            multiplier = multiplier.multiplier,
            shift = multiplier.shift,
            round_mode = ?round_mode,
            before = ?buffer,
            "Multiply"
        );
    }

    match mode {
        MultiplierRoundingMode::DoubleRound => {
            check_shift(multiplier.shift)?;
            for x in buffer.iter_mut() {
                let value = x.to_i64().clamp(i32::MIN as i64, i32::MAX as i64) as i32;
                *x = E::from_i64(multiply_unchecked(value, multiplier, round_mode) as i64);
            }
        }
        MultiplierRoundingMode::EvRound => {
            if !scale.is_finite() {
                return Err(FixedPointError::InvalidScale { value: scale });
            }
            let pair = rescale_ev_round(buffer, scale)?;
            if config.debug {
                tracing::info!(layer = name, mpy = pair.mpy, shift = pair.shift, "Multiply mantissa");
            }
        }
    }

    if config.debug {
        tracing::info!(layer = name, after = ?buffer, "Multiply");
    }

    Ok(())
}

/// Multiply by `scale` in double precision and round half away from zero.
pub fn rescale_double_round<E: AccumElement>(buffer: &mut [E], scale: f64) {
    for x in buffer.iter_mut() {
        *x = E::from_f64(round_half_away(x.to_f64() * scale));
    }
}

/// Multiply by the power-of-two normalized scale, store, then divide and round.
/// Returns the multiplier/shift pair used.
pub fn rescale_single_round<E: AccumElement>(buffer: &mut [E], scale: f64) -> (f64, i32) {
    let (mul, shift) = single_round_factor(scale);
    rescale_two_stage(buffer, mul, shift, IntermediateRounding::Store);
    (mul, shift)
}

/// `x = round(stage(x * mul) / 2^shift)` where `stage` is selected by `rounding`.
pub fn rescale_two_stage<E: AccumElement>(
    buffer: &mut [E],
    mul: f64,
    shift: i32,
    rounding: IntermediateRounding,
) {
    let divisor = 2f64.powi(shift);
    for x in buffer.iter_mut() {
        let product = x.to_f64() * mul;
        let intermediate = match rounding {
            IntermediateRounding::Store => E::from_f64(product),
            IntermediateRounding::Round => E::from_f64(round_half_away(product)),
        };
        *x = E::from_f64(round_half_away(intermediate.to_f64() / divisor));
    }
}

/// Rescale integer-valued accumulators with a 15-bit mantissa and a
/// round-half-to-even shift. Returns the mantissa/shift pair used.
pub fn rescale_ev_round<E: AccumElement>(buffer: &mut [E], scale: f64) -> Result<MantissaShift> {
    let pair = normalize_scale(scale)?;

    if pair.is_zero() {
        for x in buffer.iter_mut() {
            *x = E::from_i64(0);
        }
        return Ok(pair);
    }

    let mpy = if scale < 0.0 {
        -(pair.mpy as i64)
    } else {
        pair.mpy as i64
    };
    for x in buffer.iter_mut() {
        let acc = x.to_i64().saturating_mul(mpy);
        *x = E::from_i64(ll_round(acc, pair.shift));
    }

    Ok(pair)
}

/// Split `scale` into a multiplier and a non-negative power-of-two shift
/// such that `scale = mul / 2^shift`. Magnitudes below 0.5 are doubled into
/// `[0.5, 1)`; anything at or above 0.5 is used as is with `shift = 0`.
fn single_round_factor(scale: f64) -> (f64, i32) {
    if scale == 0.0 {
        return (0.0, 0);
    }

    let mut mul = scale.abs();
    let mut shift = 0i32;
    while mul < 0.5 {
        mul *= 2.0;
        shift += 1;
    }

    (mul.copysign(scale), shift)
}
