//! Quantized element-wise sum
//!
//! Each int8 input is brought to the output scale with a precomputed Q31
//! multiplier, then the two are added and saturated.

use qscale_fixed_point::{
    multiply_buffer, quantize_multiplier, QuantRoundMode, QuantizedMultiplier, RoundingConfig,
};
use serde::{Deserialize, Serialize};

use crate::blob::{saturate_int8, Blob};
use crate::error::{LayerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EltwiseSumConfig {
    pub a_scale: f64,
    pub b_scale: f64,
    pub output_scale: f64,
    /// Rounding of the baseline multiplier path
    pub round_mode: QuantRoundMode,
}

#[derive(Debug, Clone)]
pub struct QuantizedEltwiseSum {
    name: String,
    config: EltwiseSumConfig,
    a_multiplier: QuantizedMultiplier,
    b_multiplier: QuantizedMultiplier,
}

impl QuantizedEltwiseSum {
    pub fn new(name: impl Into<String>, config: EltwiseSumConfig) -> Result<Self> {
        for (label, scale) in [
            ("a_scale", config.a_scale),
            ("b_scale", config.b_scale),
            ("output_scale", config.output_scale),
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(LayerError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    label, scale
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            a_multiplier: quantize_multiplier(config.a_scale / config.output_scale)?,
            b_multiplier: quantize_multiplier(config.b_scale / config.output_scale)?,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Precomputed multipliers for the two inputs
    pub fn multipliers(&self) -> (QuantizedMultiplier, QuantizedMultiplier) {
        (self.a_multiplier, self.b_multiplier)
    }

    /// Output shape; both inputs must share one shape
    pub fn reshape(&self, a: &Blob, b: &Blob) -> Result<Vec<usize>> {
        if a.shape() != b.shape() {
            return Err(LayerError::ShapeMismatch {
                expected: a.shape().to_vec(),
                got: b.shape().to_vec(),
            });
        }
        Ok(a.shape().to_vec())
    }

    pub fn forward(&self, rounding: &RoundingConfig, a: &Blob, b: &Blob) -> Result<Blob> {
        let shape = self.reshape(a, b)?;

        let mut lhs = a.data().to_vec();
        multiply_buffer(
            rounding,
            &format!("{}.a", self.name),
            &mut lhs,
            self.a_multiplier,
            self.config.round_mode,
            self.config.a_scale / self.config.output_scale,
        )?;

        let mut rhs = b.data().to_vec();
        multiply_buffer(
            rounding,
            &format!("{}.b", self.name),
            &mut rhs,
            self.b_multiplier,
            self.config.round_mode,
            self.config.b_scale / self.config.output_scale,
        )?;

        let mut sum: Vec<f32> = lhs.iter().zip(&rhs).map(|(&x, &y)| x + y).collect();
        saturate_int8(&mut sum);

        tracing::debug!(layer = %self.name, count = sum.len(), "Eltwise sum forward");
        Blob::from_data(&shape, sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscale_fixed_point::RoundingMode;

    fn layer(round_mode: QuantRoundMode) -> QuantizedEltwiseSum {
        let config = EltwiseSumConfig {
            a_scale: 0.5,
            b_scale: 0.25,
            output_scale: 1.0,
            round_mode,
        };
        QuantizedEltwiseSum::new("add", config).unwrap()
    }

    #[test]
    fn test_multipliers() {
        let (a, b) = layer(QuantRoundMode::DoublingHighMul).multipliers();
        assert_eq!(a.to_f64(), 0.5);
        assert_eq!(b.to_f64(), 0.25);
    }

    #[test]
    fn test_forward_double_round() {
        let layer = layer(QuantRoundMode::SingleRounding);
        let a = Blob::from_data(&[4], vec![100.0, 127.0, -128.0, 0.0]).unwrap();
        let b = Blob::from_data(&[4], vec![4.0, 8.0, -8.0, 127.0]).unwrap();
        let out = layer
            .forward(&RoundingConfig::new(RoundingMode::DoubleRound), &a, &b)
            .unwrap();
        // a/2 + b/4
        assert_eq!(out.data(), &[51.0, 66.0, -66.0, 32.0]);
    }

    #[test]
    fn test_forward_ev_round() {
        let layer = layer(QuantRoundMode::DoublingHighMul);
        let a = Blob::from_data(&[2], vec![5.0, 7.0]).unwrap();
        let b = Blob::from_data(&[2], vec![2.0, 6.0]).unwrap();
        let out = layer
            .forward(&RoundingConfig::new(RoundingMode::EvRound), &a, &b)
            .unwrap();
        // 2.5 -> 2, 3.5 -> 4; 0.5 -> 0, 1.5 -> 2
        assert_eq!(out.data(), &[2.0, 6.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let layer = layer(QuantRoundMode::DoublingHighMul);
        let a = Blob::zeros(&[2, 2]);
        let b = Blob::zeros(&[4]);
        assert!(matches!(
            layer.forward(&RoundingConfig::default(), &a, &b),
            Err(LayerError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_scale() {
        let config = EltwiseSumConfig {
            a_scale: -1.0,
            b_scale: 1.0,
            output_scale: 1.0,
            round_mode: QuantRoundMode::DoublingHighMul,
        };
        assert!(QuantizedEltwiseSum::new("add", config).is_err());
    }
}
