//! Quantized fully-connected layer
//!
//! int8 input `[batch, ...]` times int8 weights `[num_output, num_input]`,
//! accumulated in i64, then rescaled to the output quantization scale.
//! Accumulators are stored in the f32 blob, so they stay exact only while
//! `|acc| ≤ 2^24`.

use qscale_fixed_point::{scale_buffer, RoundingConfig};
use serde::{Deserialize, Serialize};

use crate::blob::{saturate_int8, Blob};
use crate::error::{LayerError, Result};

/// Quantization parameters of an inner-product layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InnerProductConfig {
    /// Output features
    pub num_output: usize,
    /// Real value of one input step
    pub input_scale: f64,
    /// Real value of one weight step
    pub weight_scale: f64,
    /// Real value of one output step
    pub output_scale: f64,
}

/// int8 inner product with fixed-point output rescale
#[derive(Debug, Clone)]
pub struct QuantizedInnerProduct {
    name: String,
    config: InnerProductConfig,
    num_input: usize,
    /// Row-major `[num_output, num_input]`
    weights: Vec<i8>,
    /// Bias at accumulator scale (`input_scale * weight_scale`)
    bias: Option<Vec<i32>>,
}

impl QuantizedInnerProduct {
    pub fn new(
        name: impl Into<String>,
        config: InnerProductConfig,
        num_input: usize,
        weights: Vec<i8>,
        bias: Option<Vec<i32>>,
    ) -> Result<Self> {
        for (label, scale) in [
            ("input_scale", config.input_scale),
            ("weight_scale", config.weight_scale),
            ("output_scale", config.output_scale),
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(LayerError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    label, scale
                )));
            }
        }

        let expected = config.num_output * num_input;
        if weights.len() != expected {
            return Err(LayerError::DimensionMismatch {
                expected,
                got: weights.len(),
            });
        }

        if let Some(ref b) = bias {
            if b.len() != config.num_output {
                return Err(LayerError::DimensionMismatch {
                    expected: config.num_output,
                    got: b.len(),
                });
            }
        }

        Ok(Self {
            name: name.into(),
            config,
            num_input,
            weights,
            bias,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Factor applied to accumulators: `input_scale * weight_scale / output_scale`
    pub fn rescale_factor(&self) -> f64 {
        self.config.input_scale * self.config.weight_scale / self.config.output_scale
    }

    /// Output shape `[batch, num_output]` for an input blob
    pub fn reshape(&self, input: &Blob) -> Result<Vec<usize>> {
        if input.num_axes() == 0 {
            return Err(LayerError::InvalidParameter(
                "inner product input needs a batch axis".to_string(),
            ));
        }
        let features = input.count_range(1, input.num_axes());
        if features != self.num_input {
            return Err(LayerError::DimensionMismatch {
                expected: self.num_input,
                got: features,
            });
        }
        Ok(vec![input.shape()[0], self.config.num_output])
    }

    /// Raw accumulators `[batch, num_output]` before rescaling
    pub fn accumulate(&self, input: &Blob) -> Result<Blob> {
        let shape = self.reshape(input)?;
        let batch = shape[0];
        let mut output = Blob::zeros(&shape);

        let x = input.data();
        let out = output.data_mut();
        for b in 0..batch {
            let row = &x[b * self.num_input..(b + 1) * self.num_input];
            for o in 0..self.config.num_output {
                let w = &self.weights[o * self.num_input..(o + 1) * self.num_input];
                let mut acc: i64 = row
                    .iter()
                    .zip(w)
                    .map(|(&xi, &wi)| (xi as i64) * (wi as i64))
                    .sum();
                if let Some(ref bias) = self.bias {
                    acc += bias[o] as i64;
                }
                out[b * self.config.num_output + o] = acc as f32;
            }
        }

        Ok(output)
    }

    /// Accumulate, rescale with `rounding`, and saturate to int8
    pub fn forward(&self, rounding: &RoundingConfig, input: &Blob) -> Result<Blob> {
        let mut output = self.accumulate(input)?;
        scale_buffer(rounding, &self.name, output.data_mut(), self.rescale_factor())?;
        saturate_int8(output.data_mut());

        tracing::debug!(layer = %self.name, shape = ?output.shape(), "Inner product forward");
        Ok(output)
    }
}
