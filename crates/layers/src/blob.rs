//! N-dimensional value storage shared between layers

use crate::error::{LayerError, Result};

pub const INT8_MIN: f32 = -128.0;
pub const INT8_MAX: f32 = 127.0;

/// Shaped buffer of f32 values
///
/// Quantized layers keep integer values in the f32 slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Blob {
    /// Create a zero-filled blob
    pub fn zeros(shape: &[usize]) -> Self {
        let count = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; count],
        }
    }

    /// Create a blob from existing data
    pub fn from_data(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let count: usize = shape.iter().product();
        if data.len() != count {
            return Err(LayerError::DimensionMismatch {
                expected: count,
                got: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    /// Quantize real values to int8 with `q = round(v / scale)`
    pub fn quantize(shape: &[usize], values: &[f32], scale: f32) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(LayerError::InvalidParameter(format!(
                "quantization scale must be positive, got {}",
                scale
            )));
        }
        let data = values
            .iter()
            .map(|&v| (v / scale).round().clamp(INT8_MIN, INT8_MAX))
            .collect();
        Self::from_data(shape, data)
    }

    /// Real values represented by an int8 blob at `scale`
    pub fn dequantize(&self, scale: f32) -> Vec<f32> {
        self.data.iter().map(|&q| q * scale).collect()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn num_axes(&self) -> usize {
        self.shape.len()
    }

    /// Total element count
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Product of dimensions `start..end`
    ///
    /// # Panics
    /// Panics if `start > end` or `end > self.num_axes()`.
    pub fn count_range(&self, start: usize, end: usize) -> usize {
        self.shape[start..end].iter().product()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Change shape, resizing storage (new elements are zero)
    pub fn reshape(&mut self, shape: &[usize]) {
        self.shape = shape.to_vec();
        self.data.resize(shape.iter().product(), 0.0);
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Clamp every value to the int8 range
pub fn saturate_int8(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = v.clamp(INT8_MIN, INT8_MAX);
    }
}
