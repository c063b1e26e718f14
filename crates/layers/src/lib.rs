//! qscale Quantized Layers
//!
//! Numeric layers that accumulate int8 products exactly and hand the
//! accumulators to the fixed-point rescale stage:
//! `acc * input_scale * weight_scale / output_scale`, then saturate to int8.
//!
//! Values travel in float blobs holding integers, as on the hardware
//! emulation path.

mod blob;
mod eltwise;
mod error;
mod inner_product;

pub use blob::{saturate_int8, Blob, INT8_MAX, INT8_MIN};
pub use eltwise::{EltwiseSumConfig, QuantizedEltwiseSum};
pub use error::{LayerError, Result};
pub use inner_product::{InnerProductConfig, QuantizedInnerProduct};
