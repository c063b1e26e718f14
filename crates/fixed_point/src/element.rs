//! Accumulator element types
//!
//! Layers keep accumulators in whatever storage their blobs use: float
//! blobs holding integer values, or native integer buffers. The rescale
//! paths go through this trait so one implementation serves both.

/// Numeric storage type of an accumulator buffer
pub trait AccumElement: Copy + std::fmt::Debug {
    /// Widen to f64
    fn to_f64(self) -> f64;

    /// Store an f64 result with the type's native conversion
    /// (IEEE rounding for floats, truncation toward zero with saturation
    /// for integers)
    fn from_f64(value: f64) -> Self;

    /// Integer view of the stored value (floats truncate toward zero)
    fn to_i64(self) -> i64;

    /// Store an integer result, saturating to the type's range
    fn from_i64(value: i64) -> Self;
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl AccumElement for $t {
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            #[inline]
            fn from_i64(value: i64) -> Self {
                value as $t
            }
        }
    )*};
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl AccumElement for $t {
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            #[inline]
            fn from_i64(value: i64) -> Self {
                value.clamp(<$t>::MIN as i64, <$t>::MAX as i64) as $t
            }
        }
    )*};
}

impl_float_element!(f32, f64);
impl_int_element!(i8, i16, i32, i64);
