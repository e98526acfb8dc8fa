use std::fmt::{Debug, Display, LowerExp};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for the scalar type of a control space (`f32`, `f64`).
///
/// Bundles the numeric and formatting traits the algorithms need for costs,
/// residuals and step lengths.
pub trait Float:
    NumFloat
    + FloatConst
    + FromPrimitive
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + LowerExp
    + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}

/// Convert an `f64` literal into `F`.
///
/// Used for algorithm constants such as `0.25` or `1e-10`. Every finite `f64`
/// has an `f32`/`f64` representation, so the NaN fallback is unreachable for
/// the provided implementors.
#[inline]
pub fn lit<F: Float>(x: f64) -> F {
    F::from_f64(x).unwrap_or_else(F::nan)
}

/// Widen `x` to `f64` for formatting and error payloads.
#[inline]
pub fn to_f64<F: Float>(x: F) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}
