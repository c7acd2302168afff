// Centralized tolerances and helpers for robust geometry

pub const EPS_LEN: f64 = 1e-12; // zero-length vector threshold
pub const EPS_DENOM: f64 = 1e-12; // denominator guard for ratios

/// Default distance at which two edge segments are considered intersecting.
pub const DEFAULT_CROSSING_TOLERANCE: f64 = 0.001;

#[inline]
pub fn clamp01(x: f64) -> f64 {
    x.max(0.0).min(1.0)
}

/// Dot-product magnitude equivalent of an angle in degrees. 0 deg -> 1,
/// 90 deg -> 0.
#[inline]
pub fn degrees_to_dot(angle: f64) -> f64 {
    angle.to_radians().cos()
}
