use super::tolerance::{clamp01, EPS_DENOM};
use crate::model::Vec3;

/// Closest points between segments `p1`-`q1` and `p2`-`q2`.
///
/// Standard clamped closest-point computation; degenerate (point-like)
/// segments fall out of the denominator guards.
pub fn segment_closest_points(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_sq();
    let e = d2.length_sq();
    let f = d2.dot(r);

    let (mut s, mut t);
    if a <= EPS_DENOM && e <= EPS_DENOM {
        return (p1, p2);
    }
    if a <= EPS_DENOM {
        s = 0.0;
        t = clamp01(f / e);
    } else {
        let c = d1.dot(r);
        if e <= EPS_DENOM {
            t = 0.0;
            s = clamp01(-c / a);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            s = if denom > EPS_DENOM { clamp01((b * f - c * e) / denom) } else { 0.0 };
            t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = clamp01(-c / a);
            } else if t > 1.0 {
                t = 1.0;
                s = clamp01((b - c) / a);
            }
        }
    }

    (p1 + d1 * s, p2 + d2 * t)
}

/// Squared minimum distance between two 3-D segments.
pub fn segment_dist_sq(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> f64 {
    let (a, b) = segment_closest_points(p1, q1, p2, q2);
    a.dist_sq(b)
}
