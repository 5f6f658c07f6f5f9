//! Interpolation helpers:
//! - lerp_f32 (linear)
//! - hermite_value (cubic Hermite with value/second tangents)
//! - cubic_bezier (Bernstein form)
//! - bezier_segment_value (2D Bezier evaluated at an x coordinate)
//!
//! Internal evaluation is done in `f64`; f32 keys lose too much precision when
//! the x-parameter is inverted by bisection on long clips.

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Cubic Bezier basis function.
#[inline]
pub fn cubic_bezier(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Cubic Hermite between `(t0, v0)` and `(t1, v1)` with outgoing tangent `m0`
/// and incoming tangent `m1` (both per second), evaluated at `time`.
pub fn hermite_value(t0: f32, v0: f32, m0: f32, t1: f32, v1: f32, m1: f32, time: f32) -> f32 {
    let dt = (t1 - t0) as f64;
    if dt <= 0.0 {
        return v0;
    }
    let s = ((time - t0) as f64 / dt).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    (h00 * v0 as f64 + h10 * dt * m0 as f64 + h01 * v1 as f64 + h11 * dt * m1 as f64) as f32
}

/// Find the Bezier parameter whose x coordinate equals `x`, by bisection.
/// Assumes x is monotone over the segment (handles do not overshoot the keys).
fn solve_parameter(x0: f64, x1: f64, x2: f64, x3: f64, x: f64) -> f64 {
    if x <= x0 {
        return 0.0;
    }
    if x >= x3 {
        return 1.0;
    }
    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    let mut mid = (x - x0) / (x3 - x0);
    for _ in 0..64 {
        let xm = cubic_bezier(x0, x1, x2, x3, mid);
        if (xm - x).abs() < 1e-12 {
            break;
        }
        if xm < x {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    mid
}

/// Evaluate the 2D cubic Bezier `p0..p3` (each `(x, y)`) at abscissa `x`.
pub fn bezier_segment_value(
    p0: (f32, f32),
    p1: (f32, f32),
    p2: (f32, f32),
    p3: (f32, f32),
    x: f32,
) -> f32 {
    let u = solve_parameter(p0.0 as f64, p1.0 as f64, p2.0 as f64, p3.0 as f64, x as f64);
    cubic_bezier(p0.1 as f64, p1.1 as f64, p2.1 as f64, p3.1 as f64, u) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hermite_endpoints_and_tangents() {
        assert_eq!(hermite_value(0.0, 1.0, 5.0, 2.0, 3.0, -1.0, 0.0), 1.0);
        assert!((hermite_value(0.0, 1.0, 5.0, 2.0, 3.0, -1.0, 2.0) - 3.0).abs() < 1e-6);
        // zero tangents: symmetric smoothstep
        assert!((hermite_value(0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn bezier_with_third_spaced_handles_matches_hermite() {
        let (t0, v0, m0, t1, v1, m1) = (0.0f32, 0.0f32, 2.0f32, 3.0f32, 1.0f32, -0.5f32);
        let d = (t1 - t0) / 3.0;
        let p1 = (t0 + d, v0 + m0 * d);
        let p2 = (t1 - d, v1 - m1 * d);
        for i in 0..=8 {
            let t = t0 + (t1 - t0) * i as f32 / 8.0;
            let b = bezier_segment_value((t0, v0), p1, p2, (t1, v1), t);
            let h = hermite_value(t0, v0, m0, t1, v1, m1, t);
            assert!((b - h).abs() < 1e-5, "t={t} bezier={b} hermite={h}");
        }
    }

    #[test]
    fn bezier_basis_hits_end_points_and_lerp_blends() {
        assert_eq!(cubic_bezier(0.0, 1.0, 2.0, 3.0, 0.0), 0.0);
        assert_eq!(cubic_bezier(0.0, 1.0, 2.0, 3.0, 1.0), 3.0);
        assert!((lerp_f32(2.0, 4.0, 0.25) - 2.5).abs() < 1e-6);
    }
}
