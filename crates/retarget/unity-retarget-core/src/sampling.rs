//! Reference evaluation of source (Unity) curves.
//!
//! Model:
//! - Before the first key and after the last key the curve holds its end value.
//! - Stepped segments hold the left value; linear segments lerp; everything
//!   else is a cubic Hermite with the left out-slope and right in-slope.
//!
//! Used to check emitted host curves against the clip they came from, and by
//! tooling that needs source values without importing.

use crate::data::Curve;
use crate::interp::{hermite_value, lerp_f32};
use crate::segment::{prepare_curve, PreparedCurve, SegmentKind};
use crate::value::Value;

/// Find the segment `[i, i + 1]` containing `time`, or `None` outside the keys.
fn find_segment(curve: &PreparedCurve, time: f32) -> Option<usize> {
    let keys = &curve.keys;
    if keys.len() < 2 || time < keys[0].time || time >= keys[keys.len() - 1].time {
        return None;
    }
    let right = keys.partition_point(|k| k.time <= time);
    Some(right - 1)
}

/// Sample a prepared curve at `time` seconds.
pub fn sample_prepared(curve: &PreparedCurve, time: f32) -> Value {
    let keys = &curve.keys;
    let (first, last) = match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Value::Scalar(0.0),
    };
    let i = match find_segment(curve, time) {
        Some(i) => i,
        None if time < first.time => return first.value,
        None => return last.value,
    };
    let (a, b) = (&keys[i], &keys[i + 1]);
    let kind = curve.segments.get(i).copied().unwrap_or(SegmentKind::Stepped);
    let mut out = a.value;
    for (c, slot) in out.components_mut().iter_mut().enumerate() {
        let (v0, v1) = (a.value.component(c), b.value.component(c));
        *slot = match kind {
            SegmentKind::Stepped => v0,
            SegmentKind::Linear => lerp_f32(v0, v1, (time - a.time) / (b.time - a.time)),
            SegmentKind::Hermite => hermite_value(
                a.time,
                v0,
                a.out_slope.component(c),
                b.time,
                v1,
                b.in_slope.component(c),
                time,
            ),
        };
    }
    out
}

/// Sample a raw Unity curve; `None` when the curve is structurally malformed.
pub fn sample_unity_curve(curve: &Curve, time: f32) -> Option<Value> {
    prepare_curve(curve).ok().map(|p| sample_prepared(&p, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, Keyframe, SegmentHint};

    fn curve(keys: Vec<Keyframe>) -> Curve {
        Curve::new(0, Attribute::UserFloat { name_hash: 0 }, keys)
    }

    #[test]
    fn stepped_holds_left_value() {
        let c = curve(vec![
            Keyframe::scalar(0.0, 0.0, 0.0, f32::INFINITY),
            Keyframe::scalar(0.5, 1.0, 0.0, 0.0),
            Keyframe::scalar(1.0, 0.0, f32::INFINITY, 0.0),
        ]);
        assert_eq!(sample_unity_curve(&c, 0.25), Some(Value::Scalar(0.0)));
        assert_eq!(sample_unity_curve(&c, 0.75), Some(Value::Scalar(1.0)));
        assert_eq!(sample_unity_curve(&c, 1.5), Some(Value::Scalar(0.0)));
        assert_eq!(sample_unity_curve(&c, -1.0), Some(Value::Scalar(0.0)));
    }

    #[test]
    fn linear_and_hermite_segments() {
        let c = curve(vec![
            Keyframe::scalar(0.0, 0.0, 0.0, 0.0).with_segment(SegmentHint::Linear),
            Keyframe::scalar(1.0, 2.0, 0.0, 1.0),
            Keyframe::scalar(2.0, 3.0, 1.0, 0.0),
        ]);
        assert_eq!(sample_unity_curve(&c, 0.5), Some(Value::Scalar(1.0)));
        // Hermite with slope 1 on both ends of a unit-slope segment is a line.
        let v = sample_unity_curve(&c, 1.5).unwrap().component(0);
        assert!((v - 2.5).abs() < 1e-6);
    }

    #[test]
    fn malformed_curves_are_not_sampled() {
        assert_eq!(sample_unity_curve(&curve(vec![]), 0.0), None);
    }
}
