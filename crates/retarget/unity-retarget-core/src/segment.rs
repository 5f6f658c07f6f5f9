//! Segment classification and keyframe sanitising.
//!
//! Classification runs on the raw Unity keys, before any slope is touched,
//! since the stepped marker lives in the slope fields. Afterwards every
//! component is made finite so downstream math never sees NaN or infinity.

use crate::data::{Curve, Keyframe, SegmentHint};
use crate::value::Value;

/// Slope value Unity writes for a stepped segment end.
pub const STEPPED_SENTINEL: f32 = f32::INFINITY;

/// Slopes at or above this magnitude are treated as corrupt.
pub const SLOPE_LIMIT: f32 = 1e18;

/// Normalised interpolation of the segment between two consecutive keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// Hold the left key's value until the right key.
    Stepped,
    /// Straight line between the two values.
    Linear,
    /// Cubic Hermite from the left out-slope and right in-slope.
    Hermite,
}

/// Why a curve cannot be retargeted at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveDefect {
    Empty,
    DecreasingTime { index: usize },
    ValueKindMismatch { index: usize },
}

impl CurveDefect {
    pub fn describe(&self) -> String {
        match self {
            CurveDefect::Empty => "curve has no keyframes".to_string(),
            CurveDefect::DecreasingTime { index } => {
                format!("keyframe {index} is earlier than its predecessor")
            }
            CurveDefect::ValueKindMismatch { index } => {
                format!("keyframe {index} does not match the attribute's value kind")
            }
        }
    }
}

/// A curve ready for retargeting: finite keys plus one kind per segment.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedCurve {
    pub keys: Vec<Keyframe>,
    /// `keys.len() - 1` entries; segment `i` spans `keys[i]..keys[i + 1]`.
    pub segments: Vec<SegmentKind>,
    /// Number of components replaced with zero.
    pub substitutions: usize,
}

fn has_stepped_marker(v: &Value) -> bool {
    v.components().iter().any(|c| *c == STEPPED_SENTINEL)
}

fn is_zero(v: &Value) -> bool {
    v.components().iter().all(|c| *c == 0.0)
}

/// Classify the segment from `left` to `right`.
pub fn classify(left: &Keyframe, right: &Keyframe) -> SegmentKind {
    if has_stepped_marker(&left.out_slope)
        || has_stepped_marker(&right.in_slope)
        || left.segment == SegmentHint::Stepped
        || right.time <= left.time
    {
        SegmentKind::Stepped
    } else if left.segment == SegmentHint::Linear
        && is_zero(&left.out_slope)
        && is_zero(&right.in_slope)
    {
        SegmentKind::Linear
    } else {
        SegmentKind::Hermite
    }
}

fn sanitize_value(v: &mut Value) -> usize {
    let mut replaced = 0;
    for c in v.components_mut() {
        if !c.is_finite() {
            *c = 0.0;
            replaced += 1;
        }
    }
    replaced
}

fn sanitize_slope(v: &mut Value) -> usize {
    let mut replaced = 0;
    for c in v.components_mut() {
        if *c == STEPPED_SENTINEL {
            *c = 0.0;
        } else if !c.is_finite() || c.abs() >= SLOPE_LIMIT {
            *c = 0.0;
            replaced += 1;
        }
    }
    replaced
}

/// Validate a curve, classify its segments and replace unusable components.
pub fn prepare_curve(curve: &Curve) -> Result<PreparedCurve, CurveDefect> {
    if curve.keyframes.is_empty() {
        return Err(CurveDefect::Empty);
    }
    let kind = curve.attribute.value_kind();
    for (index, key) in curve.keyframes.iter().enumerate() {
        if key.value.kind() != kind || key.in_slope.kind() != kind || key.out_slope.kind() != kind
        {
            return Err(CurveDefect::ValueKindMismatch { index });
        }
    }

    let mut keys = curve.keyframes.clone();
    let mut substitutions = 0;
    for key in keys.iter_mut() {
        if !key.time.is_finite() {
            key.time = 0.0;
            substitutions += 1;
        }
    }
    for index in 1..keys.len() {
        if keys[index].time < keys[index - 1].time {
            return Err(CurveDefect::DecreasingTime { index });
        }
    }

    let segments = keys.windows(2).map(|w| classify(&w[0], &w[1])).collect();

    for key in keys.iter_mut() {
        substitutions += sanitize_value(&mut key.value);
        substitutions += sanitize_slope(&mut key.in_slope);
        substitutions += sanitize_slope(&mut key.out_slope);
    }

    Ok(PreparedCurve {
        keys,
        segments,
        substitutions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Attribute;

    fn scalar_curve(keys: Vec<Keyframe>) -> Curve {
        Curve::new(1, Attribute::UserFloat { name_hash: 7 }, keys)
    }

    #[test]
    fn infinite_slope_marks_stepped() {
        let curve = scalar_curve(vec![
            Keyframe::scalar(0.0, 0.0, 0.0, f32::INFINITY),
            Keyframe::scalar(0.5, 1.0, 0.0, 0.0),
            Keyframe::scalar(1.0, 0.0, f32::INFINITY, 0.0),
        ]);
        let prepared = prepare_curve(&curve).unwrap();
        assert_eq!(prepared.segments, vec![SegmentKind::Stepped, SegmentKind::Stepped]);
        assert_eq!(prepared.substitutions, 0);
        assert_eq!(prepared.keys[0].out_slope, Value::Scalar(0.0));
    }

    #[test]
    fn linear_needs_flag_and_zero_slopes() {
        let curve = scalar_curve(vec![
            Keyframe::scalar(0.0, 0.0, 0.0, 0.0).with_segment(SegmentHint::Linear),
            Keyframe::scalar(1.0, 1.0, 0.0, 2.0).with_segment(SegmentHint::Linear),
            Keyframe::scalar(2.0, 0.0, 0.0, 0.0),
            Keyframe::scalar(3.0, 1.0, 0.0, 0.0),
        ]);
        let prepared = prepare_curve(&curve).unwrap();
        assert_eq!(
            prepared.segments,
            vec![SegmentKind::Linear, SegmentKind::Hermite, SegmentKind::Hermite]
        );
    }

    #[test]
    fn flag_and_zero_time_segments_are_stepped() {
        let curve = scalar_curve(vec![
            Keyframe::scalar(0.0, 0.0, 0.0, 0.0).with_segment(SegmentHint::Stepped),
            Keyframe::scalar(1.0, 1.0, 0.0, 0.0),
            Keyframe::scalar(1.0, 2.0, 0.0, 0.0),
        ]);
        let prepared = prepare_curve(&curve).unwrap();
        assert_eq!(prepared.segments, vec![SegmentKind::Stepped, SegmentKind::Stepped]);
    }

    #[test]
    fn corrupt_components_are_zeroed_and_counted() {
        let curve = scalar_curve(vec![
            Keyframe::scalar(0.0, f32::NAN, f32::NEG_INFINITY, 1e18),
            Keyframe::scalar(1.0, 1.0, -2e18, 0.5),
        ]);
        let prepared = prepare_curve(&curve).unwrap();
        assert_eq!(prepared.substitutions, 4);
        assert_eq!(prepared.keys[0].value, Value::Scalar(0.0));
        assert_eq!(prepared.keys[1].out_slope, Value::Scalar(0.5));
    }

    #[test]
    fn structural_defects() {
        assert_eq!(prepare_curve(&scalar_curve(vec![])), Err(CurveDefect::Empty));
        let curve = scalar_curve(vec![
            Keyframe::scalar(1.0, 0.0, 0.0, 0.0),
            Keyframe::scalar(0.5, 0.0, 0.0, 0.0),
        ]);
        assert_eq!(
            prepare_curve(&curve),
            Err(CurveDefect::DecreasingTime { index: 1 })
        );
        let curve = scalar_curve(vec![Keyframe::vec3(0.0, [0.0; 3], [0.0; 3], [0.0; 3])]);
        assert_eq!(
            prepare_curve(&curve),
            Err(CurveDefect::ValueKindMismatch { index: 0 })
        );
    }
}
