//! Host-curve emitter: retargeted keys -> one list of Bezier keyframes per
//! value component.
//!
//! Hermite segments become Bezier segments with handles a third of the way
//! along the segment, which reproduces the Hermite polynomial exactly.

use crate::action::{Handle, HostKeyframe, Interpolation, FRAME_EPSILON};
use crate::retarget::{RetargetedChannel, RetargetedKey};
use crate::segment::SegmentKind;

const LOG_TARGET: &str = "unity_retarget";

/// Handle length, in seconds, on the open side of the first and last keys.
pub const TERMINAL_HANDLE_SECONDS: f32 = 0.01;

/// Smallest gap, in frames, between the two keys of a stepped break.
pub const BREAK_FRAME_OFFSET: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmitSettings {
    /// Frames per second.
    pub sample_rate: f32,
    /// Degrade every Bezier segment to linear.
    pub always_linear: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmittedChannel {
    /// One key list per component, component order.
    pub components: Vec<Vec<HostKeyframe>>,
    /// Non-finite frames or values stored as zero.
    pub substitutions: usize,
}

fn host_tag(kind: SegmentKind, channel: &RetargetedChannel, settings: &EmitSettings) -> Interpolation {
    match kind {
        SegmentKind::Stepped => Interpolation::Constant,
        SegmentKind::Linear => Interpolation::Linear,
        SegmentKind::Hermite if channel.force_linear || settings.always_linear => {
            Interpolation::Linear
        }
        SegmentKind::Hermite => Interpolation::Bezier,
    }
}

fn finite_or_zero(v: f32, substitutions: &mut usize) -> f32 {
    if v.is_finite() {
        v
    } else {
        *substitutions += 1;
        0.0
    }
}

fn handle(frame: f32, value: f32, fallback: f32) -> Handle {
    Handle::new(frame, if value.is_finite() { value } else { fallback })
}

/// Keys landing on the same frame (a stepped break) would replace each other
/// in the host curve. Each such key moves just past its predecessor, far enough
/// to stay distinct at f32 precision.
fn separate_breaks(frames: &mut [f32]) {
    for i in 1..frames.len() {
        let prev = frames[i - 1];
        if frames[i] - prev <= FRAME_EPSILON {
            frames[i] = prev + BREAK_FRAME_OFFSET.max(prev.abs() * 1e-6);
        }
    }
}

/// Convert one retargeted channel into host keys.
pub fn emit_channel(channel: &RetargetedChannel, settings: &EmitSettings) -> EmittedChannel {
    let keys = &channel.keys;
    let n = keys.len();
    let count = channel.kind.component_count();
    let rate = settings.sample_rate;
    let mut substitutions = 0;

    let mut frames: Vec<f32> = keys
        .iter()
        .map(|k| finite_or_zero(k.time * rate, &mut substitutions))
        .collect();
    separate_breaks(&mut frames);
    let tags: Vec<Interpolation> = channel
        .segments
        .iter()
        .map(|s| host_tag(*s, channel, settings))
        .collect();
    let lone_tag = if channel.force_linear || settings.always_linear {
        Interpolation::Linear
    } else {
        Interpolation::Bezier
    };

    let mut components = Vec::with_capacity(count);
    for c in 0..count {
        let values: Vec<f32> = keys
            .iter()
            .map(|k| finite_or_zero(k.value.component(c), &mut substitutions))
            .collect();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let key: &RetargetedKey = &keys[i];
            let (f, v) = (frames[i], values[i]);
            let interpolation = if i + 1 < n {
                tags[i]
            } else if i > 0 {
                tags[i - 1]
            } else {
                lone_tag
            };

            let left = if i > 0 {
                let df = (f - frames[i - 1]) / 3.0;
                let dt = (key.time - keys[i - 1].time) / 3.0;
                match tags[i - 1] {
                    Interpolation::Bezier => handle(f - df, v - key.in_slope.component(c) * dt, v),
                    Interpolation::Linear => handle(f - df, v - (v - values[i - 1]) / 3.0, v),
                    Interpolation::Constant => Handle::new(f - df, v),
                }
            } else {
                let df = TERMINAL_HANDLE_SECONDS * rate;
                match tags.first() {
                    Some(Interpolation::Bezier) => handle(
                        f - df,
                        v - key.in_slope.component(c) * TERMINAL_HANDLE_SECONDS,
                        v,
                    ),
                    _ => Handle::new(f - df, v),
                }
            };

            let right = if i + 1 < n {
                let df = (frames[i + 1] - f) / 3.0;
                let dt = (keys[i + 1].time - key.time) / 3.0;
                match tags[i] {
                    Interpolation::Bezier => handle(f + df, v + key.out_slope.component(c) * dt, v),
                    Interpolation::Linear => handle(f + df, v + (values[i + 1] - v) / 3.0, v),
                    Interpolation::Constant => Handle::new(f + df, v),
                }
            } else {
                let df = TERMINAL_HANDLE_SECONDS * rate;
                match tags.last() {
                    Some(Interpolation::Bezier) => handle(
                        f + df,
                        v + key.out_slope.component(c) * TERMINAL_HANDLE_SECONDS,
                        v,
                    ),
                    _ => Handle::new(f + df, v),
                }
            };

            out.push(HostKeyframe {
                frame: f,
                value: v,
                left,
                right,
                interpolation,
            });
        }
        components.push(out);
    }

    if substitutions > 0 {
        log::warn!(
            target: LOG_TARGET,
            "{substitutions} non-finite frame or value component(s) stored as 0"
        );
    }

    EmittedChannel {
        components,
        substitutions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, ValueKind};

    fn scalar_key(time: f32, value: f32, in_slope: f32, out_slope: f32) -> RetargetedKey {
        RetargetedKey {
            time,
            value: Value::Scalar(value),
            in_slope: Value::Scalar(in_slope),
            out_slope: Value::Scalar(out_slope),
        }
    }

    fn channel(keys: Vec<RetargetedKey>, segments: Vec<SegmentKind>) -> RetargetedChannel {
        RetargetedChannel {
            kind: ValueKind::Scalar,
            keys,
            segments,
            force_linear: false,
            substitutions: 0,
        }
    }

    const SETTINGS: EmitSettings = EmitSettings {
        sample_rate: 30.0,
        always_linear: false,
    };

    #[test]
    fn hermite_handles_sit_at_thirds() {
        let ch = channel(
            vec![scalar_key(0.0, 0.0, 0.0, 3.0), scalar_key(1.0, 1.0, -3.0, 0.0)],
            vec![SegmentKind::Hermite],
        );
        let out = emit_channel(&ch, &SETTINGS);
        let keys = &out.components[0];
        assert_eq!(keys[0].right, Handle::new(10.0, 1.0));
        assert_eq!(keys[1].left, Handle::new(20.0, 2.0));
        assert_eq!(keys[0].interpolation, Interpolation::Bezier);
        assert_eq!(keys[1].interpolation, Interpolation::Bezier);
        assert!((keys[0].left.frame - (-0.3)).abs() < 1e-6);
    }

    #[test]
    fn stepped_handles_are_flat() {
        let ch = channel(
            vec![scalar_key(0.0, 0.0, 0.0, 0.0), scalar_key(1.0, 1.0, 0.0, 0.0)],
            vec![SegmentKind::Stepped],
        );
        let keys = &emit_channel(&ch, &SETTINGS).components[0];
        assert_eq!(keys[0].interpolation, Interpolation::Constant);
        assert_eq!(keys[0].right.value, 0.0);
        assert_eq!(keys[1].left.value, 1.0);
        assert_eq!(keys[1].interpolation, Interpolation::Constant);
    }

    #[test]
    fn linear_handles_follow_chord() {
        let ch = channel(
            vec![scalar_key(0.0, 0.0, 0.0, 5.0), scalar_key(1.0, 3.0, 5.0, 0.0)],
            vec![SegmentKind::Hermite],
        );
        let settings = EmitSettings {
            always_linear: true,
            ..SETTINGS
        };
        let keys = &emit_channel(&ch, &settings).components[0];
        assert_eq!(keys[0].interpolation, Interpolation::Linear);
        assert_eq!(keys[0].right, Handle::new(10.0, 1.0));
        assert_eq!(keys[1].left, Handle::new(20.0, 2.0));
    }

    #[test]
    fn single_key_and_non_finite_values() {
        let ch = channel(vec![scalar_key(f32::NAN, f32::INFINITY, 0.0, 0.0)], vec![]);
        let out = emit_channel(&ch, &SETTINGS);
        assert_eq!(out.substitutions, 2);
        let key = out.components[0][0];
        assert_eq!((key.frame, key.value), (0.0, 0.0));
        assert_eq!(key.interpolation, Interpolation::Bezier);
    }

    #[test]
    fn stepped_break_keeps_both_keys() {
        let ch = channel(
            vec![
                scalar_key(0.0, 0.0, 0.0, 1.0),
                scalar_key(1.0, 1.0, 1.0, 0.0),
                scalar_key(1.0, 5.0, 0.0, 0.0),
                scalar_key(2.0, 5.0, 0.0, 0.0),
            ],
            vec![SegmentKind::Hermite, SegmentKind::Stepped, SegmentKind::Hermite],
        );
        let keys = &emit_channel(&ch, &SETTINGS).components[0];
        assert_eq!(keys.len(), 4);
        assert!(keys.windows(2).all(|w| w[1].frame - w[0].frame > FRAME_EPSILON));
        assert_eq!((keys[1].frame, keys[1].value), (30.0, 1.0));
        assert_eq!(keys[1].interpolation, Interpolation::Constant);
        // The Hermite segment into the break is untouched.
        assert_eq!(keys[1].left, Handle::new(20.0, 1.0 - 1.0 / 3.0));
        assert_eq!(keys[2].value, 5.0);
        assert!(keys[2].frame > 30.0 && keys[2].frame < 30.01);
        assert_eq!(keys[3].frame, 60.0);
    }

    #[test]
    fn stepped_quaternion_segments_hold_on_all_components() {
        let q = |t: f32, value: [f32; 4]| RetargetedKey {
            time: t,
            value: Value::Quat(value),
            in_slope: Value::zero(ValueKind::Quat),
            out_slope: Value::zero(ValueKind::Quat),
        };
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let ch = RetargetedChannel {
            kind: ValueKind::Quat,
            keys: vec![q(0.0, [1.0, 0.0, 0.0, 0.0]), q(1.0, [h, h, 0.0, 0.0])],
            segments: vec![SegmentKind::Stepped],
            force_linear: true,
            substitutions: 0,
        };
        let out = emit_channel(&ch, &SETTINGS);
        assert_eq!(out.components.len(), 4);
        for keys in &out.components {
            assert_eq!(keys[0].interpolation, Interpolation::Constant);
            assert_eq!(keys[0].right.value, keys[0].value);
        }
        // Held values are unit quaternions, so the host never shows a blend.
        let held: f32 = out.components.iter().map(|k| k[0].value * k[0].value).sum();
        assert!((held - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quaternion_channels_emit_four_linear_curves() {
        let q = |t: f32, w: f32, x: f32| RetargetedKey {
            time: t,
            value: Value::Quat([w, x, 0.0, 0.0]),
            in_slope: Value::zero(ValueKind::Quat),
            out_slope: Value::zero(ValueKind::Quat),
        };
        let ch = RetargetedChannel {
            kind: ValueKind::Quat,
            keys: vec![q(0.0, 1.0, 0.0), q(1.0, 0.0, 1.0)],
            segments: vec![SegmentKind::Hermite],
            force_linear: true,
            substitutions: 0,
        };
        let out = emit_channel(&ch, &SETTINGS);
        assert_eq!(out.components.len(), 4);
        assert!(out
            .components
            .iter()
            .flatten()
            .all(|k| k.interpolation == Interpolation::Linear));
    }
}
