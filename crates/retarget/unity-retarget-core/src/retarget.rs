//! Curve retargeting: basis change plus pose-space projection of values and
//! slopes, quaternion continuity and Euler winding preservation.
//!
//! Output quaternions are host-ordered `(w, x, y, z)`; vectors are host basis.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use std::f32::consts::TAU;
use thiserror::Error;

use crate::basis;
use crate::segment::{PreparedCurve, SegmentKind};
use crate::skeleton::RestPose;
use crate::value::{Value, ValueKind};

/// Rotation applied on both sides of a converted rotation: `pre · q · post`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reframe {
    pub pre: UnitQuaternion<f32>,
    pub post: UnitQuaternion<f32>,
}

impl Reframe {
    pub fn identity() -> Self {
        Self {
            pre: UnitQuaternion::identity(),
            post: UnitQuaternion::identity(),
        }
    }

    /// Projection into the pose space of a joint with the given rest pose.
    pub fn pose(rest: &RestPose) -> Self {
        Self {
            pre: rest.rotation.conjugate(),
            post: UnitQuaternion::identity(),
        }
    }

    /// Host camera axes onto converted Unity camera axes.
    pub fn camera() -> Self {
        Self {
            pre: UnitQuaternion::identity(),
            post: basis::camera_axis_fix(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.pre.angle() <= 1e-7 && self.post.angle() <= 1e-7
    }

    fn apply(&self, q: &Quaternion<f32>) -> Quaternion<f32> {
        self.pre.quaternion() * q * self.post.quaternion()
    }
}

/// Per-channel value transform chosen from the binding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChannelTransform {
    /// Quaternion channel.
    Rotation(Reframe),
    /// Euler channel (degrees in, radians out, host YXZ order).
    Euler(Reframe),
    /// `rotation · (point(v) − offset)`.
    Translation {
        rotation: UnitQuaternion<f32>,
        offset: Vector3<f32>,
    },
    Scale,
    /// Scalar value and slope divided by `divisor`.
    Scalar { divisor: f32 },
    /// One component of a Unity 3-vector, scaled, as a scalar channel.
    VectorComponent { index: usize, factor: f32 },
}

impl ChannelTransform {
    pub fn pose_rotation(rest: &RestPose) -> Self {
        ChannelTransform::Rotation(Reframe::pose(rest))
    }

    pub fn pose_euler(rest: &RestPose) -> Self {
        ChannelTransform::Euler(Reframe::pose(rest))
    }

    pub fn pose_translation(rest: &RestPose) -> Self {
        ChannelTransform::Translation {
            rotation: rest.rotation.conjugate(),
            offset: rest.translation,
        }
    }

    pub fn camera_translation() -> Self {
        ChannelTransform::Translation {
            rotation: UnitQuaternion::identity(),
            offset: Vector3::zeros(),
        }
    }

    /// Value kind the transform consumes.
    pub fn input_kind(&self) -> ValueKind {
        match self {
            ChannelTransform::Rotation(_) => ValueKind::Quat,
            ChannelTransform::Euler(_)
            | ChannelTransform::Translation { .. }
            | ChannelTransform::Scale
            | ChannelTransform::VectorComponent { .. } => ValueKind::Vec3,
            ChannelTransform::Scalar { .. } => ValueKind::Scalar,
        }
    }

    /// Value kind the transform produces.
    pub fn output_kind(&self) -> ValueKind {
        match self {
            ChannelTransform::Rotation(_) => ValueKind::Quat,
            ChannelTransform::Euler(_)
            | ChannelTransform::Translation { .. }
            | ChannelTransform::Scale => ValueKind::Vec3,
            ChannelTransform::Scalar { .. } | ChannelTransform::VectorComponent { .. } => {
                ValueKind::Scalar
            }
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transform expects {expected:?} keys, curve carries {found:?}")]
pub struct TransformMismatch {
    pub expected: ValueKind,
    pub found: ValueKind,
}

/// A key after retargeting. Time stays in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetargetedKey {
    pub time: f32,
    pub value: Value,
    pub in_slope: Value,
    pub out_slope: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetargetedChannel {
    pub kind: ValueKind,
    pub keys: Vec<RetargetedKey>,
    pub segments: Vec<SegmentKind>,
    /// Bezier segments must be emitted as linear (quaternion channels).
    pub force_linear: bool,
    /// Components zeroed while preparing the source curve.
    pub substitutions: usize,
}

fn vec3(v: &Value) -> [f32; 3] {
    [v.component(0), v.component(1), v.component(2)]
}

fn quat4(v: &Value) -> [f32; 4] {
    [v.component(0), v.component(1), v.component(2), v.component(3)]
}

fn host_quat_value(q: &Quaternion<f32>) -> Value {
    Value::Quat([q.w, q.i, q.j, q.k])
}

fn to_value(v: Vector3<f32>) -> Value {
    Value::Vec3([v.x, v.y, v.z])
}

/// Project one basis-converted Euler triple through `frame`, keeping the
/// authored number of whole turns per component.
pub fn reframe_euler(h: &Vector3<f32>, frame: &Reframe) -> Vector3<f32> {
    if frame.is_identity() {
        return *h;
    }
    let turns = h.map(|c| (c / TAU).round());
    let principal = h - turns * TAU;
    let q = frame.pre * basis::euler_yxz_to_quat(&principal) * frame.post;
    let e = basis::quat_to_euler_yxz(&q);
    basis::make_compatible(&e, &principal) + turns * TAU
}

/// Negate quaternion keys whose dot product with their predecessor is negative.
pub fn enforce_quat_continuity(keys: &mut [RetargetedKey]) {
    for i in 1..keys.len() {
        let prev = keys[i - 1].value;
        let dot: f32 = prev
            .components()
            .iter()
            .zip(keys[i].value.components())
            .map(|(a, b)| a * b)
            .sum();
        if dot < 0.0 {
            keys[i].value = keys[i].value.map(|c| -c);
        }
    }
}

/// Retarget every key of a prepared curve.
pub fn retarget(
    curve: &PreparedCurve,
    transform: &ChannelTransform,
) -> Result<RetargetedChannel, TransformMismatch> {
    let expected = transform.input_kind();
    if let Some(key) = curve.keys.iter().find(|k| k.value.kind() != expected) {
        return Err(TransformMismatch {
            expected,
            found: key.value.kind(),
        });
    }

    let mut keys: Vec<RetargetedKey> = curve
        .keys
        .iter()
        .map(|key| {
            let (value, in_slope, out_slope) = match transform {
                ChannelTransform::Rotation(frame) => {
                    let q = frame.apply(&basis::quat(quat4(&key.value)));
                    let unit = if q.norm_squared() > f32::EPSILON {
                        q.normalize()
                    } else {
                        Quaternion::identity()
                    };
                    let zero = Value::zero(ValueKind::Quat);
                    (host_quat_value(&unit), zero, zero)
                }
                ChannelTransform::Euler(frame) => (
                    to_value(reframe_euler(&basis::euler(vec3(&key.value)), frame)),
                    to_value(basis::euler_slope(vec3(&key.in_slope))),
                    to_value(basis::euler_slope(vec3(&key.out_slope))),
                ),
                ChannelTransform::Translation { rotation, offset } => (
                    to_value(rotation * (basis::point(vec3(&key.value)) - offset)),
                    to_value(rotation * basis::point_slope(vec3(&key.in_slope))),
                    to_value(rotation * basis::point_slope(vec3(&key.out_slope))),
                ),
                ChannelTransform::Scale => (
                    to_value(basis::scale(vec3(&key.value))),
                    to_value(basis::scale_slope(vec3(&key.in_slope))),
                    to_value(basis::scale_slope(vec3(&key.out_slope))),
                ),
                ChannelTransform::Scalar { divisor } => (
                    key.value.map(|c| c / divisor),
                    key.in_slope.map(|c| c / divisor),
                    key.out_slope.map(|c| c / divisor),
                ),
                ChannelTransform::VectorComponent { index, factor } => (
                    Value::Scalar(key.value.component(*index) * factor),
                    Value::Scalar(key.in_slope.component(*index) * factor),
                    Value::Scalar(key.out_slope.component(*index) * factor),
                ),
            };
            RetargetedKey {
                time: key.time,
                value,
                in_slope,
                out_slope,
            }
        })
        .collect();

    let force_linear = matches!(transform, ChannelTransform::Rotation(_));
    if force_linear {
        enforce_quat_continuity(&mut keys);
    }

    Ok(RetargetedChannel {
        kind: transform.output_kind(),
        keys,
        segments: curve.segments.clone(),
        force_linear,
        substitutions: curve.substitutions,
    })
}
