//! Channel value kinds and typed values for keyframes and slopes.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Vec3,
    Quat,
}

impl ValueKind {
    /// Number of host curves a channel of this kind produces.
    #[inline]
    pub fn component_count(self) -> usize {
        match self {
            ValueKind::Scalar => 1,
            ValueKind::Vec3 => 3,
            ValueKind::Quat => 4,
        }
    }
}

/// A keyframe value or slope.
///
/// Quaternion components follow the native order of the space the value lives
/// in: Unity keys are `(x, y, z, w)`, retargeted host keys are `(w, x, y, z)`
/// so that component `i` maps directly onto host curve index `i`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Scalar(f32),
    Vec3([f32; 3]),
    Quat([f32; 4]),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Quat(_) => ValueKind::Quat,
        }
    }

    /// All-zero value of the given kind.
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Scalar => Value::Scalar(0.0),
            ValueKind::Vec3 => Value::Vec3([0.0; 3]),
            ValueKind::Quat => Value::Quat([0.0; 4]),
        }
    }

    #[inline]
    pub fn components(&self) -> &[f32] {
        match self {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Vec3(v) => v,
            Value::Quat(v) => v,
        }
    }

    #[inline]
    pub fn components_mut(&mut self) -> &mut [f32] {
        match self {
            Value::Scalar(v) => std::slice::from_mut(v),
            Value::Vec3(v) => v,
            Value::Quat(v) => v,
        }
    }

    #[inline]
    pub fn component(&self, index: usize) -> f32 {
        self.components().get(index).copied().unwrap_or(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }

    /// Apply `f` to every component.
    pub fn map(mut self, f: impl Fn(f32) -> f32) -> Self {
        for c in self.components_mut() {
            *c = f(*c);
        }
        self
    }
}
