//! Unity clip data model: keyframes, curves and the clip envelope.
//! Value/ValueKind are defined in value.rs.

use serde::{Deserialize, Serialize};

use crate::error::FatalClipError;
use crate::path_hash::PathHash;
use crate::value::{Value, ValueKind};

/// What a curve drives on its bound target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribute {
    /// Local position (3-vector).
    Translation,
    /// Local rotation quaternion, Unity `(x, y, z, w)`.
    Rotation,
    /// Local rotation as Euler degrees, ZXY composition.
    Euler,
    /// Local non-uniform scale.
    Scale,
    /// Blend-shape weight in 0..100; the hash names the shape.
    BlendShape { name_hash: u32 },
    /// Named scalar property; the hash is CRC-32 of the property name.
    UserFloat { name_hash: u32 },
}

impl Attribute {
    /// Value kind every key (and slope) of a curve with this attribute must carry.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Attribute::Translation | Attribute::Euler | Attribute::Scale => ValueKind::Vec3,
            Attribute::Rotation => ValueKind::Quat,
            Attribute::BlendShape { .. } | Attribute::UserFloat { .. } => ValueKind::Scalar,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Translation => "translation",
            Attribute::Rotation => "rotation",
            Attribute::Euler => "euler",
            Attribute::Scale => "scale",
            Attribute::BlendShape { .. } => "blend-shape",
            Attribute::UserFloat { .. } => "user-float",
        }
    }
}

/// Out-of-band marker describing the segment that starts at a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentHint {
    /// Classified from slopes alone.
    #[default]
    Auto,
    /// Linear when both adjoining slopes are zero.
    Linear,
    /// Hold the left value regardless of slopes.
    Stepped,
}

/// One Unity key: time in seconds, value and tangents in the channel's value space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: Value,
    pub in_slope: Value,
    pub out_slope: Value,
    #[serde(default)]
    pub segment: SegmentHint,
}

impl Keyframe {
    /// Key with explicit tangents.
    pub fn new(time: f32, value: Value, in_slope: Value, out_slope: Value) -> Self {
        Self {
            time,
            value,
            in_slope,
            out_slope,
            segment: SegmentHint::Auto,
        }
    }

    /// Key with zero tangents.
    pub fn flat(time: f32, value: Value) -> Self {
        let zero = Value::zero(value.kind());
        Self::new(time, value, zero, zero)
    }

    pub fn scalar(time: f32, value: f32, in_slope: f32, out_slope: f32) -> Self {
        Self::new(
            time,
            Value::Scalar(value),
            Value::Scalar(in_slope),
            Value::Scalar(out_slope),
        )
    }

    pub fn vec3(time: f32, value: [f32; 3], in_slope: [f32; 3], out_slope: [f32; 3]) -> Self {
        Self::new(
            time,
            Value::Vec3(value),
            Value::Vec3(in_slope),
            Value::Vec3(out_slope),
        )
    }

    /// Quaternion key, Unity `(x, y, z, w)` order, zero tangents.
    pub fn quat(time: f32, value: [f32; 4]) -> Self {
        Self::flat(time, Value::Quat(value))
    }

    pub fn with_segment(mut self, segment: SegmentHint) -> Self {
        self.segment = segment;
        self
    }
}

/// A curve addressed by transform path hash and attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub path_hash: PathHash,
    pub attribute: Attribute,
    pub keyframes: Vec<Keyframe>,
}

impl Curve {
    pub fn new(path_hash: PathHash, attribute: Attribute, keyframes: Vec<Keyframe>) -> Self {
        Self {
            path_hash,
            attribute,
            keyframes,
        }
    }
}

/// Clip envelope: duration, sample rate and curves in authoring order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    /// Duration in seconds.
    pub duration: f32,
    /// Sampling rate in Hz.
    pub sample_rate: f32,
    pub curves: Vec<Curve>,
}

impl Clip {
    pub fn new(name: impl Into<String>, duration: f32, sample_rate: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            sample_rate,
            curves: Vec::new(),
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curves.push(curve);
        self
    }

    /// Validate the envelope (sample rate positive and finite, duration finite and
    /// non-negative). Individual curves are checked per channel later on.
    pub fn validate_envelope(&self) -> Result<(), FatalClipError> {
        if !self.sample_rate.is_finite() {
            return Err(FatalClipError::NonFiniteSampleRate {
                clip: self.name.clone(),
            });
        }
        if self.sample_rate <= 0.0 {
            return Err(FatalClipError::NonPositiveSampleRate {
                clip: self.name.clone(),
                sample_rate: self.sample_rate,
            });
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(FatalClipError::InvalidDuration {
                clip: self.name.clone(),
                duration: self.duration,
            });
        }
        Ok(())
    }
}
