//! JSON loaders for clip and skeleton descriptions.
//!
//! Clip schema (shorthand keys accepted):
//! ```json
//! { "name": "walk", "duration": 1.0, "sample_rate": 30,
//!   "curves": [
//!     { "path": "Hips/Spine", "attribute": "rotation",
//!       "keys": [ { "t": 0, "v": [0, 0, 0, 1], "in": 0, "out": "stepped" } ] },
//!     { "path_hash": 1234, "attribute": { "kind": "blend_shape", "name": "Smile" },
//!       "keys": [ { "t": 0, "v": 100 } ] } ] }
//! ```
//! Numbers may also be the strings `"inf"`, `"-inf"`, `"nan"` or `"stepped"`
//! (positive infinity). A scalar slope on a vector curve applies to every
//! component.

use nalgebra::Matrix4;
use serde::Deserialize;

use crate::data::{Attribute, Clip, Curve, Keyframe, SegmentHint};
use crate::error::{FatalClipError, SkeletonError};
use crate::path_hash::{blend_shape_hash, path_hash, property_hash};
use crate::segment::STEPPED_SENTINEL;
use crate::skeleton::{Skeleton, SkeletonBuilder, SourceTransform};
use crate::value::{Value, ValueKind};

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum RawNumber {
    Num(f32),
    Text(String),
}

impl RawNumber {
    fn value(&self) -> Result<f32, String> {
        match self {
            RawNumber::Num(v) => Ok(*v),
            RawNumber::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" | "stepped" => Ok(STEPPED_SENTINEL),
                "-inf" | "-infinity" => Ok(f32::NEG_INFINITY),
                "nan" => Ok(f32::NAN),
                other => other
                    .parse::<f32>()
                    .map_err(|_| format!("'{s}' is not a number")),
            },
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum RawValue {
    Scalar(RawNumber),
    Vector(Vec<RawNumber>),
}

impl RawValue {
    fn components(&self) -> Result<Vec<f32>, String> {
        match self {
            RawValue::Scalar(n) => Ok(vec![n.value()?]),
            RawValue::Vector(v) => v.iter().map(RawNumber::value).collect(),
        }
    }

    /// Value with the kind implied by its length.
    fn to_value(&self) -> Result<Value, String> {
        let c = self.components()?;
        match c.as_slice() {
            [x] => Ok(Value::Scalar(*x)),
            [x, y, z] => Ok(Value::Vec3([*x, *y, *z])),
            [x, y, z, w] => Ok(Value::Quat([*x, *y, *z, *w])),
            other => Err(format!("values must have 1, 3 or 4 components, got {}", other.len())),
        }
    }

    /// Slope: a single number is broadcast to the curve's kind.
    fn to_slope(&self, kind: ValueKind) -> Result<Value, String> {
        match (self, kind) {
            (RawValue::Scalar(n), kind) => {
                let v = n.value()?;
                Ok(Value::zero(kind).map(|_| v))
            }
            (RawValue::Vector(_), _) => self.to_value(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawAttribute {
    Simple(String),
    Named {
        kind: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        name_hash: Option<u32>,
    },
}

impl RawAttribute {
    fn resolve(&self) -> Result<Attribute, String> {
        match self {
            RawAttribute::Simple(s) => match s.as_str() {
                "translation" | "position" => Ok(Attribute::Translation),
                "rotation" => Ok(Attribute::Rotation),
                "euler" => Ok(Attribute::Euler),
                "scale" => Ok(Attribute::Scale),
                other => Err(format!("unknown attribute '{other}'")),
            },
            RawAttribute::Named {
                kind,
                name,
                name_hash,
            } => {
                let hashed = |f: fn(&str) -> u32| {
                    name.as_deref()
                        .map(f)
                        .or(*name_hash)
                        .ok_or_else(|| format!("attribute '{kind}' needs 'name' or 'name_hash'"))
                };
                match kind.as_str() {
                    "blend_shape" => Ok(Attribute::BlendShape {
                        name_hash: hashed(blend_shape_hash)?,
                    }),
                    "user_float" => Ok(Attribute::UserFloat {
                        name_hash: hashed(property_hash)?,
                    }),
                    other => Err(format!("unknown attribute kind '{other}'")),
                }
            }
        }
    }
}

#[derive(Deserialize, Debug)]
struct RawKey {
    #[serde(alias = "t")]
    time: RawNumber,
    #[serde(alias = "v")]
    value: RawValue,
    #[serde(default, alias = "in")]
    in_slope: Option<RawValue>,
    #[serde(default, alias = "out")]
    out_slope: Option<RawValue>,
    #[serde(default)]
    segment: SegmentHint,
}

#[derive(Deserialize, Debug)]
struct RawCurve {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    path_hash: Option<u32>,
    attribute: RawAttribute,
    #[serde(alias = "keyframes")]
    keys: Vec<RawKey>,
}

#[derive(Deserialize, Debug)]
struct RawClip {
    name: String,
    duration: RawNumber,
    sample_rate: RawNumber,
    #[serde(default)]
    curves: Vec<RawCurve>,
}

fn convert_curve(index: usize, raw: &RawCurve) -> Result<Curve, String> {
    let hash = match (&raw.path, raw.path_hash) {
        (Some(path), _) => path_hash(path),
        (None, Some(hash)) => hash,
        (None, None) => return Err(format!("curve {index} needs 'path' or 'path_hash'")),
    };
    let attribute = raw
        .attribute
        .resolve()
        .map_err(|e| format!("curve {index}: {e}"))?;
    let kind = attribute.value_kind();
    let keyframes = raw
        .keys
        .iter()
        .map(|key| -> Result<Keyframe, String> {
            let slope = |s: &Option<RawValue>| match s {
                Some(s) => s.to_slope(kind),
                None => Ok(Value::zero(kind)),
            };
            Ok(Keyframe {
                time: key.time.value()?,
                value: key.value.to_value()?,
                in_slope: slope(&key.in_slope)?,
                out_slope: slope(&key.out_slope)?,
                segment: key.segment,
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map_err(|e| format!("curve {index}: {e}"))?;
    Ok(Curve::new(hash, attribute, keyframes))
}

/// Parse a clip description. Structural problems are fatal for the clip;
/// per-key problems (kind mismatch, bad times) are left to the importer.
pub fn parse_clip_json(json: &str) -> Result<Clip, FatalClipError> {
    let doc: serde_json::Value = serde_json::from_str(json).map_err(|e| FatalClipError::Envelope {
        clip: "<unnamed>".to_string(),
        reason: e.to_string(),
    })?;
    let name = doc
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or("<unnamed>")
        .to_string();
    let envelope = |reason: String| FatalClipError::Envelope {
        clip: name.clone(),
        reason,
    };
    let raw: RawClip = serde_json::from_value(doc).map_err(|e| envelope(e.to_string()))?;
    let duration = raw.duration.value().map_err(envelope)?;
    let sample_rate = raw.sample_rate.value().map_err(envelope)?;
    let curves = raw
        .curves
        .iter()
        .enumerate()
        .map(|(i, c)| convert_curve(i, c))
        .collect::<Result<Vec<_>, String>>()
        .map_err(envelope)?;
    Ok(Clip {
        name: raw.name,
        duration,
        sample_rate,
        curves,
    })
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawParent {
    Index(usize),
    Name(String),
}

#[derive(Deserialize, Debug)]
struct RawJoint {
    name: String,
    #[serde(default)]
    parent: Option<RawParent>,
    #[serde(default)]
    position: Option<[f32; 3]>,
    #[serde(default)]
    rotation: Option<[f32; 4]>,
    #[serde(default)]
    scale: Option<[f32; 3]>,
}

#[derive(Deserialize, Debug)]
struct RawInverseBind {
    joint: String,
    /// Row-major 4x4.
    matrix: Vec<f32>,
}

#[derive(Deserialize, Debug)]
struct RawSkeleton {
    joints: Vec<RawJoint>,
    #[serde(default)]
    inverse_binds: Vec<RawInverseBind>,
}

/// Parse a skeleton description: joints with Unity-basis TRS and a parent
/// given by index or by the name of an earlier joint.
pub fn parse_skeleton_json(json: &str) -> Result<Skeleton, SkeletonError> {
    let raw: RawSkeleton =
        serde_json::from_str(json).map_err(|e| SkeletonError::Parse(e.to_string()))?;
    let mut builder = SkeletonBuilder::new();
    for (index, joint) in raw.joints.iter().enumerate() {
        let parent = match &joint.parent {
            None => None,
            Some(RawParent::Index(i)) => Some(*i),
            Some(RawParent::Name(name)) => Some(
                raw.joints[..index]
                    .iter()
                    .position(|j| j.name == *name)
                    .ok_or_else(|| SkeletonError::UnknownJoint(name.clone()))?,
            ),
        };
        let mut node = SourceTransform::new(joint.name.clone(), parent);
        if let Some(p) = joint.position {
            node = node.with_position(p);
        }
        if let Some(r) = joint.rotation {
            node = node.with_rotation(r);
        }
        if let Some(s) = joint.scale {
            node = node.with_scale(s);
        }
        builder.push(node);
    }
    for bind in raw.inverse_binds {
        if bind.matrix.len() != 16 {
            return Err(SkeletonError::Parse(format!(
                "inverse bind for '{}' needs 16 values, got {}",
                bind.joint,
                bind.matrix.len()
            )));
        }
        builder = builder.with_inverse_bind(bind.joint, Matrix4::from_row_slice(&bind.matrix));
    }
    builder.build()
}
