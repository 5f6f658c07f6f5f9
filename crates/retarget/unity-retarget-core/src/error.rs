//! Error types.
//!
//! Only [`FatalClipError`] escapes `build_action`; every channel-local problem is
//! reported through [`crate::report::Report`] instead.

use thiserror::Error;

use crate::ids::JointId;

/// The clip as a whole cannot be translated.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FatalClipError {
    #[error("clip '{clip}': sample rate must be positive, got {sample_rate}")]
    NonPositiveSampleRate { clip: String, sample_rate: f32 },

    #[error("clip '{clip}': sample rate is not a finite number")]
    NonFiniteSampleRate { clip: String },

    #[error("clip '{clip}': duration must be finite and non-negative, got {duration}")]
    InvalidDuration { clip: String, duration: f32 },

    #[error("clip '{clip}': unreadable envelope: {reason}")]
    Envelope { clip: String, reason: String },
}

impl FatalClipError {
    /// Name of the clip the error refers to.
    pub fn clip(&self) -> &str {
        match self {
            FatalClipError::NonPositiveSampleRate { clip, .. }
            | FatalClipError::NonFiniteSampleRate { clip }
            | FatalClipError::InvalidDuration { clip, .. }
            | FatalClipError::Envelope { clip, .. } => clip,
        }
    }
}

/// Malformed skeleton input.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SkeletonError {
    #[error("transform {index} names parent {parent}, which does not exist")]
    ParentOutOfRange { index: usize, parent: usize },

    #[error("transform {index} ('{name}') is not reachable from any root (parent cycle)")]
    Cycle { index: usize, name: String },

    #[error("skin binding references unknown joint '{0}'")]
    UnknownJoint(String),

    #[error("joint name '{0}' is already in use")]
    DuplicateName(String),

    #[error("joint {0:?} does not exist")]
    InvalidJoint(JointId),

    #[error("skeleton parse error: {0}")]
    Parse(String),
}

/// Why a path hash or name did not yield exactly one joint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("no joint is registered under this key")]
    Missing,

    #[error("{} joints collide under this key", .0.len())]
    Collision(Vec<JointId>),
}
