//! Interpolation math shared by the emitter, host-curve evaluation and
//! source-curve sampling.
//!
//! Hermite segments are expressed in seconds with tangents in value/second;
//! Bezier segments are expressed in host frames.

pub mod functions;

pub use functions::{bezier_segment_value, cubic_bezier, hermite_value, lerp_f32};
