//! Unity Retarget Core (host-agnostic)
//!
//! Converts Unity-authored animation clips into a host action made of
//! per-component bezier function curves. The pipeline is linear:
//!
//! ```text
//!   Clip -> binding (path hash -> joint) -> retarget (basis + pose space) -> emit (bezier keys)
//! ```
//!
//! The skeleton is borrowed read-only, the clip is borrowed read-only and the
//! resulting [`Action`] is owned by the caller. Everything runs synchronously on
//! the calling thread.

pub mod action;
pub mod baking;
pub mod basis;
pub mod binding;
pub mod clip_json;
pub mod config;
pub mod data;
pub mod emit;
pub mod error;
pub mod ids;
pub mod interp;
pub mod orchestrator;
pub mod path_hash;
pub mod report;
pub mod retarget;
pub mod sampling;
pub mod segment;
pub mod skeleton;
pub mod special;
pub mod value;

// Re-exports for consumers (host adapters)
pub use action::{
    Action, ActionAdapter, DriverSpec, FCurve, Handle, HostKeyframe, Interpolation, RotationMode,
};
pub use baking::{bake_action, BakedAction, BakingConfig, MAX_BAKED_FRAMES};
pub use binding::{BindingResolver, BindingTable, ChannelBinding, JointResolver, Resolution, Target};
pub use clip_json::{parse_clip_json, parse_skeleton_json};
pub use config::{BindingMode, ImportOptions, PathTable};
pub use data::{Attribute, Clip, Curve, Keyframe, SegmentHint};
pub use error::{FatalClipError, LookupError, SkeletonError};
pub use ids::JointId;
pub use orchestrator::{
    build_action, build_action_with_hooks, build_into, build_with_resolver, ImportHooks,
};
pub use path_hash::{path_hash, PathHash};
pub use report::{
    ChannelIssue, ChannelOutcome, ChannelState, LogSink, Report, ReportEntry, ReportSink,
};
pub use sampling::sample_unity_curve;
pub use skeleton::{RestPose, Skeleton, SkeletonBuilder, SourceTransform};
pub use special::{BlendShapeTable, CameraRigConfig, LightRigConfig, SpecialChannelConfig};
pub use value::{Value, ValueKind};
