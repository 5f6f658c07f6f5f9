//! Clip orchestrator: walks a clip's curves in order, drives binding,
//! retargeting and emission for each, and writes the result into a host action.
//!
//! Per-channel problems never abort the import; they become report entries.
//! Only an unreadable clip envelope is returned as an error.

use crate::action::{Action, ActionAdapter, RotationMode};
use crate::binding::{BindingResolver, CameraRole, ChannelBinding, Resolution, Target};
use crate::config::ImportOptions;
use crate::data::{Attribute, Clip, Curve};
use crate::emit::{emit_channel, EmitSettings};
use crate::error::FatalClipError;
use crate::report::{
    ChannelIssue, ChannelOutcome, ChannelState, LogSink, Report, ReportEntry, ReportSink,
};
use crate::retarget::{retarget, ChannelTransform, Reframe};
use crate::segment::prepare_curve;
use crate::skeleton::{RestPose, Skeleton};

const LOG_TARGET: &str = "unity_retarget";

/// Runtime-only hooks for one import.
#[derive(Default)]
pub struct ImportHooks<'a> {
    /// Polled between channels; returning true stops the import.
    pub should_cancel: Option<&'a dyn Fn() -> bool>,
    /// Receives each report entry; defaults to [`LogSink`].
    pub sink: Option<&'a mut dyn ReportSink>,
}

/// Build a new action (or extend `options.append_to_action`) from a clip.
pub fn build_action(
    clip: &Clip,
    skeleton: &Skeleton,
    options: ImportOptions,
) -> Result<(Action, Report), FatalClipError> {
    build_action_with_hooks(clip, skeleton, options, ImportHooks::default())
}

pub fn build_action_with_hooks(
    clip: &Clip,
    skeleton: &Skeleton,
    mut options: ImportOptions,
    hooks: ImportHooks<'_>,
) -> Result<(Action, Report), FatalClipError> {
    clip.validate_envelope()?;
    let mut action = match options.append_to_action.take() {
        Some(existing) => existing,
        None => {
            let name = options
                .action_name
                .clone()
                .unwrap_or_else(|| clip.name.clone());
            let rate = effective_sample_rate(clip, &options, None)?;
            Action::new(name, rate)
        }
    };
    let report = build_into(clip, skeleton, &options, hooks, &mut action)?;
    Ok((action, report))
}

/// Import into any host adapter, resolving joints per `options`.
pub fn build_into<A: ActionAdapter>(
    clip: &Clip,
    skeleton: &Skeleton,
    options: &ImportOptions,
    hooks: ImportHooks<'_>,
    adapter: &mut A,
) -> Result<Report, FatalClipError> {
    clip.validate_envelope()?;
    let resolver = BindingResolver::new(skeleton, options);
    build_with_resolver(clip, skeleton, &resolver, options, hooks, adapter)
}

/// Import with a caller-built resolver.
pub fn build_with_resolver<A: ActionAdapter>(
    clip: &Clip,
    skeleton: &Skeleton,
    resolver: &BindingResolver<'_>,
    options: &ImportOptions,
    hooks: ImportHooks<'_>,
    adapter: &mut A,
) -> Result<Report, FatalClipError> {
    clip.validate_envelope()?;
    let settings = EmitSettings {
        sample_rate: effective_sample_rate(clip, options, adapter.sample_rate())?,
        always_linear: options.always_linear,
    };

    let mut log_sink = LogSink;
    let sink: &mut dyn ReportSink = match hooks.sink {
        Some(sink) => sink,
        None => &mut log_sink,
    };

    let mut report = Report::new(clip.name.clone(), clip.curves.len());
    for (index, curve) in clip.curves.iter().enumerate() {
        if hooks.should_cancel.is_some_and(|cancel| cancel()) {
            report.cancelled = true;
            log::info!(target: LOG_TARGET, "clip '{}': import cancelled", clip.name);
            break;
        }
        let entry = import_channel(index, curve, skeleton, resolver, options, &settings, adapter);
        sink.record(&entry);
        report.push(entry);
    }
    adapter.finalize();

    log::info!(target: LOG_TARGET, "clip '{}': {}", clip.name, report.summary());
    Ok(report)
}

/// Override, then the target's own rate, then the clip's.
fn effective_sample_rate(
    clip: &Clip,
    options: &ImportOptions,
    existing: Option<f32>,
) -> Result<f32, FatalClipError> {
    let rate = options
        .sample_rate_override
        .or(existing)
        .unwrap_or(clip.sample_rate);
    if !rate.is_finite() {
        return Err(FatalClipError::NonFiniteSampleRate {
            clip: clip.name.clone(),
        });
    }
    if rate <= 0.0 {
        return Err(FatalClipError::NonPositiveSampleRate {
            clip: clip.name.clone(),
            sample_rate: rate,
        });
    }
    Ok(rate)
}

fn transform_for(binding: &ChannelBinding, skeleton: &Skeleton) -> Option<ChannelTransform> {
    match &binding.target {
        Target::Joint { joint, .. } => {
            let rest = skeleton
                .edit_local_tr(*joint)
                .unwrap_or_else(RestPose::identity);
            match binding.attribute {
                Attribute::Translation => Some(ChannelTransform::pose_translation(&rest)),
                Attribute::Rotation => Some(ChannelTransform::pose_rotation(&rest)),
                Attribute::Euler => Some(ChannelTransform::pose_euler(&rest)),
                Attribute::Scale => Some(ChannelTransform::Scale),
                Attribute::BlendShape { .. } | Attribute::UserFloat { .. } => None,
            }
        }
        Target::JointProperty { .. } | Target::Light { .. } => {
            Some(ChannelTransform::Scalar { divisor: 1.0 })
        }
        Target::BlendShape { .. } => Some(ChannelTransform::Scalar { divisor: 100.0 }),
        Target::Camera {
            role: CameraRole::Main,
            ..
        } => match binding.attribute {
            Attribute::Translation => Some(ChannelTransform::camera_translation()),
            Attribute::Rotation => Some(ChannelTransform::Rotation(Reframe::camera())),
            Attribute::Euler => Some(ChannelTransform::Euler(Reframe::camera())),
            _ => None,
        },
        Target::Camera {
            role: CameraRole::Parameter,
            ..
        } => Some(ChannelTransform::VectorComponent {
            index: 0,
            factor: 1.0,
        }),
    }
}

fn import_channel<A: ActionAdapter>(
    index: usize,
    curve: &Curve,
    skeleton: &Skeleton,
    resolver: &BindingResolver<'_>,
    options: &ImportOptions,
    settings: &EmitSettings,
    adapter: &mut A,
) -> ReportEntry {
    let mut entry = ReportEntry {
        curve_index: index,
        path_hash: curve.path_hash,
        attribute: curve.attribute,
        data_path: None,
        outcome: ChannelOutcome::Ok,
        state: ChannelState::Unresolved,
        issue: None,
        message: String::new(),
    };
    let skip = |mut entry: ReportEntry, outcome, issue, message: String| {
        entry.outcome = outcome;
        entry.advance(ChannelState::Skipped);
        entry.issue = Some(issue);
        entry.message = message;
        entry
    };

    let binding = match resolver.resolve(index, curve) {
        Resolution::Bound(binding) => binding,
        Resolution::Unresolved { reason } => {
            return skip(
                entry,
                ChannelOutcome::Unresolved,
                ChannelIssue::UnresolvedChannel,
                reason,
            )
        }
        Resolution::Collision(joints) => {
            return skip(
                entry,
                ChannelOutcome::DroppedCollision,
                ChannelIssue::HashCollision,
                format!("{} joints share this path hash", joints.len()),
            )
        }
        Resolution::Unsupported { reason } => {
            return skip(
                entry,
                ChannelOutcome::Unsupported,
                ChannelIssue::UnsupportedAttribute,
                reason,
            )
        }
    };
    let data_path = binding.data_path();
    entry.data_path = Some(data_path.clone());
    entry.advance(ChannelState::Resolved);

    let prepared = match prepare_curve(curve) {
        Ok(prepared) => prepared,
        Err(defect) => {
            return skip(
                entry,
                ChannelOutcome::Malformed,
                ChannelIssue::MalformedKeyframe,
                defect.describe(),
            )
        }
    };
    let transform = match transform_for(&binding, skeleton) {
        Some(transform) => transform,
        None => {
            return skip(
                entry,
                ChannelOutcome::Unsupported,
                ChannelIssue::UnsupportedAttribute,
                format!("{} is not supported on this target", curve.attribute.label()),
            )
        }
    };
    let channel = match retarget(&prepared, &transform) {
        Ok(channel) => channel,
        Err(err) => {
            return skip(
                entry,
                ChannelOutcome::Malformed,
                ChannelIssue::MalformedKeyframe,
                err.to_string(),
            )
        }
    };
    entry.advance(ChannelState::Retargeted);

    let emitted = emit_channel(&channel, settings);
    let group = binding.target.group();
    for (component, keys) in emitted.components.into_iter().enumerate() {
        let handle = adapter.new_curve(&data_path, component, Some(group));
        for key in keys {
            adapter.append_key(handle, key);
        }
    }
    if let Some(target) = binding.rotation_target() {
        let mode = match binding.attribute {
            Attribute::Euler => RotationMode::Yxz,
            _ => RotationMode::Quaternion,
        };
        adapter.set_rotation_mode(&target, mode);
    }
    if let (
        Target::Camera {
            role: CameraRole::Parameter,
            ..
        },
        Some(camera),
    ) = (&binding.target, &options.special.camera)
    {
        adapter.add_driver(camera.lens_driver());
    }
    entry.advance(ChannelState::Emitted);

    let substitutions = channel.substitutions + emitted.substitutions;
    if substitutions > 0 {
        entry.outcome = ChannelOutcome::Malformed;
        entry.issue = Some(ChannelIssue::MalformedKeyframe);
        entry.message = format!("{substitutions} non-finite or out-of-range component(s) replaced with 0");
    }
    entry
}
