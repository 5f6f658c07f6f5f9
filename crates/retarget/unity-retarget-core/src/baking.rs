//! Baking API: sample every curve of an action at each frame of a window.

use serde::{Deserialize, Serialize};

use crate::action::Action;

const LOG_TARGET: &str = "unity_retarget";

/// Upper bound on samples per baked curve. Steps that would exceed it over the
/// window are widened to fit.
pub const MAX_BAKED_FRAMES: usize = 1 << 20;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BakingConfig {
    /// Frames between samples.
    pub step: f32,
    /// First frame; if None, the start of the action's key range.
    pub start_frame: Option<f32>,
    /// Last frame (inclusive); if None, the end of the action's key range.
    pub end_frame: Option<f32>,
}

impl Default for BakingConfig {
    fn default() -> Self {
        Self {
            step: 1.0,
            start_frame: None,
            end_frame: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BakedCurve {
    pub data_path: String,
    pub index: usize,
    /// Sampled values at each frame.
    pub values: Vec<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BakedAction {
    pub name: String,
    pub sample_rate: f32,
    pub start_frame: f32,
    pub end_frame: f32,
    pub step: f32,
    pub curves: Vec<BakedCurve>,
}

fn key_range(action: &Action) -> (f32, f32) {
    action.frame_range.unwrap_or_else(|| {
        action
            .fcurves
            .iter()
            .filter_map(|c| c.frame_range())
            .fold((0.0, 0.0), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    })
}

/// Bake an action using the provided config.
pub fn bake_action(action: &Action, cfg: &BakingConfig) -> BakedAction {
    let mut step = if cfg.step.is_finite() && cfg.step > 0.0 {
        cfg.step
    } else {
        1.0
    };
    let (range_start, range_end) = key_range(action);
    let start = cfg
        .start_frame
        .filter(|f| f.is_finite())
        .unwrap_or(range_start);
    let end = cfg
        .end_frame
        .filter(|f| f.is_finite())
        .unwrap_or(range_end)
        .max(start);
    let span = end - start;
    if span / step >= MAX_BAKED_FRAMES as f32 {
        let widened = span / (MAX_BAKED_FRAMES - 1) as f32;
        log::warn!(
            target: LOG_TARGET,
            "baking {span} frames at step {step} exceeds {MAX_BAKED_FRAMES} samples; using step {widened}"
        );
        step = widened;
    }
    let frame_count = ((span / step).floor() as usize)
        .saturating_add(1)
        .min(MAX_BAKED_FRAMES);

    let curves = action
        .fcurves
        .iter()
        .map(|curve| BakedCurve {
            data_path: curve.data_path.clone(),
            index: curve.index,
            values: (0..frame_count)
                .map(|i| curve.evaluate(start + i as f32 * step))
                .collect(),
        })
        .collect();

    BakedAction {
        name: action.name.clone(),
        sample_rate: action.sample_rate,
        start_frame: start,
        end_frame: end,
        step,
        curves,
    }
}

/// Export baked data as serde_json::Value (stable schema for tooling).
pub fn export_baked_json(baked: &BakedAction) -> serde_json::Value {
    serde_json::to_value(baked).unwrap_or(serde_json::Value::Null)
}
