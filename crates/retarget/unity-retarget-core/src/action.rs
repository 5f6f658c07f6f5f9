//! Host action model: per-component function curves of Bezier keyframes,
//! rotation-mode hints and drivers, plus the adapter trait the orchestrator
//! writes through.
//!
//! [`Action`] is the in-memory, serialisable implementation. A DCC binding
//! implements [`ActionAdapter`] over its own objects instead.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::interp::{bezier_segment_value, lerp_f32};

/// Keys closer than this (in frames) occupy the same slot; the later one wins.
pub const FRAME_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Constant,
    Linear,
    Bezier,
}

/// Bezier control point in (frame, value) space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    pub frame: f32,
    pub value: f32,
}

impl Handle {
    pub fn new(frame: f32, value: f32) -> Self {
        Self { frame, value }
    }
}

/// One host key. `interpolation` governs the segment that starts at this key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostKeyframe {
    pub frame: f32,
    pub value: f32,
    pub left: Handle,
    pub right: Handle,
    pub interpolation: Interpolation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    pub data_path: String,
    pub index: usize,
    /// Group label shown by hosts that organise curves (joint or object name).
    #[serde(default)]
    pub group: Option<String>,
    pub keyframes: Vec<HostKeyframe>,
}

impl FCurve {
    pub fn new(data_path: impl Into<String>, index: usize) -> Self {
        Self {
            data_path: data_path.into(),
            index,
            group: None,
            keyframes: Vec::new(),
        }
    }

    /// Insert keeping frames sorted; a key at an occupied frame replaces it.
    pub fn insert_key(&mut self, key: HostKeyframe) {
        let pos = self
            .keyframes
            .partition_point(|k| k.frame < key.frame - FRAME_EPSILON);
        match self.keyframes.get_mut(pos) {
            Some(existing) if (existing.frame - key.frame).abs() <= FRAME_EPSILON => {
                *existing = key;
            }
            _ => self.keyframes.insert(pos, key),
        }
    }

    pub fn frame_range(&self) -> Option<(f32, f32)> {
        match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => Some((first.frame, last.frame)),
            _ => None,
        }
    }

    /// Evaluate at `frame` with constant extrapolation past either end.
    pub fn evaluate(&self, frame: f32) -> f32 {
        let keys = &self.keyframes;
        let (first, last) = match (keys.first(), keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if frame <= first.frame {
            return first.value;
        }
        if frame >= last.frame {
            return last.value;
        }
        let right = keys.partition_point(|k| k.frame <= frame);
        let (a, b) = (&keys[right - 1], &keys[right]);
        match a.interpolation {
            Interpolation::Constant => a.value,
            Interpolation::Linear => {
                let span = b.frame - a.frame;
                if span <= 0.0 {
                    a.value
                } else {
                    lerp_f32(a.value, b.value, (frame - a.frame) / span)
                }
            }
            Interpolation::Bezier => bezier_segment_value(
                (a.frame, a.value),
                (a.right.frame, a.right.value),
                (b.left.frame, b.left.value),
                (b.frame, b.value),
                frame,
            ),
        }
    }
}

/// Rotation representation a target must be switched to for its curves to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    Quaternion,
    /// Euler, Y applied first, then X, then Z.
    Yxz,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationModeHint {
    /// Data path prefix of the target (`pose.<joint>` or `camera.<rig>`).
    pub target: String,
    pub mode: RotationMode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverVariable {
    pub name: String,
    /// Data path of the property the variable reads.
    pub source_path: String,
}

/// Host-evaluated expression driving one property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverSpec {
    pub data_path: String,
    pub expression: String,
    pub variables: Vec<DriverVariable>,
}

/// Focal length (mm) for a vertical field of view in degrees, as computed by
/// the camera lens driver.
pub fn focal_length_from_fov(fov_degrees: f32, sensor_height: f32) -> f32 {
    (sensor_height / 2.0) / (fov_degrees.to_radians() / 2.0).tan()
}

/// Narrow write interface onto a host action.
pub trait ActionAdapter {
    /// Handle returned by [`ActionAdapter::new_curve`].
    type Curve: Copy;

    /// Frame rate already fixed by the target, if any (append mode).
    fn sample_rate(&self) -> Option<f32>;

    /// Get or create the curve for `(data_path, index)`.
    fn new_curve(&mut self, data_path: &str, index: usize, group: Option<&str>) -> Self::Curve;

    /// Add a key; an existing key at the same frame is replaced.
    fn append_key(&mut self, curve: Self::Curve, key: HostKeyframe);

    fn set_rotation_mode(&mut self, target: &str, mode: RotationMode);

    fn add_driver(&mut self, driver: DriverSpec);

    /// Called once after the last channel, also on cancellation.
    fn finalize(&mut self);
}

/// In-memory host action.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    /// Frames per second used for time -> frame conversion.
    pub sample_rate: f32,
    pub fcurves: Vec<FCurve>,
    #[serde(default)]
    pub rotation_modes: Vec<RotationModeHint>,
    #[serde(default)]
    pub drivers: Vec<DriverSpec>,
    /// Union of all curve key ranges, set by `finalize`.
    #[serde(default)]
    pub frame_range: Option<(f32, f32)>,
    #[serde(skip)]
    index: HashMap<(String, usize), usize>,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.sample_rate == other.sample_rate
            && self.fcurves == other.fcurves
            && self.rotation_modes == other.rotation_modes
            && self.drivers == other.drivers
            && self.frame_range == other.frame_range
    }
}

impl Action {
    pub fn new(name: impl Into<String>, sample_rate: f32) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            ..Default::default()
        }
    }

    pub fn fcurve(&self, data_path: &str, index: usize) -> Option<&FCurve> {
        self.fcurves
            .iter()
            .find(|c| c.data_path == data_path && c.index == index)
    }

    /// All component curves of one data path, ordered by component index.
    pub fn fcurves_for<'a>(&'a self, data_path: &'a str) -> impl Iterator<Item = &'a FCurve> + 'a {
        let mut curves: Vec<&FCurve> = self
            .fcurves
            .iter()
            .filter(|c| c.data_path == data_path)
            .collect();
        curves.sort_by_key(|c| c.index);
        curves.into_iter()
    }

    pub fn rotation_mode(&self, target: &str) -> Option<RotationMode> {
        self.rotation_modes
            .iter()
            .find(|h| h.target == target)
            .map(|h| h.mode)
    }

    /// Evaluate a component at a time in seconds.
    pub fn evaluate_at_time(&self, data_path: &str, index: usize, seconds: f32) -> Option<f32> {
        self.fcurve(data_path, index)
            .map(|c| c.evaluate(seconds * self.sample_rate))
    }

    fn ensure_index(&mut self) {
        if self.index.len() != self.fcurves.len() {
            self.index = self
                .fcurves
                .iter()
                .enumerate()
                .map(|(i, c)| ((c.data_path.clone(), c.index), i))
                .collect();
        }
    }
}

impl ActionAdapter for Action {
    type Curve = usize;

    fn sample_rate(&self) -> Option<f32> {
        if self.sample_rate.is_finite() && self.sample_rate > 0.0 {
            Some(self.sample_rate)
        } else {
            None
        }
    }

    fn new_curve(&mut self, data_path: &str, index: usize, group: Option<&str>) -> usize {
        self.ensure_index();
        if let Some(&slot) = self.index.get(&(data_path.to_string(), index)) {
            return slot;
        }
        let mut curve = FCurve::new(data_path, index);
        curve.group = group.map(str::to_string);
        self.fcurves.push(curve);
        let slot = self.fcurves.len() - 1;
        self.index.insert((data_path.to_string(), index), slot);
        slot
    }

    fn append_key(&mut self, curve: usize, key: HostKeyframe) {
        if let Some(c) = self.fcurves.get_mut(curve) {
            c.insert_key(key);
        }
    }

    fn set_rotation_mode(&mut self, target: &str, mode: RotationMode) {
        match self.rotation_modes.iter_mut().find(|h| h.target == target) {
            Some(hint) => hint.mode = mode,
            None => self.rotation_modes.push(RotationModeHint {
                target: target.to_string(),
                mode,
            }),
        }
    }

    fn add_driver(&mut self, driver: DriverSpec) {
        match self
            .drivers
            .iter_mut()
            .find(|d| d.data_path == driver.data_path)
        {
            Some(existing) => *existing = driver,
            None => self.drivers.push(driver),
        }
    }

    fn finalize(&mut self) {
        self.frame_range = self
            .fcurves
            .iter()
            .filter_map(FCurve::frame_range)
            .fold(None, |acc, (lo, hi)| match acc {
                None => Some((lo, hi)),
                Some((a, b)) => Some((a.min(lo), b.max(hi))),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(frame: f32, value: f32, interpolation: Interpolation) -> HostKeyframe {
        HostKeyframe {
            frame,
            value,
            left: Handle::new(frame - 1.0, value),
            right: Handle::new(frame + 1.0, value),
            interpolation,
        }
    }

    #[test]
    fn later_key_wins_at_same_frame() {
        let mut c = FCurve::new("pose.Hip.location", 0);
        c.insert_key(key(10.0, 1.0, Interpolation::Linear));
        c.insert_key(key(0.0, 0.0, Interpolation::Linear));
        c.insert_key(key(10.00001, 5.0, Interpolation::Linear));
        assert_eq!(c.keyframes.len(), 2);
        assert_eq!(c.keyframes[1].value, 5.0);
        assert_eq!(c.frame_range(), Some((0.0, 10.00001)));
    }

    #[test]
    fn evaluate_constant_and_linear() {
        let mut c = FCurve::new("x", 0);
        c.insert_key(key(0.0, 0.0, Interpolation::Constant));
        c.insert_key(key(10.0, 1.0, Interpolation::Linear));
        c.insert_key(key(20.0, 3.0, Interpolation::Linear));
        assert_eq!(c.evaluate(-5.0), 0.0);
        assert_eq!(c.evaluate(9.99), 0.0);
        assert!((c.evaluate(15.0) - 2.0).abs() < 1e-6);
        assert_eq!(c.evaluate(25.0), 3.0);
    }

    #[test]
    fn curves_are_reused_by_path_and_index() {
        let mut a = Action::new("clip", 30.0);
        let c0 = a.new_curve("pose.Hip.location", 0, Some("Hip"));
        let c1 = a.new_curve("pose.Hip.location", 1, Some("Hip"));
        assert_ne!(c0, c1);
        assert_eq!(a.new_curve("pose.Hip.location", 0, None), c0);
        a.append_key(c1, key(3.0, 1.0, Interpolation::Bezier));
        a.finalize();
        assert_eq!(a.frame_range, Some((3.0, 3.0)));
        assert_eq!(a.fcurves_for("pose.Hip.location").count(), 2);
    }

    #[test]
    fn rotation_modes_and_drivers_are_deduplicated() {
        let mut a = Action::new("clip", 30.0);
        a.set_rotation_mode("pose.Hip", RotationMode::Quaternion);
        a.set_rotation_mode("pose.Hip", RotationMode::Yxz);
        assert_eq!(a.rotation_modes.len(), 1);
        assert_eq!(a.rotation_mode("pose.Hip"), Some(RotationMode::Yxz));
        let d = DriverSpec {
            data_path: "camera.Camera.lens".into(),
            expression: "x".into(),
            variables: vec![],
        };
        a.add_driver(d.clone());
        a.add_driver(d);
        assert_eq!(a.drivers.len(), 1);
    }

    #[test]
    fn focal_length_matches_pinhole_model() {
        // 24 mm sensor, ~53.13° vertical fov -> 24 mm lens
        let fov = 2.0 * (0.5f32).atan().to_degrees();
        assert!((focal_length_from_fov(fov, 24.0) - 24.0).abs() < 1e-4);
    }

    #[test]
    fn serde_round_trip_rebuilds_index() {
        let mut a = Action::new("clip", 24.0);
        let c = a.new_curve("pose.Hip.scale", 2, None);
        a.append_key(c, key(1.0, 2.0, Interpolation::Bezier));
        let json = serde_json::to_string(&a).unwrap();
        let mut back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert_eq!(back.new_curve("pose.Hip.scale", 2, None), c);
    }
}
