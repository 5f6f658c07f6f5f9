//! Binding resolution: clip curves (path hash x attribute) -> host targets.
//!
//! Joint lookups go through a [`JointResolver`], either the caller's explicit
//! `hash -> path` table or a path index rebuilt from the skeleton's current
//! hierarchy. Special channels (blend shapes, camera rig, light) are checked
//! first. Resolution never fails: misses become [`Resolution`] variants.

use crate::config::{BindingMode, ImportOptions, PathTable};
use crate::data::{Attribute, Clip, Curve};
use crate::error::LookupError;
use crate::ids::JointId;
use crate::path_hash::{leaf_name, path_hash, PathHash};
use crate::skeleton::{PathIndex, Skeleton};
use crate::special::{light_parameter, SpecialChannelConfig};

const LOG_TARGET: &str = "unity_retarget";

/// Trait for resolving path hashes to joints.
/// The explicit table and the inferred index both implement it.
pub trait JointResolver {
    fn resolve(&self, hash: PathHash) -> Result<JointId, LookupError>;
}

impl<T: JointResolver + ?Sized> JointResolver for &T {
    fn resolve(&self, hash: PathHash) -> Result<JointId, LookupError> {
        (**self).resolve(hash)
    }
}

impl JointResolver for PathIndex {
    fn resolve(&self, hash: PathHash) -> Result<JointId, LookupError> {
        self.lookup(hash)
    }
}

/// Build-time index over the original source names.
impl JointResolver for Skeleton {
    fn resolve(&self, hash: PathHash) -> Result<JointId, LookupError> {
        self.lookup_by_hash(hash)
    }
}

/// Explicit table: hash -> path, then the path -> joint.
///
/// The full path is matched against the skeleton's path index, then its
/// shorter suffixes for tables recorded above the skeleton root. The leaf
/// name alone binds only when exactly one joint carries it.
pub struct ExplicitJoints<'a> {
    table: &'a PathTable,
    skeleton: &'a Skeleton,
    index: PathIndex,
}

impl<'a> ExplicitJoints<'a> {
    pub fn new(table: &'a PathTable, skeleton: &'a Skeleton) -> Self {
        Self {
            table,
            skeleton,
            index: skeleton.path_index(None),
        }
    }

    fn by_leaf(&self, leaf: &str) -> Result<JointId, LookupError> {
        let mut found: Vec<JointId> = self
            .skeleton
            .joints()
            .iter()
            .filter(|j| j.index_name() == leaf)
            .map(|j| j.id)
            .collect();
        match found.len() {
            0 => Err(LookupError::Missing),
            1 => Ok(found.remove(0)),
            _ => Err(LookupError::Collision(found)),
        }
    }
}

impl JointResolver for ExplicitJoints<'_> {
    fn resolve(&self, hash: PathHash) -> Result<JointId, LookupError> {
        let path = self.table.get(hash).ok_or(LookupError::Missing)?;
        let mut rest = path;
        loop {
            match self.index.lookup(path_hash(rest)) {
                Err(LookupError::Missing) => {}
                found => return found,
            }
            match rest.split_once('/') {
                Some((_, tail)) => rest = tail,
                None => break,
            }
        }
        self.by_leaf(leaf_name(path))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraRole {
    /// Camera transform: location and rotation.
    Main,
    /// Parameter transform: translation X is the field of view.
    Parameter,
}

/// What a bound channel drives.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Joint { joint: JointId, name: String },
    /// Named float property on a joint.
    JointProperty {
        joint: JointId,
        name: String,
        property: String,
    },
    BlendShape { mesh: String, shape: String },
    Camera { rig: String, role: CameraRole },
    Light { object: String, property: String },
}

impl Target {
    pub fn joint(&self) -> Option<JointId> {
        match self {
            Target::Joint { joint, .. } | Target::JointProperty { joint, .. } => Some(*joint),
            _ => None,
        }
    }

    /// Host object name used to group curves.
    pub fn group(&self) -> &str {
        match self {
            Target::Joint { name, .. } | Target::JointProperty { name, .. } => name,
            Target::BlendShape { mesh, .. } => mesh,
            Target::Camera { rig, .. } => rig,
            Target::Light { object, .. } => object,
        }
    }
}

/// A resolved curve.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelBinding {
    pub curve_index: usize,
    pub path_hash: PathHash,
    pub attribute: Attribute,
    pub target: Target,
}

impl ChannelBinding {
    /// Host data path written by this channel.
    pub fn data_path(&self) -> String {
        match &self.target {
            Target::Joint { name, .. } => {
                let property = match self.attribute {
                    Attribute::Translation => "location",
                    Attribute::Rotation => "rotation_quaternion",
                    Attribute::Euler => "rotation_euler",
                    Attribute::Scale => "scale",
                    Attribute::BlendShape { .. } | Attribute::UserFloat { .. } => "value",
                };
                format!("pose.{name}.{property}")
            }
            Target::JointProperty { name, property, .. } => format!("pose.{name}.{property}"),
            Target::BlendShape { mesh, shape } => format!("mesh.{mesh}.key_blocks.{shape}.value"),
            Target::Camera {
                rig,
                role: CameraRole::Main,
            } => match self.attribute {
                Attribute::Rotation => format!("camera.{rig}.rotation_quaternion"),
                Attribute::Euler => format!("camera.{rig}.rotation_euler"),
                _ => format!("camera.{rig}.location"),
            },
            Target::Camera {
                rig,
                role: CameraRole::Parameter,
            } => format!("camera.{rig}.fov"),
            Target::Light { object, property } => format!("light.{object}.{property}"),
        }
    }

    /// Data path prefix whose rotation mode must be set, for rotation channels.
    pub fn rotation_target(&self) -> Option<String> {
        if !matches!(self.attribute, Attribute::Rotation | Attribute::Euler) {
            return None;
        }
        match &self.target {
            Target::Joint { name, .. } => Some(format!("pose.{name}")),
            Target::Camera {
                rig,
                role: CameraRole::Main,
            } => Some(format!("camera.{rig}")),
            _ => None,
        }
    }
}

/// Per-curve resolution result.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Bound(ChannelBinding),
    Unresolved { reason: String },
    /// Several joints share the hash; the channel is dropped.
    Collision(Vec<JointId>),
    Unsupported { reason: String },
}

/// Resolutions for a whole clip, in curve order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingTable {
    pub entries: Vec<Resolution>,
}

impl BindingTable {
    pub fn get(&self, curve_index: usize) -> Option<&Resolution> {
        self.entries.get(curve_index)
    }

    pub fn bound(&self) -> impl Iterator<Item = &ChannelBinding> {
        self.entries.iter().filter_map(|r| match r {
            Resolution::Bound(b) => Some(b),
            _ => None,
        })
    }

    pub fn unresolved_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|r| matches!(r, Resolution::Unresolved { .. }))
            .count()
    }
}

/// Resolves clip curves against a skeleton and the special-channel config.
pub struct BindingResolver<'a> {
    skeleton: &'a Skeleton,
    special: &'a SpecialChannelConfig,
    joints: Box<dyn JointResolver + 'a>,
}

impl<'a> BindingResolver<'a> {
    pub fn new(skeleton: &'a Skeleton, options: &'a ImportOptions) -> Self {
        let joints: Box<dyn JointResolver + 'a> = match (&options.binding_mode, &options.explicit_table) {
            (BindingMode::Explicit, Some(table)) => Box::new(ExplicitJoints::new(table, skeleton)),
            (BindingMode::Explicit, None) => {
                log::warn!(
                    target: LOG_TARGET,
                    "explicit binding requested without a path table; inferring from skeleton"
                );
                Box::new(Self::inferred_index(skeleton, options))
            }
            (BindingMode::Inferred, _) => Box::new(Self::inferred_index(skeleton, options)),
        };
        Self {
            skeleton,
            special: &options.special,
            joints,
        }
    }

    /// Resolver over a custom joint source.
    pub fn with_resolver(
        skeleton: &'a Skeleton,
        special: &'a SpecialChannelConfig,
        joints: Box<dyn JointResolver + 'a>,
    ) -> Self {
        Self {
            skeleton,
            special,
            joints,
        }
    }

    fn inferred_index(skeleton: &Skeleton, options: &ImportOptions) -> PathIndex {
        let root = options.root_joint_name.as_deref().and_then(|name| {
            let found = skeleton.lookup_by_name(name);
            if found.is_none() {
                log::warn!(
                    target: LOG_TARGET,
                    "root joint '{name}' not found; indexing the whole skeleton"
                );
            }
            found
        });
        let index = skeleton.path_index(root);
        for hash in index.collisions() {
            log::warn!(
                target: LOG_TARGET,
                "path hash {hash:#010x} is shared by several joints; channels on it are dropped"
            );
        }
        index
    }

    pub fn resolve(&self, curve_index: usize, curve: &Curve) -> Resolution {
        let hash = curve.path_hash;
        let attribute = curve.attribute;
        let bind = |target: Target| {
            Resolution::Bound(ChannelBinding {
                curve_index,
                path_hash: hash,
                attribute,
                target,
            })
        };

        if let Attribute::BlendShape { name_hash } = attribute {
            if let Some(table) = self.special.blend_shape_table(hash) {
                return match table.shape(name_hash) {
                    Some(shape) => bind(Target::BlendShape {
                        mesh: table.mesh.clone(),
                        shape: shape.to_string(),
                    }),
                    None => Resolution::Unresolved {
                        reason: format!(
                            "blend shape {name_hash:#010x} is not on mesh '{}'",
                            table.mesh
                        ),
                    },
                };
            }
        }

        if let Some(camera) = &self.special.camera {
            if hash == camera.main_hash() {
                return match attribute {
                    Attribute::Translation | Attribute::Rotation | Attribute::Euler => {
                        bind(Target::Camera {
                            rig: camera.rig.clone(),
                            role: CameraRole::Main,
                        })
                    }
                    other => Resolution::Unsupported {
                        reason: format!("{} on the main camera", other.label()),
                    },
                };
            }
            if hash == camera.parameter_hash() {
                return match attribute {
                    Attribute::Translation => bind(Target::Camera {
                        rig: camera.rig.clone(),
                        role: CameraRole::Parameter,
                    }),
                    other => Resolution::Unsupported {
                        reason: format!("{} on the camera parameter", other.label()),
                    },
                };
            }
            if hash == camera.sub_target_hash() {
                return Resolution::Unsupported {
                    reason: "sub-camera target channels are not bound".to_string(),
                };
            }
        }

        if let Some(light) = &self.special.light {
            if hash == light.path_hash() {
                return match attribute {
                    Attribute::UserFloat { name_hash } => match light_parameter(name_hash) {
                        Some(property) => bind(Target::Light {
                            object: light.object.clone(),
                            property: property.to_string(),
                        }),
                        None => Resolution::Unresolved {
                            reason: format!("light parameter {name_hash:#010x} is not known"),
                        },
                    },
                    other => Resolution::Unsupported {
                        reason: format!("{} on the light", other.label()),
                    },
                };
            }
        }

        let joint = match self.joints.resolve(hash) {
            Ok(joint) => joint,
            Err(LookupError::Missing) => {
                return Resolution::Unresolved {
                    reason: format!("no joint for path hash {hash:#010x}"),
                }
            }
            Err(LookupError::Collision(joints)) => return Resolution::Collision(joints),
        };
        let name = match self.skeleton.joint(joint) {
            Some(j) => j.name.clone(),
            None => {
                return Resolution::Unresolved {
                    reason: format!("joint {joint:?} is not in the skeleton"),
                }
            }
        };
        match attribute {
            Attribute::Translation | Attribute::Rotation | Attribute::Euler | Attribute::Scale => {
                bind(Target::Joint { joint, name })
            }
            Attribute::UserFloat { name_hash } => match self.special.user_property(name_hash) {
                Some(property) => bind(Target::JointProperty {
                    joint,
                    name,
                    property: property.to_string(),
                }),
                None => Resolution::Unresolved {
                    reason: format!("user property {name_hash:#010x} is not registered"),
                },
            },
            Attribute::BlendShape { .. } => Resolution::Unsupported {
                reason: format!("blend shape curve on joint '{name}' has no mesh table"),
            },
        }
    }

    pub fn resolve_clip(&self, clip: &Clip) -> BindingTable {
        BindingTable {
            entries: clip
                .curves
                .iter()
                .enumerate()
                .map(|(i, curve)| self.resolve(i, curve))
                .collect(),
        }
    }
}
