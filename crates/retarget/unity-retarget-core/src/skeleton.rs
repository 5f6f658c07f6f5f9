//! Skeleton model: joints with local TRS, parent links, cached edit-space
//! (rest) transforms and the path-hash index used to bind clip curves.
//!
//! Build order:
//! 1. depth-first traversal from each root assigns sequential ids; local TRS is
//!    converted to the host basis;
//! 2. `name -> joint` index, duplicates suffixed `.N` in traversal order (the
//!    original Unity name stays authoritative for hashing);
//! 3. path-hash index over the original names, forest roots being children of
//!    the animator root; colliding hashes are rejected;
//! 4. edit-space matrices in topological order, optionally overridden by
//!    inverse-bind poses, with the leftover pose-space transform recorded.

use hashbrown::HashMap;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::basis;
use crate::error::{LookupError, SkeletonError};
use crate::ids::{IdAllocator, JointId};
use crate::path_hash::{join_path, path_hash, PathHash};

const LOG_TARGET: &str = "unity_retarget";

/// One transform of the source hierarchy, in Unity's basis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceTransform {
    pub name: String,
    /// Index of the parent transform in the builder's input order.
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub position: [f32; 3],
    /// Unity quaternion `(x, y, z, w)`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl SourceTransform {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            position: [0.0; 3],
            rotation: identity_rotation(),
            scale: unit_scale(),
        }
    }

    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }
}

/// Local translation/rotation/scale in the host basis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTrs {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl LocalTrs {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        basis::compose(&self.translation, &self.rotation, &self.scale)
    }

    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let (translation, rotation, scale) = basis::decompose(m);
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// Edit-space translation and rotation of a joint relative to its parent: the
/// reference pose-space samples are measured from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestPose {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl RestPose {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Joint {
    pub id: JointId,
    /// Current host name (unique within the skeleton).
    pub name: String,
    /// Name in the source asset; used for the build-time hash index.
    pub source_name: String,
    pub parent: Option<JointId>,
    pub children: Vec<JointId>,
    /// Authored local transform, host basis.
    pub local: LocalTrs,
    edit: Matrix4<f32>,
    edit_local: RestPose,
    residual: Option<LocalTrs>,
    renamed: bool,
}

impl Joint {
    /// Name used for path hashing: the source name until the joint is renamed.
    pub fn index_name(&self) -> &str {
        if self.renamed {
            &self.name
        } else {
            &self.source_name
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathEntry {
    Unique(JointId),
    Collided(Vec<JointId>),
}

/// `path hash -> joint` map. Hashes claimed by more than one joint are kept as
/// collisions and never resolve.
#[derive(Clone, Debug, Default)]
pub struct PathIndex {
    entries: HashMap<PathHash, PathEntry>,
    collisions: Vec<PathHash>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: PathHash, joint: JointId) {
        match self.entries.get_mut(&hash) {
            None => {
                self.entries.insert(hash, PathEntry::Unique(joint));
            }
            Some(entry) => {
                let joints = match entry {
                    PathEntry::Unique(existing) => vec![*existing, joint],
                    PathEntry::Collided(existing) => {
                        let mut all = existing.clone();
                        all.push(joint);
                        all
                    }
                };
                if matches!(entry, PathEntry::Unique(_)) {
                    self.collisions.push(hash);
                }
                *entry = PathEntry::Collided(joints);
            }
        }
    }

    pub fn lookup(&self, hash: PathHash) -> Result<JointId, LookupError> {
        match self.entries.get(&hash) {
            Some(PathEntry::Unique(joint)) => Ok(*joint),
            Some(PathEntry::Collided(joints)) => Err(LookupError::Collision(joints.clone())),
            None => Err(LookupError::Missing),
        }
    }

    /// Hashes rejected because several joints share them, in discovery order.
    pub fn collisions(&self) -> &[PathHash] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects source transforms and optional inverse-bind poses, then builds a
/// [`Skeleton`].
#[derive(Clone, Debug, Default)]
pub struct SkeletonBuilder {
    nodes: Vec<SourceTransform>,
    inverse_binds: Vec<(String, Matrix4<f32>)>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform; returns its input index for use as a parent.
    pub fn push(&mut self, node: SourceTransform) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Chained form of [`SkeletonBuilder::push`].
    pub fn with(mut self, node: SourceTransform) -> Self {
        self.push(node);
        self
    }

    /// Register an inverse-bind matrix (Unity basis, armature space) for a joint
    /// named by its source name.
    pub fn with_inverse_bind(mut self, joint: impl Into<String>, matrix: Matrix4<f32>) -> Self {
        self.inverse_binds.push((joint.into(), matrix));
        self
    }

    pub fn build(self) -> Result<Skeleton, SkeletonError> {
        let n = self.nodes.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut source_roots = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            match node.parent {
                Some(parent) if parent >= n => {
                    return Err(SkeletonError::ParentOutOfRange { index, parent });
                }
                Some(parent) => children[parent].push(index),
                None => source_roots.push(index),
            }
        }

        // Pre-order DFS, children in input order.
        let mut order = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        for &root in &source_roots {
            let mut stack = vec![root];
            while let Some(index) = stack.pop() {
                if visited[index] {
                    continue;
                }
                visited[index] = true;
                order.push(index);
                for &child in children[index].iter().rev() {
                    stack.push(child);
                }
            }
        }
        if let Some(index) = visited.iter().position(|v| !v) {
            return Err(SkeletonError::Cycle {
                index,
                name: self.nodes[index].name.clone(),
            });
        }

        let mut ids = IdAllocator::new();
        let mut id_of = vec![JointId(0); n];
        for &index in &order {
            id_of[index] = ids.alloc_joint();
        }

        let mut joints: Vec<Joint> = Vec::with_capacity(n);
        let mut by_name: HashMap<String, JointId> = HashMap::with_capacity(n);
        for &index in &order {
            let node = &self.nodes[index];
            let id = id_of[index];
            let name = unique_name(&node.name, &by_name);
            by_name.insert(name.clone(), id);
            let local = LocalTrs {
                translation: basis::point(node.position),
                rotation: basis::quat_unit(node.rotation),
                scale: basis::scale(node.scale),
            };
            joints.push(Joint {
                id,
                name,
                source_name: node.name.clone(),
                parent: node.parent.map(|p| id_of[p]),
                children: children[index].iter().map(|&c| id_of[c]).collect(),
                local,
                edit: Matrix4::identity(),
                edit_local: RestPose {
                    translation: local.translation,
                    rotation: local.rotation,
                },
                residual: None,
                renamed: false,
            });
        }
        let roots: Vec<JointId> = source_roots.iter().map(|&r| id_of[r]).collect();

        let mut overrides: HashMap<JointId, Matrix4<f32>> = HashMap::new();
        for (name, inverse_bind) in &self.inverse_binds {
            let joint = by_name
                .get(name.as_str())
                .copied()
                .or_else(|| {
                    joints
                        .iter()
                        .find(|j| j.source_name == *name)
                        .map(|j| j.id)
                })
                .ok_or_else(|| SkeletonError::UnknownJoint(name.clone()))?;
            match basis::matrix(inverse_bind).try_inverse() {
                Some(bind) => {
                    overrides.insert(joint, bind);
                }
                None => log::warn!(
                    target: LOG_TARGET,
                    "inverse bind for '{name}' is singular; keeping authored rest pose"
                ),
            }
        }

        // Ids are assigned in pre-order, so parents always precede children.
        for i in 0..joints.len() {
            let parent_edit = joints[i]
                .parent
                .map(|p| joints[p.index()].edit)
                .unwrap_or_else(Matrix4::identity);
            let local_m = joints[i].local.to_matrix();
            match overrides.get(&joints[i].id) {
                None => joints[i].edit = parent_edit * local_m,
                Some(bind) => {
                    let edit_local_m = parent_edit
                        .try_inverse()
                        .map(|inv| inv * bind)
                        .unwrap_or(*bind);
                    let edit_local = LocalTrs::from_matrix(&edit_local_m);
                    let residual = edit_local_m
                        .try_inverse()
                        .map(|inv| LocalTrs::from_matrix(&(inv * local_m)));
                    let joint = &mut joints[i];
                    joint.edit = *bind;
                    joint.edit_local = RestPose {
                        translation: edit_local.translation,
                        rotation: edit_local.rotation,
                    };
                    joint.residual = residual;
                }
            }
        }

        let mut skeleton = Skeleton {
            joints,
            roots,
            by_name,
            source_index: PathIndex::new(),
        };
        skeleton.source_index = skeleton.build_index(None, |j| j.source_name.as_str());
        for hash in skeleton.source_index.collisions() {
            log::warn!(
                target: LOG_TARGET,
                "path hash {hash:#010x} is shared by several joints; rejected"
            );
        }
        Ok(skeleton)
    }
}

fn unique_name(name: &str, taken: &HashMap<String, JointId>) -> String {
    if !taken.contains_key(name) {
        return name.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{name}.{n}");
        if !taken.contains_key(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Joint forest with name and path-hash indices and cached rest transforms.
#[derive(Clone, Debug)]
pub struct Skeleton {
    joints: Vec<Joint>,
    roots: Vec<JointId>,
    by_name: HashMap<String, JointId>,
    source_index: PathIndex,
}

impl Skeleton {
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.index())
    }

    pub fn roots(&self) -> &[JointId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Resolve a path hash against the build-time index (original names).
    pub fn lookup_by_hash(&self, hash: PathHash) -> Result<JointId, LookupError> {
        self.source_index.lookup(hash)
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<JointId> {
        self.by_name.get(name).copied()
    }

    /// Edit-space translation and rotation relative to the parent.
    pub fn edit_local_tr(&self, id: JointId) -> Option<RestPose> {
        self.joint(id).map(|j| j.edit_local)
    }

    /// Edit-space (armature) matrix.
    pub fn edit_matrix(&self, id: JointId) -> Option<&Matrix4<f32>> {
        self.joint(id).map(|j| &j.edit)
    }

    /// Pose-space transform that reproduces the authored pose on top of an
    /// inverse-bind rest pose. `None` when the authored pose is the rest pose.
    pub fn residual(&self, id: JointId) -> Option<&LocalTrs> {
        self.joint(id).and_then(|j| j.residual.as_ref())
    }

    /// Topmost ancestor of `id`.
    pub fn root(&self, id: JointId) -> JointId {
        let mut current = id;
        while let Some(parent) = self.joint(current).and_then(|j| j.parent) {
            current = parent;
        }
        current
    }

    /// Slash-joined path of current names from below the animator root.
    pub fn path(&self, id: JointId) -> String {
        let mut names = Vec::new();
        let mut current = self.joint(id);
        while let Some(joint) = current {
            names.push(joint.name.as_str());
            current = joint.parent.and_then(|p| self.joint(p));
        }
        names.reverse();
        names.join("/")
    }

    /// Rebuild a path-hash index from the current hierarchy. Joints hash under
    /// their source name unless renamed, so `.N` suffixes never reach a hash.
    /// With a root, paths are relative to it and the root itself is not indexed.
    pub fn path_index(&self, root: Option<JointId>) -> PathIndex {
        self.build_index(root, Joint::index_name)
    }

    /// Hashes rejected at build time.
    pub fn hash_collisions(&self) -> &[PathHash] {
        self.source_index.collisions()
    }

    pub fn rename_joint(&mut self, id: JointId, name: impl Into<String>) -> Result<(), SkeletonError> {
        let name = name.into();
        let old = self
            .joint(id)
            .map(|j| j.name.clone())
            .ok_or(SkeletonError::InvalidJoint(id))?;
        if old == name {
            return Ok(());
        }
        if self.by_name.contains_key(name.as_str()) {
            return Err(SkeletonError::DuplicateName(name));
        }
        self.by_name.remove(old.as_str());
        self.by_name.insert(name.clone(), id);
        let joint = &mut self.joints[id.index()];
        joint.name = name;
        joint.renamed = true;
        Ok(())
    }

    fn build_index<'a>(&'a self, root: Option<JointId>, name_of: impl Fn(&'a Joint) -> &'a str) -> PathIndex {
        let mut index = PathIndex::new();
        let starts: Vec<(JointId, String)> = match root {
            Some(r) => self
                .joint(r)
                .map(|j| j.children.iter().map(|&c| (c, String::new())).collect())
                .unwrap_or_default(),
            None => self.roots.iter().map(|&r| (r, String::new())).collect(),
        };
        let mut stack: Vec<(JointId, String)> = starts.into_iter().rev().collect();
        while let Some((id, parent_path)) = stack.pop() {
            let Some(joint) = self.joint(id) else {
                continue;
            };
            let path = join_path(&parent_path, name_of(joint));
            index.insert(path_hash(&path), id);
            for &child in joint.children.iter().rev() {
                stack.push((child, path.clone()));
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Skeleton {
        SkeletonBuilder::new()
            .with(SourceTransform::new("Hips", None).with_position([0.0, 1.0, 0.0]))
            .with(SourceTransform::new("Spine", Some(0)).with_position([0.0, 0.2, 0.0]))
            .with(SourceTransform::new("Head", Some(1)))
            .build()
            .expect("valid skeleton")
    }

    #[test]
    fn ids_follow_depth_first_order() {
        let sk = SkeletonBuilder::new()
            .with(SourceTransform::new("Root", None))
            .with(SourceTransform::new("A", Some(0)))
            .with(SourceTransform::new("B", Some(0)))
            .with(SourceTransform::new("A1", Some(1)))
            .build()
            .unwrap();
        let names: Vec<&str> = sk.joints().iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["Root", "A", "A1", "B"]);
        assert_eq!(sk.root(sk.lookup_by_name("A1").unwrap()), JointId(0));
    }

    #[test]
    fn hash_index_uses_full_paths() {
        let sk = chain();
        assert_eq!(sk.lookup_by_hash(path_hash("Hips")), Ok(JointId(0)));
        assert_eq!(sk.lookup_by_hash(path_hash("Hips/Spine/Head")), Ok(JointId(2)));
        assert_eq!(sk.lookup_by_hash(path_hash("Head")), Err(LookupError::Missing));
        assert_eq!(sk.path(JointId(2)), "Hips/Spine/Head");
    }

    #[test]
    fn duplicate_names_get_suffixes_and_collide() {
        let sk = SkeletonBuilder::new()
            .with(SourceTransform::new("Root", None))
            .with(SourceTransform::new("Arm", Some(0)))
            .with(SourceTransform::new("Arm", Some(0)))
            .build()
            .unwrap();
        assert!(sk.lookup_by_name("Arm").is_some());
        assert!(sk.lookup_by_name("Arm.1").is_some());
        assert!(matches!(
            sk.lookup_by_hash(path_hash("Root/Arm")),
            Err(LookupError::Collision(ref j)) if j.len() == 2
        ));
        assert_eq!(sk.hash_collisions(), &[path_hash("Root/Arm")]);
    }

    #[test]
    fn rooted_index_is_relative() {
        let sk = chain();
        let index = sk.path_index(sk.lookup_by_name("Hips"));
        assert_eq!(index.lookup(path_hash("Spine/Head")), Ok(JointId(2)));
        assert_eq!(index.lookup(path_hash("Hips")), Err(LookupError::Missing));
    }

    #[test]
    fn rename_is_seen_by_rebuilt_index() {
        let mut sk = chain();
        sk.rename_joint(JointId(1), "Torso").unwrap();
        let index = sk.path_index(None);
        assert_eq!(index.lookup(path_hash("Hips/Torso/Head")), Ok(JointId(2)));
        assert_eq!(sk.lookup_by_hash(path_hash("Hips/Spine/Head")), Ok(JointId(2)));
        assert!(matches!(
            sk.rename_joint(JointId(2), "Hips"),
            Err(SkeletonError::DuplicateName(_))
        ));
    }

    #[test]
    fn rebuilt_index_hashes_source_names_until_renamed() {
        let mut sk = SkeletonBuilder::new()
            .with(SourceTransform::new("Root", None))
            .with(SourceTransform::new("L", Some(0)))
            .with(SourceTransform::new("Hand", Some(1)))
            .with(SourceTransform::new("R", Some(0)))
            .with(SourceTransform::new("Hand", Some(3)))
            .build()
            .unwrap();
        let right = sk.lookup_by_name("Hand.1").unwrap();
        let index = sk.path_index(None);
        assert_eq!(index.lookup(path_hash("Root/R/Hand")), Ok(right));
        assert_eq!(index.lookup(path_hash("Root/R/Hand.1")), Err(LookupError::Missing));

        sk.rename_joint(right, "RightHand").unwrap();
        let index = sk.path_index(None);
        assert_eq!(index.lookup(path_hash("Root/R/RightHand")), Ok(right));
        assert_eq!(index.lookup(path_hash("Root/R/Hand")), Err(LookupError::Missing));
    }

    #[test]
    fn cycles_and_bad_parents_are_rejected() {
        let err = SkeletonBuilder::new()
            .with(SourceTransform::new("A", Some(1)))
            .with(SourceTransform::new("B", Some(0)))
            .build()
            .unwrap_err();
        assert!(matches!(err, SkeletonError::Cycle { .. }));
        let err = SkeletonBuilder::new()
            .with(SourceTransform::new("A", Some(4)))
            .build()
            .unwrap_err();
        assert!(matches!(err, SkeletonError::ParentOutOfRange { .. }));
    }

    #[test]
    fn edit_matrix_composes_parent() {
        let sk = chain();
        let head = sk.edit_matrix(JointId(2)).unwrap();
        let expected = basis::point([0.0, 1.2, 0.0]);
        assert!((Vector3::new(head[(0, 3)], head[(1, 3)], head[(2, 3)]) - expected).norm() < 1e-6);
        assert!(sk.residual(JointId(2)).is_none());
    }

    #[test]
    fn inverse_bind_overrides_rest_and_records_residual() {
        let bind_u = Matrix4::new_translation(&Vector3::new(0.0, 2.0, 0.0));
        let sk = SkeletonBuilder::new()
            .with(SourceTransform::new("Hips", None).with_position([0.0, 1.0, 0.0]))
            .with_inverse_bind("Hips", bind_u.try_inverse().unwrap())
            .build()
            .unwrap();
        let rest = sk.edit_local_tr(JointId(0)).unwrap();
        assert!((rest.translation - basis::point([0.0, 2.0, 0.0])).norm() < 1e-5);
        let residual = sk.residual(JointId(0)).unwrap();
        assert!((residual.translation - basis::point([0.0, -1.0, 0.0])).norm() < 1e-5);
    }
}
