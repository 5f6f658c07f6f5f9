use std::collections::HashSet;

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Vector3};
use unity_retarget_core::{
    basis, parse_skeleton_json, path_hash, LookupError, SkeletonBuilder, SkeletonError,
    SourceTransform,
};

const POINTS: [[f32; 3]; 4] = [
    [1.0, 2.0, 3.0],
    [-0.5, 0.0, 7.25],
    [1e-3, -4e3, 0.125],
    [0.0, 0.0, 0.0],
];

#[test]
fn point_applied_twice_is_a_signed_permutation() {
    for p in POINTS {
        let once = basis::point(p);
        let twice = basis::point([once.x, once.y, once.z]);
        assert_eq!(twice, Vector3::new(p[0], -p[1], -p[2]));
    }
}

#[test]
fn point_inverse_recovers_the_input_exactly() {
    for p in POINTS {
        assert_eq!(basis::point_inverse(&basis::point(p)), p);
    }
}

#[test]
fn quaternion_conversion_commutes_with_rotation() {
    // Unity: 90 degrees about +Y, applied to +X gives -Z.
    let h = std::f32::consts::FRAC_1_SQRT_2;
    let q = basis::quat_unit([0.0, h, 0.0, h]);
    let rotated = q * basis::point([1.0, 0.0, 0.0]);
    let expected = basis::point([0.0, 0.0, -1.0]);
    assert_relative_eq!(rotated, expected, epsilon = 1e-6);
}

#[test]
fn slopes_use_the_value_maps() {
    let v = [0.5, -2.0, 4.0];
    assert_eq!(basis::point_slope(v), basis::point(v));
    assert_eq!(basis::euler_slope(v), basis::euler(v));
    assert_eq!(basis::scale_slope(v), basis::scale(v));
    let q = [0.1, 0.2, 0.3, 0.9];
    assert_eq!(basis::quat_slope(q), basis::quat(q));
}

#[test]
fn matrix_conversion_matches_point_conversion() {
    let mut m = Matrix4::identity();
    m[(0, 3)] = 1.0;
    m[(1, 3)] = 2.0;
    m[(2, 3)] = 3.0;
    let host = basis::matrix(&m);
    let t = Vector3::new(host[(0, 3)], host[(1, 3)], host[(2, 3)]);
    assert_eq!(t, basis::point([1.0, 2.0, 3.0]));
}

#[test]
fn distinct_names_give_distinct_path_hashes() {
    let json = unity_retarget_test_fixtures::skeletons::json("humanoid").unwrap();
    let skeleton = parse_skeleton_json(&json).unwrap();
    assert!(skeleton.hash_collisions().is_empty());

    let mut seen = HashSet::new();
    for joint in skeleton.joints() {
        let path = skeleton.path(joint.id);
        let hash = path_hash(&path);
        assert!(seen.insert(hash), "hash of '{path}' repeats");
        assert_eq!(skeleton.lookup_by_hash(hash), Ok(joint.id));
    }
    assert_eq!(seen.len(), skeleton.len());
}

#[test]
fn duplicate_names_are_suffixed_and_rejected_from_the_index() {
    let skeleton = SkeletonBuilder::new()
        .with(SourceTransform::new("Root", None))
        .with(SourceTransform::new("Arm", Some(0)))
        .with(SourceTransform::new("Arm", Some(0)))
        .build()
        .unwrap();
    let names: Vec<&str> = skeleton.joints().iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, ["Root", "Arm", "Arm.1"]);
    assert!(matches!(
        skeleton.lookup_by_hash(path_hash("Root/Arm")),
        Err(LookupError::Collision(ids)) if ids.len() == 2
    ));
    // Suffixes are host names only; the rebuilt index still sees two "Root/Arm".
    let index = skeleton.path_index(None);
    assert!(matches!(
        index.lookup(path_hash("Root/Arm")),
        Err(LookupError::Collision(ids)) if ids.len() == 2
    ));
    assert_eq!(index.lookup(path_hash("Root/Arm.1")), Err(LookupError::Missing));
}

#[test]
fn skeleton_rejects_bad_parents_and_unknown_skin_joints() {
    let err = SkeletonBuilder::new()
        .with(SourceTransform::new("A", Some(3)))
        .build()
        .unwrap_err();
    assert!(matches!(err, SkeletonError::ParentOutOfRange { index: 0, parent: 3 }));

    let err = SkeletonBuilder::new()
        .with(SourceTransform::new("A", None))
        .with_inverse_bind("Missing", Matrix4::identity())
        .build()
        .unwrap_err();
    assert_eq!(err, SkeletonError::UnknownJoint("Missing".to_string()));
}

#[test]
fn root_joint_restricts_inferred_paths() {
    let json = unity_retarget_test_fixtures::skeletons::json("humanoid").unwrap();
    let skeleton = parse_skeleton_json(&json).unwrap();
    let hips = skeleton.lookup_by_name("Hips").unwrap();
    let head = skeleton.lookup_by_name("Head").unwrap();
    let index = skeleton.path_index(Some(hips));
    assert_eq!(index.lookup(path_hash("Spine/Head")), Ok(head));
    assert_eq!(index.lookup(path_hash("Hips")), Err(LookupError::Missing));
    assert_eq!(skeleton.root(head), hips);
}
