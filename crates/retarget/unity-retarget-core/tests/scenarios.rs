use std::f32::consts::PI;

use unity_retarget_core::{
    basis, build_action, parse_clip_json, parse_skeleton_json, path_hash, Attribute, BlendShapeTable,
    ChannelOutcome, Clip, Curve, ImportOptions, Interpolation, Keyframe, LightRigConfig, RotationMode,
    SkeletonBuilder, SourceTransform, SpecialChannelConfig, Value,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn clip(name: &str) -> Clip {
    let json = unity_retarget_test_fixtures::clips::json(name).expect("load clip fixture");
    parse_clip_json(&json).expect("parse clip fixture")
}

fn single_joint(name: &str) -> unity_retarget_core::Skeleton {
    SkeletonBuilder::new()
        .with(SourceTransform::new(name, None))
        .build()
        .expect("build skeleton")
}

#[test]
fn single_identity_rotation_key() {
    let clip = clip("single-rotation");
    let skeleton = single_joint("Hip");
    let (action, report) = build_action(&clip, &skeleton, ImportOptions::default()).unwrap();

    assert_eq!(report.ok, 1);
    let curves: Vec<_> = action.fcurves_for("pose.Hip.rotation_quaternion").collect();
    assert_eq!(curves.len(), 4);
    for (curve, expected) in curves.iter().zip([1.0, 0.0, 0.0, 0.0]) {
        assert_eq!(curve.keyframes.len(), 1);
        let key = &curve.keyframes[0];
        approx(key.frame, 0.0, 1e-6);
        approx(key.value, expected, 1e-6);
        assert_eq!(key.interpolation, Interpolation::Linear);
    }
    assert_eq!(
        action.rotation_mode("pose.Hip"),
        Some(RotationMode::Quaternion)
    );
}

#[test]
fn wrapped_euler_keeps_turns() {
    let clip = clip("wrapped-euler");
    let skeleton = single_joint("Spin");
    let (action, _) = build_action(&clip, &skeleton, ImportOptions::default()).unwrap();

    let z = action.fcurve("pose.Spin.rotation_euler", 2).expect("z curve");
    assert_eq!(z.keyframes.len(), 2);
    approx(z.keyframes[0].value, 0.0, 1e-6);
    approx(z.keyframes[1].value, -4.0 * PI, 1e-5);
    approx(z.keyframes[1].frame, 60.0, 1e-4);
    assert_eq!(z.keyframes[0].interpolation, Interpolation::Linear);
    approx(action.evaluate_at_time("pose.Spin.rotation_euler", 2, 0.5).unwrap(), -2.0 * PI, 1e-4);
    assert_eq!(action.rotation_mode("pose.Spin"), Some(RotationMode::Yxz));
}

#[test]
fn stepped_light_holds_values() {
    let clip = clip("stepped-light");
    let skeleton = single_joint("Hip");
    let options = ImportOptions::default()
        .with_special(SpecialChannelConfig::default().with_light(LightRigConfig::default()));
    let (action, report) = build_action(&clip, &skeleton, options).unwrap();

    assert_eq!(report.ok, 1);
    let path = "light.Light.m_Intensity";
    let curve = action.fcurve(path, 0).expect("intensity curve");
    assert!(curve.keyframes[..2]
        .iter()
        .all(|k| k.interpolation == Interpolation::Constant));
    for (t, expected) in [(0.0, 0.0), (0.25, 0.0), (0.49, 0.0), (0.5, 1.0), (0.75, 1.0), (0.99, 1.0), (1.0, 0.0)] {
        approx(action.evaluate_at_time(path, 0, t).unwrap(), expected, 0.0);
    }
}

#[test]
fn unknown_path_hash_is_reported_not_fatal() {
    let clip = clip("walk");
    let skeleton = parse_skeleton_json(&unity_retarget_test_fixtures::skeletons::json("humanoid").unwrap())
        .unwrap();
    let (action, report) = build_action(&clip, &skeleton, ImportOptions::default()).unwrap();

    assert_eq!(report.unresolved, 1);
    let entry = report
        .entries
        .iter()
        .find(|e| e.outcome == ChannelOutcome::Unresolved)
        .unwrap();
    assert_eq!(entry.path_hash, path_hash("Hips/Tail"));
    assert_eq!(entry.curve_index, 4);
    assert!(action.fcurves.iter().all(|c| !c.data_path.contains("Tail")));
    // Every other channel still reached the action.
    assert_eq!(report.summary(), "5 of 6 channels imported");
}

#[test]
fn hermite_translation_matches_converted_source() {
    let curve = Curve::new(
        path_hash("Hip"),
        Attribute::Translation,
        vec![
            Keyframe::vec3(0.0, [0.0, 0.0, 0.0], [0.0; 3], [1.0, 0.0, 0.0]),
            Keyframe::vec3(1.0, [1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0; 3]),
        ],
    );
    let clip = Clip::new("hermite", 1.0, 30.0).with_curve(curve.clone());
    let skeleton = single_joint("Hip");
    let (action, _) = build_action(&clip, &skeleton, ImportOptions::default()).unwrap();

    let source = unity_retarget_core::sample_unity_curve(&curve, 0.5).unwrap();
    let expected = match source {
        Value::Vec3(v) => basis::point(v),
        other => panic!("unexpected {other:?}"),
    };
    approx(expected.x, -0.5, 1e-6);
    for i in 0..3 {
        let got = action.evaluate_at_time("pose.Hip.location", i, 0.5).unwrap();
        approx(got, expected[i], 1e-5);
    }
    let x = action.fcurve("pose.Hip.location", 0).unwrap();
    assert_eq!(x.keyframes[0].interpolation, Interpolation::Bezier);
}

#[test]
fn blend_shape_weights_are_normalized() {
    let clip = clip("face");
    let skeleton = single_joint("Hip");
    let table = BlendShapeTable::from_names("Face", "Body", ["Smile", "Frown"]);
    let options = ImportOptions::default()
        .with_special(SpecialChannelConfig::default().with_blend_shapes(table));
    let (action, report) = build_action(&clip, &skeleton, options).unwrap();

    assert_eq!(report.ok, 2);
    let smile = action.fcurve("mesh.Face.key_blocks.Smile.value", 0).unwrap();
    assert_eq!(smile.keyframes[0].value, 1.0);
    approx(smile.keyframes[1].value, 0.25, 1e-6);
    let frown = action.fcurve("mesh.Face.key_blocks.Frown.value", 0).unwrap();
    assert_eq!(frown.keyframes[0].value, 0.5);
}
