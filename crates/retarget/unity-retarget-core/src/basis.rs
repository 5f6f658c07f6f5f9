//! Coordinate basis change between Unity (left-handed, Y-up) and the host
//! (right-handed, Z-up).
//!
//! The fixed change of basis `B` maps Unity `(x, y, z)` to host `(-x, -z, y)`.
//! `B` is a signed permutation with determinant -1, so rotations conjugate to
//! rotations about `-B·axis` and quaternions map `(x, y, z, w)` to
//! `(w, x, z, -y)`. Because `B` is linear, slopes transform exactly like the
//! values they differentiate and the `*_slope` helpers are the same maps.

use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, UnitQuaternion, Vector3};
use std::f32::consts::{FRAC_1_SQRT_2, TAU};

/// Unity position or translation -> host.
#[inline]
pub fn point(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(-v[0], -v[2], v[1])
}

/// Host position -> Unity (inverse of [`point`]).
#[inline]
pub fn point_inverse(v: &Vector3<f32>) -> [f32; 3] {
    [-v.x, v.z, -v.y]
}

#[inline]
pub fn point_slope(v: [f32; 3]) -> Vector3<f32> {
    point(v)
}

/// Non-uniform scale: axes permute, no sign flip.
#[inline]
pub fn scale(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(v[0], v[2], v[1])
}

#[inline]
pub fn scale_slope(v: [f32; 3]) -> Vector3<f32> {
    scale(v)
}

/// Unity quaternion `(x, y, z, w)` -> host quaternion (not normalized).
#[inline]
pub fn quat(q: [f32; 4]) -> Quaternion<f32> {
    Quaternion::new(q[3], q[0], q[2], -q[1])
}

#[inline]
pub fn quat_slope(q: [f32; 4]) -> Quaternion<f32> {
    quat(q)
}

/// Unity quaternion -> normalized host rotation. Degenerate input maps to identity.
pub fn quat_unit(q: [f32; 4]) -> UnitQuaternion<f32> {
    let h = quat(q);
    if h.norm_squared() <= f32::EPSILON {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_quaternion(h)
    }
}

/// Unity Euler angles in degrees (ZXY composition) -> host radians for YXZ
/// rotation mode, with the axis permutation `(x, z, -y)`.
#[inline]
pub fn euler(e_deg: [f32; 3]) -> Vector3<f32> {
    Vector3::new(
        e_deg[0].to_radians(),
        e_deg[2].to_radians(),
        -e_deg[1].to_radians(),
    )
}

#[inline]
pub fn euler_slope(e_deg: [f32; 3]) -> Vector3<f32> {
    euler(e_deg)
}

fn basis_matrix() -> Matrix4<f32> {
    Matrix4::new(
        -1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Unity 4x4 transform -> host: `B · M · B⁻¹` (`B` is orthonormal, `B⁻¹ = Bᵀ`).
pub fn matrix(m: &Matrix4<f32>) -> Matrix4<f32> {
    let b = basis_matrix();
    b * m * b.transpose()
}

/// Rotation Unity applies for Euler `(x, y, z)` degrees: Z first, then X, then Y.
/// The result stays in Unity's basis.
pub fn unity_euler_to_quat(e_deg: [f32; 3]) -> UnitQuaternion<f32> {
    let qx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), e_deg[0].to_radians());
    let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), e_deg[1].to_radians());
    let qz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), e_deg[2].to_radians());
    qy * qx * qz
}

/// Host Euler (radians) in YXZ mode: Y applied first, then X, then Z.
pub fn euler_yxz_to_quat(e: &Vector3<f32>) -> UnitQuaternion<f32> {
    let qx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), e.x);
    let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), e.y);
    let qz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), e.z);
    qz * qx * qy
}

/// Decompose a rotation into host YXZ Euler angles (radians).
///
/// `R = Rz(c)·Rx(a)·Ry(b)`, so `R[2][1] = sin a`, `b = atan2(-R[2][0], R[2][2])`
/// and `c = atan2(-R[0][1], R[1][1])`. At gimbal lock `c` is pinned to zero.
pub fn quat_to_euler_yxz(q: &UnitQuaternion<f32>) -> Vector3<f32> {
    let rot = q.to_rotation_matrix();
    let m = rot.matrix();
    let sin_a = m[(2, 1)].clamp(-1.0, 1.0);
    let a = sin_a.asin();
    if sin_a.abs() < 1.0 - 1e-6 {
        let b = (-m[(2, 0)]).atan2(m[(2, 2)]);
        let c = (-m[(0, 1)]).atan2(m[(1, 1)]);
        Vector3::new(a, b, c)
    } else {
        let b = m[(0, 2)].atan2(m[(0, 0)]);
        Vector3::new(a, b, 0.0)
    }
}

/// Shift each component of `e` by whole turns so it lies within half a turn of
/// the matching component of `reference`.
pub fn make_compatible(e: &Vector3<f32>, reference: &Vector3<f32>) -> Vector3<f32> {
    e.zip_map(reference, |v, r| v - ((v - r) / TAU).round() * TAU)
}

/// Fixed rotation taking host camera axes (looking down -Z, +Y up) onto the
/// basis-converted axes of a Unity camera (looking down +Z, +Y up).
pub fn camera_axis_fix() -> UnitQuaternion<f32> {
    UnitQuaternion::new_unchecked(Quaternion::new(0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2))
}

/// Split a homogeneous transform into translation, rotation and scale.
pub fn decompose(m: &Matrix4<f32>) -> (Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>) {
    let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let mut basis = Matrix3::new(
        m[(0, 0)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 0)],
        m[(1, 1)],
        m[(1, 2)],
        m[(2, 0)],
        m[(2, 1)],
        m[(2, 2)],
    );
    let mut scale = Vector3::new(
        basis.column(0).norm(),
        basis.column(1).norm(),
        basis.column(2).norm(),
    );
    if basis.determinant() < 0.0 {
        scale.x = -scale.x;
    }
    for (i, s) in scale.iter().enumerate() {
        if s.abs() > f32::EPSILON {
            let mut col = basis.column_mut(i);
            col /= *s;
        }
    }
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&basis));
    (translation, rotation, scale)
}

/// Compose translation, rotation and scale into a homogeneous transform.
pub fn compose(
    translation: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
    scale: &Vector3<f32>,
) -> Matrix4<f32> {
    Matrix4::new_translation(translation)
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale)
}
