//! Logarithm maps of rotations and rigid transforms, used to express the pose error
//! as a 6-vector in the tangent space.

extern crate nalgebra as na;

use na::{Isometry3, Matrix3, UnitQuaternion, Vector3, Vector6};

/// Below this squared angle the series expansions are used.
const SMALL_ANGLE_SQUARED: f64 = 1e-10;

/// Skew-symmetric matrix so that `skew(a) * b == a.cross(b)`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Rotation vector (axis times angle, angle in [0, PI]) of the unit quaternion.
/// Takes the shorter of the two quaternions representing the same rotation.
pub fn log3(rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
    let q = rotation.quaternion();
    let (w, imag) = if q.w < 0.0 {
        (-q.w, -q.imag())
    } else {
        (q.w, q.imag())
    };
    let sin_half_squared = imag.norm_squared();
    if sin_half_squared <= SMALL_ANGLE_SQUARED {
        // angle ~ 2 * sin(angle / 2)
        return imag * 2.0;
    }
    let sin_half = sin_half_squared.sqrt();
    let angle = 2.0 * sin_half.atan2(w);
    imag * (angle / sin_half)
}

/// Inverse of the left Jacobian of SO(3): J⁻¹ = I - ½[ω]× + c [ω]×²,
/// c = (1 - θ sinθ / (2 (1 - cosθ))) / θ², which tends to 1/12 for small θ.
pub fn left_jacobian_inverse(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta_squared = omega.norm_squared();
    let omega_skew = skew(omega);
    let c = if theta_squared <= SMALL_ANGLE_SQUARED {
        1.0 / 12.0
    } else {
        let theta = theta_squared.sqrt();
        (1.0 - theta * theta.sin() / (2.0 * (1.0 - theta.cos()))) / theta_squared
    };
    Matrix3::identity() - 0.5 * omega_skew + c * omega_skew * omega_skew
}

/// Tangent vector of the rigid transform: linear part first, angular part last.
pub fn log6(transform: &Isometry3<f64>) -> Vector6<f64> {
    let omega = log3(&transform.rotation);
    let linear = left_jacobian_inverse(&omega) * transform.translation.vector;
    Vector6::new(linear.x, linear.y, linear.z, omega.x, omega.y, omega.z)
}

/// Alignment of two orientations in [0, 1], 1 for the same rotation. Squaring the dot product
/// makes it independent of the sign of either quaternion.
pub fn orientation_alignment(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    let dot = a.coords.dot(&b.coords);
    dot * dot
}
