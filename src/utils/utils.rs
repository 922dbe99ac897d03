//! Helper functions

use nalgebra::{Isometry3, UnitQuaternion};

/// Checks if all elements in the array are finite
pub fn is_valid(qs: &[f64]) -> bool {
    qs.iter().all(|&q| q.is_finite())
}

/// Formats joint values for logging, converting radians to degrees.
pub fn format_joints(joints: &[f64]) -> String {
    let row: Vec<String> = joints.iter()
        .map(|joint| format!("{:5.2}", joint.to_degrees()))
        .collect();
    format!("[{}]", row.join(" "))
}

/// Allows to specify joint values in degrees (converts to radians)
pub fn as_radians(degrees: &[f64]) -> Vec<f64> {
    degrees.iter().map(|d| d.to_radians()).collect()
}

pub fn dump_pose(isometry: &Isometry3<f64>) -> String {
    let translation = isometry.translation.vector;
    let rotation: UnitQuaternion<f64> = isometry.rotation;
    format!(
        "x: {:.5}, y: {:.5}, z: {:.5},  quat: {:.5},{:.5},{:.5},{:.5}",
        translation.x, translation.y, translation.z, rotation.i, rotation.j, rotation.k, rotation.w
    )
}

/// Panics with both poses printed if they differ by more than the given tolerances.
pub fn assert_pose_eq(ta: &Isometry3<f64>, tb: &Isometry3<f64>,
                      distance_tolerance: f64, angular_tolerance: f64) {
    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);

    if translation_distance > distance_tolerance {
        panic!("Poses have too different translations ({:.6}):\n{}\n{}",
               translation_distance, dump_pose(ta), dump_pose(tb));
    }

    if angular_distance > angular_tolerance {
        panic!("Poses have too different rotations ({:.6}):\n{}\n{}",
               angular_distance, dump_pose(ta), dump_pose(tb));
    }
}
