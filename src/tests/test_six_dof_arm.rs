use std::sync::Arc;
use nalgebra::{Isometry3, Translation3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::chain::SerialChain;
use crate::config_mapper::IGNORE_JOINT;
use crate::dls_solver::DifferentialIkSolver;
use crate::kinematic_traits::{IkSolver, KinematicModel};
use crate::utils::{as_radians, assert_pose_eq};

fn six_dof_solver(joints: &[&str]) -> DifferentialIkSolver {
    let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::six_dof_arm());
    DifferentialIkSolver::with_defaults(arm, "end_effector", joints).unwrap()
}

fn all_joints() -> Vec<&'static str> {
    vec!["j1_base_yaw", "j2_shoulder_pitch", "j3_elbow_pitch", "j4_forearm_roll", "j5_wrist_pitch", "j6_wrist_roll"]
}

#[test]
fn test_round_trip_near_seed() {
    let solver = six_dof_solver(&all_joints());
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..8 {
        let expected: Vec<f64> = as_radians(&[
            rng.gen_range(-90.0..90.0), rng.gen_range(10.0..50.0), rng.gen_range(20.0..70.0),
            rng.gen_range(-90.0..90.0), rng.gen_range(20.0..70.0), rng.gen_range(-90.0..90.0),
        ]);
        let seed: Vec<f64> = expected.iter().map(|j| j + rng.gen_range(-0.15..0.15)).collect();

        let (position, orientation) = solver.compute_fk(&expected).unwrap();
        let solution = solver.compute_ik(&position, &orientation, Some(&seed), Some(300)).unwrap();
        assert!(solution.success, "no solution for {:?}, error {}", expected, solution.error_norm);

        let (reached, reached_orientation) = solver.compute_fk(&solution.joints).unwrap();
        assert_pose_eq(&Isometry3::from_parts(Translation3::from(reached), reached_orientation),
                       &Isometry3::from_parts(Translation3::from(position), orientation), 1e-3, 1e-3);
    }
}

#[test]
fn test_uncontrolled_joints_stay_neutral() {
    let solver = six_dof_solver(&["j2_shoulder_pitch", IGNORE_JOINT, "j3_elbow_pitch"]);
    assert_eq!(solver.dof(), 2);

    let (position, orientation) = solver.compute_fk(&[0.4, 0.6]).unwrap();
    let solution = solver.compute_ik(&position, &orientation, Some(&[0.3, 0.5]), Some(300)).unwrap();
    assert!(solution.success, "error {}", solution.error_norm);
    assert_eq!(solution.joints.len(), 2);
    assert!((solution.joints[0] - 0.4).abs() < 1e-3);
    assert!((solution.joints[1] - 0.6).abs() < 1e-3);
}

#[test]
fn test_unknown_joint() {
    let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::six_dof_arm());
    let result = DifferentialIkSolver::with_defaults(arm, "end_effector", &["j1_base_yaw", "j7"]);
    assert!(result.is_err());
}
