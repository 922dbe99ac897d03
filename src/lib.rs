//! Rust implementation of numerical inverse kinematics for serial robot arms, with an optional
//! stochastic search for the end effector orientation.
//!
//! # Features
//!
//! - Differential IK: Newton style iterations with damped least squares steps on the pose error
//!   taken in the tangent space of SE(3). Damping keeps the step finite at singular configurations.
//! - Only the selected joints move, the remaining joints of the model keep their neutral values.
//! - Position only task for arms that cannot hold the requested orientation.
//! - Stochastic pose optimizer: when the exact orientation does not matter, searches for the
//!   orientation near the requested one that lets the IK reach the position. It is built on a
//!   generic Cross-Entropy Method optimizer, evaluating the candidates in parallel.
//! - Kinematic models are accessed through the [kinematic_traits::KinematicModel] trait.
//!   [chain::SerialChain] implements it for chains of revolute, continuous and prismatic joints,
//!   with analytic Jacobian. Other models get a finite difference Jacobian.
//! - IK backends are interchangeable through the [kinematic_traits::IkSolver] trait.
//! - Settings can be read from and written to YAML.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nalgebra::{UnitQuaternion, Vector3};
//! use rs_pose_ik::chain::SerialChain;
//! use rs_pose_ik::dls_solver::{DifferentialIkSolver, DlsConfig, IkTask};
//! use rs_pose_ik::kinematic_traits::{IkSolver, KinematicModel};
//!
//! let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::planar_two_link(1.0, 1.0));
//! let config = DlsConfig { task: IkTask::Position, max_iterations: 300, ..DlsConfig::default() };
//! let solver = DifferentialIkSolver::new(arm, "tool", &["shoulder", "elbow"], config).unwrap();
//!
//! let target = Vector3::new(1.2, 0.8, 0.0);
//! let solution = solver.compute_ik(&target, &UnitQuaternion::identity(), Some(&[0.3, 0.3]), None).unwrap();
//! let (reached, _) = solver.compute_fk(&solution.joints).unwrap();
//! assert!(solution.success);
//! assert!((reached - target).norm() < 1e-3);
//! ```

pub mod kinematic_traits;
pub mod error;

pub mod se3;
pub mod jacobian;

pub mod chain;
pub mod robots;

pub mod config_mapper;
pub mod dls_solver;

pub mod cem;
pub mod pose_optimizer;

pub mod settings;

#[path = "utils/utils.rs"]
pub mod utils;

#[cfg(test)]
mod tests;
