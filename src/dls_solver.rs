//! Differential inverse kinematics: Newton style iteration with damped least squares steps
//! on the pose error expressed in the tangent space.

extern crate nalgebra as na;

use std::sync::Arc;
use na::{DMatrix, DVector, Isometry3, Translation3, UnitQuaternion, Vector3};
use tracing::{debug, trace};
use crate::config_mapper::ConfigurationMapper;
use crate::error::IkError;
use crate::jacobian::dls_velocity;
use crate::kinematic_traits::{Configuration, FrameId, IkSolution, IkSolver, KinematicModel, Pose, ReferenceFrame};
use crate::se3::log6;
use crate::utils::{format_joints, is_valid};

/// What part of the pose is required to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkTask {
    /// Both position and orientation. The error is `log6(desired⁻¹ current)` and the
    /// Jacobian is taken in the local frame of the end effector.
    Pose,
    /// Position only. The error is the world position difference and the Jacobian is the
    /// linear part of the world aligned Jacobian. Orientation of the target is ignored.
    Position,
}

/// Configuration for the differential IK solver.
#[derive(Debug, Clone, Copy)]
pub struct DlsConfig {
    /// Converged when the norm of the error drops below this value.
    pub epsilon: f64,

    /// λ of the damped least squares. Higher = more robust near singularities,
    /// but slower convergence.
    pub damping: f64,

    /// Fraction of the Newton step applied per iteration.
    pub step_size: f64,

    /// Iteration limit used when the caller does not give one.
    pub max_iterations: usize,

    pub task: IkTask,
}

impl Default for DlsConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            damping: 1e-12,
            step_size: 0.1,
            max_iterations: 100,
            task: IkTask::Pose,
        }
    }
}

impl DlsConfig {
    /// Checks that the tolerance and the step are positive and the damping is not negative.
    pub fn validate(&self) -> Result<(), IkError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(IkError::InvalidParameter(format!("epsilon must be positive, got {}", self.epsilon)));
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(IkError::InvalidParameter(format!("damping must not be negative, got {}", self.damping)));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(IkError::InvalidParameter(format!("step_size must be positive, got {}", self.step_size)));
        }
        Ok(())
    }
}

/// Damped least squares IK solver for the end effector frame of a kinematic model.
pub struct DifferentialIkSolver {
    model: Arc<dyn KinematicModel>,
    mapper: ConfigurationMapper,
    end_effector: FrameId,
    config: DlsConfig,
}

impl DifferentialIkSolver {
    /// Creates the solver that moves `controlled_joints` (names, "ignore" entries are skipped)
    /// to place the frame `end_effector` at the target.
    pub fn new(model: Arc<dyn KinematicModel>, end_effector: &str, controlled_joints: &[&str],
               config: DlsConfig) -> Result<Self, IkError> {
        let end_effector_frame = model.frame_index(end_effector)
            .ok_or_else(|| IkError::UnknownFrame(end_effector.to_string()))?;
        let mapper = ConfigurationMapper::new(model.as_ref(), controlled_joints)?;
        if mapper.dof() == 0 {
            return Err(IkError::InvalidParameter("no controlled joints".to_string()));
        }
        config.validate()?;
        Ok(DifferentialIkSolver {
            model,
            mapper,
            end_effector: end_effector_frame,
            config,
        })
    }

    /// Solver with the default configuration.
    pub fn with_defaults(model: Arc<dyn KinematicModel>, end_effector: &str,
                         controlled_joints: &[&str]) -> Result<Self, IkError> {
        Self::new(model, end_effector, controlled_joints, DlsConfig::default())
    }

    pub fn config(&self) -> &DlsConfig {
        &self.config
    }

    pub fn mapper(&self) -> &ConfigurationMapper {
        &self.mapper
    }

    pub fn model(&self) -> &Arc<dyn KinematicModel> {
        &self.model
    }

    /// Error of the current end effector pose relative to the desired one, for the configured task.
    pub fn task_error(&self, desired: &Pose, current: &Pose) -> DVector<f64> {
        match self.config.task {
            IkTask::Pose => {
                let tangent = log6(&(desired.inverse() * current));
                DVector::from_column_slice(tangent.as_slice())
            }
            IkTask::Position => {
                let difference = current.translation.vector - desired.translation.vector;
                DVector::from_column_slice(difference.as_slice())
            }
        }
    }

    /// Jacobian of the task, restricted to the columns of the controlled joints.
    pub fn task_jacobian(&self, q: &Configuration) -> DMatrix<f64> {
        let (reference, rows) = match self.config.task {
            IkTask::Pose => (ReferenceFrame::Local, 6),
            IkTask::Position => (ReferenceFrame::LocalWorldAligned, 3),
        };
        let full = self.model.frame_jacobian(q, self.end_effector, reference);
        let columns = self.mapper.velocity_indices();
        DMatrix::from_fn(rows, columns.len(), |r, c| full[(r, columns[c])])
    }

    /// Runs the iteration from the full configuration `q`.
    fn solve(&self, desired: &Pose, mut q: Configuration, max_iterations: usize) -> Result<IkSolution, IkError> {
        let nv = self.model.nv();
        let columns = self.mapper.velocity_indices();
        let mut iterations = 0;

        let (success, error_norm) = loop {
            let current = self.model.frame_placement(&q, self.end_effector);
            let error = self.task_error(desired, &current);
            let error_norm = error.norm();
            trace!("IK iteration {}: error {:.3e}", iterations, error_norm);

            if error_norm < self.config.epsilon {
                break (true, error_norm);
            }
            if iterations >= max_iterations || !error_norm.is_finite() {
                break (false, error_norm);
            }

            let jacobian = self.task_jacobian(&q);
            let velocity = -dls_velocity(&jacobian, &error, self.config.damping);

            let mut v = DVector::zeros(nv);
            for (&index, value) in columns.iter().zip(velocity.iter()) {
                v[index] = value * self.config.step_size;
            }
            q = self.model.integrate(&q, &v);
            iterations += 1;

            if !is_valid(q.as_slice()) {
                break (false, f64::NAN);
            }
        };

        let joints = self.mapper.to_reduced(&q)?;
        debug!("IK {} after {} iterations, error {:.3e}, joints {}",
            if success { "converged" } else { "did not converge" },
            iterations, error_norm, format_joints(&joints));

        Ok(IkSolution {
            joints,
            success,
            iterations,
            error_norm,
        })
    }
}

impl IkSolver for DifferentialIkSolver {
    fn compute_ik(
        &self,
        position: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
        initial: Option<&[f64]>,
        max_iterations: Option<usize>,
    ) -> Result<IkSolution, IkError> {
        let q = match initial {
            Some(joints) => self.mapper.to_full(joints)?,
            None => self.mapper.neutral().clone(),
        };
        let desired = Isometry3::from_parts(Translation3::from(*position), *orientation);
        self.solve(&desired, q, max_iterations.unwrap_or(self.config.max_iterations))
    }

    fn compute_fk(&self, joints: &[f64]) -> Result<(Vector3<f64>, UnitQuaternion<f64>), IkError> {
        let q = self.mapper.to_full(joints)?;
        let pose = self.model.frame_placement(&q, self.end_effector);
        Ok((pose.translation.vector, pose.rotation))
    }

    fn dof(&self) -> usize {
        self.mapper.dof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SerialChain;
    use crate::config_mapper::IGNORE_JOINT;

    fn planar_solver(task: IkTask) -> DifferentialIkSolver {
        let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::planar_two_link(1.0, 1.0));
        DifferentialIkSolver::new(arm, "tool", &["shoulder", "elbow"],
                                  DlsConfig { task, ..DlsConfig::default() }).unwrap()
    }

    #[test]
    fn test_unknown_frame() {
        let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::planar_two_link(1.0, 1.0));
        let result = DifferentialIkSolver::with_defaults(arm, "gripper", &["shoulder", "elbow"]);
        assert!(matches!(result, Err(IkError::UnknownFrame(_))));
    }

    #[test]
    fn test_all_joints_ignored() {
        let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::planar_two_link(1.0, 1.0));
        let result = DifferentialIkSolver::with_defaults(arm, "tool", &[IGNORE_JOINT]);
        assert!(matches!(result, Err(IkError::InvalidParameter(_))));
    }

    #[test]
    fn test_invalid_config() {
        let invalid = [
            DlsConfig { damping: -1e-6, ..DlsConfig::default() },
            DlsConfig { step_size: 0.0, ..DlsConfig::default() },
            DlsConfig { epsilon: 0.0, ..DlsConfig::default() },
            DlsConfig { damping: f64::NAN, ..DlsConfig::default() },
        ];
        for config in invalid {
            let arm: Arc<dyn KinematicModel> = Arc::new(SerialChain::planar_two_link(1.0, 1.0));
            let result = DifferentialIkSolver::new(arm, "tool", &["shoulder", "elbow"], config);
            assert!(matches!(result, Err(IkError::InvalidParameter(_))), "accepted {:?}", config);
        }
        assert!(DlsConfig { damping: 0.0, ..DlsConfig::default() }.validate().is_ok());
    }

    #[test]
    fn test_fk() {
        let solver = planar_solver(IkTask::Pose);
        let (position, orientation) = solver.compute_fk(&[std::f64::consts::FRAC_PI_2, 0.0]).unwrap();
        assert!((position - Vector3::new(0.0, 2.0, 0.0)).norm() < 1e-12);
        assert!((orientation.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_already_at_target() {
        let solver = planar_solver(IkTask::Pose);
        let (position, orientation) = solver.compute_fk(&[0.4, -0.3]).unwrap();
        let solution = solver.compute_ik(&position, &orientation, Some(&[0.4, -0.3]), None).unwrap();
        assert!(solution.success);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.joints, vec![0.4, -0.3]);
    }

    #[test]
    fn test_pose_round_trip() {
        let solver = planar_solver(IkTask::Pose);
        let (position, orientation) = solver.compute_fk(&[0.3, 0.5]).unwrap();
        let solution = solver.compute_ik(&position, &orientation, Some(&[0.2, 0.2]), Some(200)).unwrap();
        assert!(solution.success, "error {}", solution.error_norm);
        let (reached, reached_orientation) = solver.compute_fk(&solution.joints).unwrap();
        assert!((reached - position).norm() < 1e-3);
        assert!(reached_orientation.angle_to(&orientation) < 1e-3);
    }

    #[test]
    fn test_iteration_limit_reports_failure() {
        let solver = planar_solver(IkTask::Pose);
        let (position, orientation) = solver.compute_fk(&[0.3, 0.5]).unwrap();
        let solution = solver.compute_ik(&position, &orientation, None, Some(3)).unwrap();
        assert!(!solution.success);
        assert_eq!(solution.iterations, 3);
        assert!(solution.error_norm > 1e-4);
    }

    #[test]
    fn test_unreachable_target_is_not_an_error() {
        let solver = planar_solver(IkTask::Position);
        let solution = solver.compute_ik(&Vector3::new(5.0, 5.0, 0.0), &UnitQuaternion::identity(),
                                         Some(&[0.2, 0.2]), Some(50)).unwrap();
        assert!(!solution.success);
        assert!(is_valid(&solution.joints));
        assert!(solution.error_norm > 1.0);
    }

    #[test]
    fn test_seed_of_wrong_length() {
        let solver = planar_solver(IkTask::Pose);
        let result = solver.compute_ik(&Vector3::new(1.0, 1.0, 0.0), &UnitQuaternion::identity(),
                                       Some(&[0.0, 0.0, 0.0]), None);
        assert!(matches!(result, Err(IkError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_rank_deficient_step_is_finite() {
        // Fully stretched arm, the target is straight along the arm, beyond the reach.
        let solver = planar_solver(IkTask::Pose);
        let q = DVector::zeros(2);
        let jacobian = solver.task_jacobian(&q);
        let desired = Isometry3::translation(2.5, 0.0, 0.0);
        let current = solver.model().frame_placement(&q, solver.end_effector);
        let error = solver.task_error(&desired, &current);
        let velocity = dls_velocity(&jacobian, &error, solver.config().damping);
        assert!(velocity.iter().all(|v| v.is_finite()));

        let solution = solver.compute_ik(&Vector3::new(2.5, 0.0, 0.0), &UnitQuaternion::identity(),
                                         None, Some(10)).unwrap();
        assert!(!solution.success);
        assert!(is_valid(&solution.joints));
    }
}
