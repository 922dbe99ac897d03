//! Contracts between the solvers and the kinematic model

extern crate nalgebra as na;

use na::{DMatrix, DVector, Isometry3, UnitQuaternion, Vector3};
use crate::error::IkError;
use crate::jacobian::numeric_frame_jacobian;

/// Pose is used a pose of the end effector. It contains both Cartesian position and rotation quaternion
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Values of the controlled joints only, in the order given when the solver was constructed.
pub type Joints = Vec<f64>;

/// Complete configuration vector of the kinematic model, in its native ordering.
pub type Configuration = DVector<f64>;

/// Index of a frame inside the kinematic model. Only meaningful for the model that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

impl FrameId {
    pub fn new(index: usize) -> Self {
        FrameId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Frame convention in that the Jacobian is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFrame {
    /// Linear velocity of the frame origin and angular velocity, both in the axes of the frame.
    Local,
    /// Linear velocity of the frame origin and angular velocity, both in the world axes.
    LocalWorldAligned,
    /// Spatial velocity, linear part taken at the world origin.
    World,
}

/// Kinematic model of the robot. The model is immutable after construction and must be safe for
/// concurrent reads, as candidate evaluations of the optimizer may run in parallel.
///
/// Velocity vectors (`v`, Jacobian columns) have `nv()` entries and configuration vectors
/// have `nq()` entries.
pub trait KinematicModel: Send + Sync {
    /// Size of the configuration vector
    fn nq(&self) -> usize;

    /// Size of the velocity vector
    fn nv(&self) -> usize {
        self.nq()
    }

    /// Reference configuration that seeds all joints the caller does not set.
    fn neutral_configuration(&self) -> Configuration;

    /// Number of movable joints
    fn joint_count(&self) -> usize;

    /// Index of the joint in the configuration vector, None if there is no such movable joint.
    fn joint_offset(&self, joint_name: &str) -> Option<usize>;

    /// Index of the joint in the velocity vector.
    fn joint_velocity_offset(&self, joint_name: &str) -> Option<usize> {
        self.joint_offset(joint_name)
    }

    /// Finds the frame by name.
    fn frame_index(&self, frame_name: &str) -> Option<FrameId>;

    /// World placement of every frame, indexed by [FrameId::index].
    fn forward_kinematics(&self, q: &Configuration) -> Vec<Pose>;

    /// World placement of a single frame.
    fn frame_placement(&self, q: &Configuration, frame: FrameId) -> Pose {
        self.forward_kinematics(q)[frame.index()]
    }

    /// Moves the configuration `q` by the velocity `v` applied for the unit time,
    /// respecting the type of each joint.
    fn integrate(&self, q: &Configuration, v: &DVector<f64>) -> Configuration;

    /// 6 x nv Jacobian of the frame (linear rows first), in the requested convention.
    /// The provided implementation uses finite differences and is meant for models
    /// that do not have an analytic one.
    fn frame_jacobian(&self, q: &Configuration, frame: FrameId, reference: ReferenceFrame) -> DMatrix<f64> {
        numeric_frame_jacobian(self, q, frame, reference, 1e-7)
    }
}

/// Result of the inverse kinematics. Failure to converge is not an error and is
/// reported with `success = false`, `joints` then hold the last configuration reached.
#[derive(Debug, Clone)]
pub struct IkSolution {
    /// Values of the controlled joints
    pub joints: Joints,

    /// True if the error dropped below the tolerance
    pub success: bool,

    /// Number of Newton steps taken
    pub iterations: usize,

    /// Norm of the remaining error
    pub error_norm: f64,
}

/// Shared contract of the interchangeable inverse kinematics backends.
pub trait IkSolver: Send + Sync {
    /// Joint values for the desired end effector position and orientation. If `initial` is None,
    /// starts from the neutral configuration. If `max_iterations` is None, the configured limit is used.
    fn compute_ik(
        &self,
        position: &Vector3<f64>,
        orientation: &UnitQuaternion<f64>,
        initial: Option<&[f64]>,
        max_iterations: Option<usize>,
    ) -> Result<IkSolution, IkError>;

    /// End effector position and orientation for the given joint values.
    fn compute_fk(&self, joints: &[f64]) -> Result<(Vector3<f64>, UnitQuaternion<f64>), IkError>;

    /// Number of controlled joints
    fn dof(&self) -> usize;
}
