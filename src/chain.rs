//! Serial kinematic chain, a concrete [KinematicModel] with analytic forward kinematics
//! and Jacobian. Each joint moves its child frame relative to the frame of its parent:
//! the child placement is `parent * origin * motion(q)`.
//!
//! ```
//! use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
//! use rs_pose_ik::chain::{ChainJoint, SerialChain};
//! use rs_pose_ik::kinematic_traits::KinematicModel;
//!
//! let chain = SerialChain::new("base")
//!     .with_joint(ChainJoint::revolute("shoulder", "upper_arm", Isometry3::identity(), Vector3::z_axis()))
//!     .with_joint(ChainJoint::revolute("elbow", "forearm",
//!         Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.0), UnitQuaternion::identity()),
//!         Vector3::z_axis()))
//!     .with_joint(ChainJoint::fixed("tool_mount", "tool",
//!         Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.0), UnitQuaternion::identity())));
//!
//! assert_eq!(chain.nq(), 2);
//! let tool = chain.frame_index("tool").unwrap();
//! let pose = chain.frame_placement(&chain.neutral_configuration(), tool);
//! assert!((pose.translation.vector.x - 2.0).abs() < 1e-12);
//! ```

extern crate nalgebra as na;

use std::f64::consts::PI;
use std::fmt::{self, Display};
use na::{DMatrix, DVector, Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use crate::jacobian::change_reference;
use crate::kinematic_traits::{Configuration, FrameId, KinematicModel, Pose, ReferenceFrame};

/// Type of the joint and its axis, expressed in the joint frame (after the origin transform).
#[derive(Debug, Clone, Copy)]
pub enum JointType {
    /// Does not move, only attaches the child frame.
    Fixed,
    /// Rotation around the axis, the angle is not wrapped.
    Revolute { axis: Unit<Vector3<f64>> },
    /// Rotation around the axis without limits, the angle is wrapped into [-PI, PI).
    Continuous { axis: Unit<Vector3<f64>> },
    /// Translation along the axis.
    Prismatic { axis: Unit<Vector3<f64>> },
}

impl JointType {
    pub fn is_movable(&self) -> bool {
        !matches!(self, JointType::Fixed)
    }

    /// Motion of the joint at the given position
    fn motion(&self, position: f64) -> Isometry3<f64> {
        match *self {
            JointType::Fixed => Isometry3::identity(),
            JointType::Revolute { axis } | JointType::Continuous { axis } =>
                Isometry3::from_parts(Translation3::identity(),
                                      UnitQuaternion::from_axis_angle(&axis, position)),
            JointType::Prismatic { axis } =>
                Isometry3::from_parts(Translation3::from(axis.into_inner() * position),
                                      UnitQuaternion::identity()),
        }
    }
}

impl Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JointType::Fixed => write!(f, "fixed"),
            JointType::Revolute { axis } => write!(f, "revolute [{:.3}, {:.3}, {:.3}]", axis.x, axis.y, axis.z),
            JointType::Continuous { axis } => write!(f, "continuous [{:.3}, {:.3}, {:.3}]", axis.x, axis.y, axis.z),
            JointType::Prismatic { axis } => write!(f, "prismatic [{:.3}, {:.3}, {:.3}]", axis.x, axis.y, axis.z),
        }
    }
}

/// Joint of the chain together with the frame it carries.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: String,

    /// Name of the frame attached after this joint
    pub child_frame: String,

    /// Placement of the joint frame relative to the frame of the parent.
    pub origin: Isometry3<f64>,

    pub joint_type: JointType,
}

impl ChainJoint {
    pub fn new(name: &str, child_frame: &str, origin: Isometry3<f64>, joint_type: JointType) -> Self {
        ChainJoint {
            name: name.to_string(),
            child_frame: child_frame.to_string(),
            origin,
            joint_type,
        }
    }

    pub fn fixed(name: &str, child_frame: &str, origin: Isometry3<f64>) -> Self {
        Self::new(name, child_frame, origin, JointType::Fixed)
    }

    pub fn revolute(name: &str, child_frame: &str, origin: Isometry3<f64>, axis: Unit<Vector3<f64>>) -> Self {
        Self::new(name, child_frame, origin, JointType::Revolute { axis })
    }

    pub fn continuous(name: &str, child_frame: &str, origin: Isometry3<f64>, axis: Unit<Vector3<f64>>) -> Self {
        Self::new(name, child_frame, origin, JointType::Continuous { axis })
    }

    pub fn prismatic(name: &str, child_frame: &str, origin: Isometry3<f64>, axis: Unit<Vector3<f64>>) -> Self {
        Self::new(name, child_frame, origin, JointType::Prismatic { axis })
    }
}

/// Serial chain of joints. Frame 0 is the base, frame k + 1 is the child frame of joint k.
#[derive(Debug, Clone)]
pub struct SerialChain {
    base_frame: String,
    joints: Vec<ChainJoint>,

    /// Configuration index of each joint, None for fixed joints.
    offsets: Vec<Option<usize>>,
    nq: usize,
}

impl SerialChain {
    /// Creates an empty chain with the named base frame.
    pub fn new(base_frame: &str) -> Self {
        SerialChain {
            base_frame: base_frame.to_string(),
            joints: Vec::new(),
            offsets: Vec::new(),
            nq: 0,
        }
    }

    /// Appends the joint at the end of the chain.
    pub fn with_joint(mut self, joint: ChainJoint) -> Self {
        if joint.joint_type.is_movable() {
            self.offsets.push(Some(self.nq));
            self.nq += 1;
        } else {
            self.offsets.push(None);
        }
        self.joints.push(joint);
        self
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// Name of the frame with the given id
    pub fn frame_name(&self, frame: FrameId) -> Option<&str> {
        match frame.index() {
            0 => Some(self.base_frame.as_str()),
            i => self.joints.get(i - 1).map(|joint| joint.child_frame.as_str()),
        }
    }

    fn joint_position(&self, k: usize, q: &Configuration) -> f64 {
        self.offsets[k].map(|offset| q[offset]).unwrap_or(0.0)
    }
}

impl Display for SerialChain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.base_frame)?;
        for (level, joint) in self.joints.iter().enumerate() {
            writeln!(f, "{}{} {} -> {}", "    ".repeat(level + 1), joint.name, joint.joint_type, joint.child_frame)?;
        }
        Ok(())
    }
}

/// Wraps the angle into [-PI, PI)
pub(crate) fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

impl KinematicModel for SerialChain {
    fn nq(&self) -> usize {
        self.nq
    }

    fn neutral_configuration(&self) -> Configuration {
        DVector::zeros(self.nq)
    }

    fn joint_count(&self) -> usize {
        self.nq
    }

    fn joint_offset(&self, joint_name: &str) -> Option<usize> {
        self.joints.iter()
            .position(|joint| joint.name == joint_name)
            .and_then(|k| self.offsets[k])
    }

    fn frame_index(&self, frame_name: &str) -> Option<FrameId> {
        if frame_name == self.base_frame {
            return Some(FrameId::new(0));
        }
        self.joints.iter()
            .position(|joint| joint.child_frame == frame_name)
            .map(|k| FrameId::new(k + 1))
    }

    fn forward_kinematics(&self, q: &Configuration) -> Vec<Pose> {
        let mut placements = Vec::with_capacity(self.joints.len() + 1);
        let mut current = Isometry3::identity();
        placements.push(current);
        for (k, joint) in self.joints.iter().enumerate() {
            current = current * joint.origin * joint.joint_type.motion(self.joint_position(k, q));
            placements.push(current);
        }
        placements
    }

    fn frame_placement(&self, q: &Configuration, frame: FrameId) -> Pose {
        self.joints.iter()
            .take(frame.index())
            .enumerate()
            .fold(Isometry3::identity(), |current, (k, joint)| {
                current * joint.origin * joint.joint_type.motion(self.joint_position(k, q))
            })
    }

    fn integrate(&self, q: &Configuration, v: &DVector<f64>) -> Configuration {
        let mut result = q.clone();
        for (joint, offset) in self.joints.iter().zip(self.offsets.iter()) {
            if let Some(i) = *offset {
                result[i] = match joint.joint_type {
                    JointType::Continuous { .. } => wrap_angle(q[i] + v[i]),
                    _ => q[i] + v[i],
                };
            }
        }
        result
    }

    /// Geometric Jacobian. For the joint with world axis `a` through the world point `p`,
    /// the column is `[a x (p_frame - p), a]` for rotation and `[a, 0]` for translation, in world
    /// aligned axes. Joints after the frame do not move it.
    fn frame_jacobian(&self, q: &Configuration, frame: FrameId, reference: ReferenceFrame) -> DMatrix<f64> {
        let placements = self.forward_kinematics(q);
        let target = placements[frame.index()];
        let target_position = target.translation.vector;
        let mut aligned = DMatrix::zeros(6, self.nq);

        for (k, joint) in self.joints.iter().enumerate().take(frame.index()) {
            let Some(column) = self.offsets[k] else { continue };
            // Joint frame, the axis passes through its origin
            let joint_frame = placements[k] * joint.origin;
            match joint.joint_type {
                JointType::Revolute { axis } | JointType::Continuous { axis } => {
                    let world_axis = joint_frame.rotation * axis.into_inner();
                    let linear = world_axis.cross(&(target_position - joint_frame.translation.vector));
                    aligned.fixed_view_mut::<3, 1>(0, column).copy_from(&linear);
                    aligned.fixed_view_mut::<3, 1>(3, column).copy_from(&world_axis);
                }
                JointType::Prismatic { axis } => {
                    let world_axis = joint_frame.rotation * axis.into_inner();
                    aligned.fixed_view_mut::<3, 1>(0, column).copy_from(&world_axis);
                }
                JointType::Fixed => {}
            }
        }

        match reference {
            ReferenceFrame::LocalWorldAligned => aligned,
            _ => {
                // Back to the axes of the frame, then to the requested convention.
                let inverse_rotation = target.rotation.inverse().to_rotation_matrix().into_inner();
                let mut local = DMatrix::zeros(6, self.nq);
                for c in 0..self.nq {
                    let linear = inverse_rotation * aligned.fixed_view::<3, 1>(0, c);
                    let angular = inverse_rotation * aligned.fixed_view::<3, 1>(3, c);
                    local.fixed_view_mut::<3, 1>(0, c).copy_from(&linear);
                    local.fixed_view_mut::<3, 1>(3, c).copy_from(&angular);
                }
                change_reference(&local, &target, reference)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::numeric_frame_jacobian;
    use std::f64::consts::FRAC_PI_2;

    const EPSILON: f64 = 1e-9;

    fn mixed_chain() -> SerialChain {
        SerialChain::new("world")
            .with_joint(ChainJoint::prismatic("rail", "carriage", Isometry3::identity(), Vector3::x_axis()))
            .with_joint(ChainJoint::continuous("turret", "turret_link",
                Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.3), UnitQuaternion::identity()),
                Vector3::z_axis()))
            .with_joint(ChainJoint::fixed("bracket", "bracket_link",
                Isometry3::new(Vector3::new(0.1, 0.0, 0.2), Vector3::new(0.3, 0.0, 0.0))))
            .with_joint(ChainJoint::revolute("shoulder", "upper_arm", Isometry3::identity(), Vector3::y_axis()))
            .with_joint(ChainJoint::revolute("elbow", "forearm",
                Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.5), UnitQuaternion::identity()),
                Vector3::y_axis()))
            .with_joint(ChainJoint::fixed("flange", "tool",
                Isometry3::new(Vector3::new(0.05, 0.0, 0.4), Vector3::new(0.0, 0.2, 0.1))))
    }

    fn assert_matrix_approx_eq(left: &DMatrix<f64>, right: &DMatrix<f64>, epsilon: f64) {
        assert_eq!(left.shape(), right.shape());
        for i in 0..left.nrows() {
            for j in 0..left.ncols() {
                assert!((left[(i, j)] - right[(i, j)]).abs() < epsilon,
                        "left[{0},{1}] = {2} is not approximately equal to right[{0},{1}] = {3}",
                        i, j, left[(i, j)], right[(i, j)]);
            }
        }
    }

    #[test]
    fn test_offsets_skip_fixed_joints() {
        let chain = mixed_chain();
        assert_eq!(chain.nq(), 4);
        assert_eq!(chain.joint_count(), 4);
        assert_eq!(chain.joint_offset("rail"), Some(0));
        assert_eq!(chain.joint_offset("turret"), Some(1));
        assert_eq!(chain.joint_offset("bracket"), None);
        assert_eq!(chain.joint_offset("elbow"), Some(3));
        assert_eq!(chain.joint_offset("nonexistent"), None);
    }

    #[test]
    fn test_frames() {
        let chain = mixed_chain();
        assert_eq!(chain.frame_index("world"), Some(FrameId::new(0)));
        assert_eq!(chain.frame_index("tool"), Some(FrameId::new(6)));
        assert_eq!(chain.frame_name(FrameId::new(4)), Some("upper_arm"));
        assert_eq!(chain.frame_index("nowhere"), None);
    }

    #[test]
    fn test_planar_forward_kinematics() {
        let chain = SerialChain::new("base")
            .with_joint(ChainJoint::revolute("j1", "l1", Isometry3::identity(), Vector3::z_axis()))
            .with_joint(ChainJoint::revolute("j2", "l2",
                Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.0), UnitQuaternion::identity()),
                Vector3::z_axis()))
            .with_joint(ChainJoint::fixed("ee", "ee_link",
                Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.0), UnitQuaternion::identity())));
        let q = DVector::from_vec(vec![FRAC_PI_2, -FRAC_PI_2]);
        let ee = chain.frame_placement(&q, chain.frame_index("ee_link").unwrap());
        assert!((ee.translation.vector - Vector3::new(1.0, 1.0, 0.0)).norm() < EPSILON);
        assert!(ee.rotation.angle() < EPSILON);
    }

    #[test]
    fn test_frame_placement_matches_forward_kinematics() {
        let chain = mixed_chain();
        let q = DVector::from_vec(vec![0.2, -1.0, 0.4, 0.9]);
        let all = chain.forward_kinematics(&q);
        assert_eq!(all.len(), 7);
        for (i, expected) in all.iter().enumerate() {
            let placement = chain.frame_placement(&q, FrameId::new(i));
            assert!((placement.to_homogeneous() - expected.to_homogeneous()).norm() < EPSILON);
        }
    }

    #[test]
    fn test_integrate_wraps_continuous_only() {
        let chain = mixed_chain();
        let q = DVector::from_vec(vec![0.0, 3.0, 3.0, 0.0]);
        let v = DVector::from_vec(vec![0.5, 0.5, 0.5, 0.0]);
        let next = chain.integrate(&q, &v);
        assert!((next[0] - 0.5).abs() < EPSILON);
        assert!((next[1] - (3.5 - 2.0 * PI)).abs() < EPSILON);
        assert!((next[2] - 3.5).abs() < EPSILON);
    }

    #[test]
    fn test_analytic_jacobian_matches_numeric() {
        let chain = mixed_chain();
        let q = DVector::from_vec(vec![0.3, 0.7, -0.4, 1.1]);
        let tool = chain.frame_index("tool").unwrap();
        for reference in [ReferenceFrame::Local, ReferenceFrame::LocalWorldAligned, ReferenceFrame::World] {
            let analytic = chain.frame_jacobian(&q, tool, reference);
            let numeric = numeric_frame_jacobian(&chain, &q, tool, reference, 1e-7);
            assert_matrix_approx_eq(&analytic, &numeric, 1e-5);
        }
    }

    #[test]
    fn test_jacobian_ignores_joints_after_frame() {
        let chain = mixed_chain();
        let q = DVector::from_vec(vec![0.3, 0.7, -0.4, 1.1]);
        let upper_arm = chain.frame_index("upper_arm").unwrap();
        let jacobian = chain.frame_jacobian(&q, upper_arm, ReferenceFrame::Local);
        assert!(jacobian.column(3).norm() < EPSILON);
        assert!(jacobian.column(2).norm() > 0.1);
    }

    #[test]
    fn test_display() {
        let chain = SerialChain::planar_two_link(1.0, 1.0);
        assert_eq!(format!("{}", chain.joints()[0].joint_type), "revolute [0.000, 0.000, 1.000]");
        assert_eq!(format!("{}", chain),
                   "base\n    shoulder revolute [0.000, 0.000, 1.000] -> upper_arm\n        \
                    elbow revolute [0.000, 0.000, 1.000] -> forearm\n            tool_mount fixed -> tool\n");
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(PI) + PI).abs() < EPSILON);
        assert!((wrap_angle(-PI) + PI).abs() < EPSILON);
        assert!((wrap_angle(7.0) - (7.0 - 2.0 * PI)).abs() < EPSILON);
        assert!((wrap_angle(0.25) - 0.25).abs() < EPSILON);
    }
}
