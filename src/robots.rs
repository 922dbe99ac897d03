//! Hardcoded chains of a few simple arms, for demos and tests.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use crate::chain::{ChainJoint, SerialChain};

fn offset(x: f64, y: f64, z: f64) -> Isometry3<f64> {
    Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
}

impl SerialChain {
    /// Two links in the XY plane, both joints rotate around Z. The arm is stretched along X
    /// at the neutral configuration.
    /// Joints: "shoulder", "elbow"; frames: "base", "upper_arm", "forearm", "tool".
    pub fn planar_two_link(l1: f64, l2: f64) -> Self {
        SerialChain::new("base")
            .with_joint(ChainJoint::revolute("shoulder", "upper_arm", Isometry3::identity(), Vector3::z_axis()))
            .with_joint(ChainJoint::revolute("elbow", "forearm", offset(l1, 0.0, 0.0), Vector3::z_axis()))
            .with_joint(ChainJoint::fixed("tool_mount", "tool", offset(l2, 0.0, 0.0)))
    }

    /// Three links in the XY plane, all joints rotate around Z. Can reach a planar position
    /// with the planar heading.
    /// Joints: "shoulder", "elbow", "wrist"; frames: "base", "upper_arm", "forearm", "hand", "tool".
    pub fn planar_three_link(l1: f64, l2: f64, l3: f64) -> Self {
        SerialChain::new("base")
            .with_joint(ChainJoint::revolute("shoulder", "upper_arm", Isometry3::identity(), Vector3::z_axis()))
            .with_joint(ChainJoint::revolute("elbow", "forearm", offset(l1, 0.0, 0.0), Vector3::z_axis()))
            .with_joint(ChainJoint::revolute("wrist", "hand", offset(l2, 0.0, 0.0), Vector3::z_axis()))
            .with_joint(ChainJoint::fixed("tool_mount", "tool", offset(l3, 0.0, 0.0)))
    }

    /// Six revolute joints (yaw, pitch, pitch, roll, pitch, roll), pointing straight
    /// up at the neutral configuration. End effector frame is "end_effector".
    pub fn six_dof_arm() -> Self {
        SerialChain::new("base")
            .with_joint(ChainJoint::revolute("j1_base_yaw", "shoulder_link", offset(0.0, 0.0, 0.05), Vector3::z_axis()))
            .with_joint(ChainJoint::revolute("j2_shoulder_pitch", "upper_arm", offset(0.0, 0.0, 0.2), Vector3::y_axis()))
            .with_joint(ChainJoint::revolute("j3_elbow_pitch", "elbow_link", offset(0.0, 0.0, 0.3), Vector3::y_axis()))
            .with_joint(ChainJoint::revolute("j4_forearm_roll", "forearm", offset(0.0, 0.0, 0.1), Vector3::z_axis()))
            .with_joint(ChainJoint::revolute("j5_wrist_pitch", "wrist_link", offset(0.0, 0.0, 0.2), Vector3::y_axis()))
            .with_joint(ChainJoint::revolute("j6_wrist_roll", "flange", offset(0.0, 0.0, 0.06), Vector3::z_axis()))
            .with_joint(ChainJoint::fixed("tool_mount", "end_effector", offset(0.0, 0.0, 0.05)))
    }

    /// Names of the movable joints, in the order of the configuration vector.
    pub fn movable_joint_names(&self) -> Vec<&str> {
        self.joints().iter()
            .filter(|joint| joint.joint_type.is_movable())
            .map(|joint| joint.name.as_str())
            .collect()
    }
}
