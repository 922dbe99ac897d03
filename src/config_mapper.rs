//! Maps between the controlled joint values and the full configuration of the model.

use crate::error::{check_dimension, IkError};
use crate::kinematic_traits::{Configuration, Joints, KinematicModel};

/// Joint name that reserves no place in the controlled joint values.
pub const IGNORE_JOINT: &str = "ignore";

/// Bijection between the controlled joint values (`Joints`) and the full model
/// configuration. The values of uncontrolled joints come from the neutral configuration.
#[derive(Debug, Clone)]
pub struct ConfigurationMapper {
    neutral: Configuration,

    /// Configuration index of each controlled joint, in the controlled order
    q_indices: Vec<usize>,

    /// Velocity index of each controlled joint, in the controlled order
    v_indices: Vec<usize>,

    names: Vec<String>,
}

impl ConfigurationMapper {
    /// Creates the mapper for the named joints. Names equal to [IGNORE_JOINT] are skipped.
    pub fn new(model: &dyn KinematicModel, controlled_joints: &[&str]) -> Result<Self, IkError> {
        let mut q_indices = Vec::with_capacity(controlled_joints.len());
        let mut v_indices = Vec::with_capacity(controlled_joints.len());
        let mut names = Vec::with_capacity(controlled_joints.len());
        for &name in controlled_joints.iter().filter(|&&name| name != IGNORE_JOINT) {
            let q_index = model.joint_offset(name)
                .ok_or_else(|| IkError::UnknownJoint(name.to_string()))?;
            let v_index = model.joint_velocity_offset(name)
                .ok_or_else(|| IkError::UnknownJoint(name.to_string()))?;
            q_indices.push(q_index);
            v_indices.push(v_index);
            names.push(name.to_string());
        }
        Ok(ConfigurationMapper {
            neutral: model.neutral_configuration(),
            q_indices,
            v_indices,
            names,
        })
    }

    /// Number of controlled joints
    pub fn dof(&self) -> usize {
        self.q_indices.len()
    }

    pub fn joint_names(&self) -> &[String] {
        &self.names
    }

    pub fn neutral(&self) -> &Configuration {
        &self.neutral
    }

    /// Velocity indices of the controlled joints, used to select the Jacobian columns.
    pub fn velocity_indices(&self) -> &[usize] {
        &self.v_indices
    }

    /// Full configuration: neutral, with controlled joints overwritten.
    pub fn to_full(&self, joints: &[f64]) -> Result<Configuration, IkError> {
        check_dimension("controlled joints", self.dof(), joints.len())?;
        let mut q = self.neutral.clone();
        for (&index, &value) in self.q_indices.iter().zip(joints) {
            q[index] = value;
        }
        Ok(q)
    }

    /// Controlled joint values read from the full configuration.
    pub fn to_reduced(&self, q: &Configuration) -> Result<Joints, IkError> {
        check_dimension("configuration", self.neutral.len(), q.len())?;
        Ok(self.q_indices.iter().map(|&index| q[index]).collect())
    }
}
