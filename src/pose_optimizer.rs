//! Position oriented IK that also searches for a good orientation.
//!
//! When the exact orientation is not important (or not reachable), the desired orientation
//! is perturbed by a small rotation vector `dr` and the IK is solved for every trial
//! orientation. The Cross-Entropy optimizer picks the `dr` that gives the lowest cost
//!
//! `position_weight * |p_desired - p_achieved| + orientation_weight * (1 - (q_achieved . q_desired)^2)`
//!
//! The squared dot product makes the orientation term indifferent to the sign of the quaternion.

extern crate nalgebra as na;

use std::f64::consts::PI;
use std::sync::Arc;
use na::{DVector, UnitQuaternion, Vector3};
use rand::Rng;
use tracing::{info, warn};
use crate::cem::{CemConfig, CrossEntropyOptimizer, Termination};
use crate::error::IkError;
use crate::kinematic_traits::{IkSolver, Joints};
use crate::se3::orientation_alignment;
use crate::utils::format_joints;

/// Configuration of the [StochasticPoseOptimizer]
#[derive(Debug, Clone)]
pub struct PoseOptimizerConfig {
    pub position_weight: f64,

    /// 0 (default) ignores the orientation in the cost. The search then only
    /// exists to help the position to converge.
    pub orientation_weight: f64,

    /// Search stops once the cost drops to this value
    pub position_tolerance: f64,

    /// Expected range of the orientation perturbation, per axis of the rotation vector (radians).
    /// The initial standard deviation of the search is half of it.
    pub orientation_error_range: Vector3<f64>,

    pub max_iterations: usize,
    pub num_samples: usize,
    pub num_top: usize,

    /// See [CemConfig::sigma_floor]
    pub sigma_floor: f64,

    /// See [CemConfig::num_threads]
    pub num_threads: Option<usize>,
}

impl Default for PoseOptimizerConfig {
    fn default() -> Self {
        PoseOptimizerConfig {
            position_weight: 1.0,
            orientation_weight: 0.0,
            position_tolerance: 0.005,
            orientation_error_range: Vector3::new(0.1, 0.1, PI / 2.0),
            max_iterations: 30,
            num_samples: 100,
            num_top: 10,
            sigma_floor: 0.0,
            num_threads: None,
        }
    }
}

impl PoseOptimizerConfig {
    /// Same orientation error range for all three axes.
    pub fn with_uniform_orientation_range(mut self, range: f64) -> Self {
        self.orientation_error_range = Vector3::from_element(range);
        self
    }

    fn cem_config(&self) -> CemConfig {
        CemConfig {
            max_iterations: self.max_iterations,
            num_samples: self.num_samples,
            num_top: self.num_top,
            cost_tolerance: self.position_tolerance,
            sigma0: DVector::from_column_slice((self.orientation_error_range / 2.0).as_slice()),
            sigma_floor: self.sigma_floor,
            num_threads: self.num_threads,
        }
    }
}

/// Best configuration found by [StochasticPoseOptimizer::compute_ik_opt]
#[derive(Debug, Clone)]
pub struct PoseOptimization {
    pub joints: Joints,
    pub cost: f64,

    /// Rotation vector applied to the desired orientation that produced `joints`
    pub orientation_offset: Vector3<f64>,

    /// Iterations of the Cross-Entropy optimizer
    pub iterations: usize,

    /// Final standard deviation of the search, small when the search has converged
    pub sigma: Vector3<f64>,

    pub termination: Termination,
}

pub struct StochasticPoseOptimizer {
    ik_solver: Arc<dyn IkSolver>,
    config: PoseOptimizerConfig,
    optimizer: CrossEntropyOptimizer,
}

impl StochasticPoseOptimizer {
    pub fn new(ik_solver: Arc<dyn IkSolver>, config: PoseOptimizerConfig) -> Result<Self, IkError> {
        let optimizer = CrossEntropyOptimizer::new(config.cem_config())?;
        Ok(StochasticPoseOptimizer {
            ik_solver,
            config,
            optimizer,
        })
    }

    pub fn config(&self) -> &PoseOptimizerConfig {
        &self.config
    }

    /// Cost and joints for the desired orientation perturbed by the rotation vector `dr`.
    pub fn evaluate(&self, position: &Vector3<f64>, orientation: &UnitQuaternion<f64>,
                    dr: &Vector3<f64>) -> Result<(f64, Joints), IkError> {
        let trial = UnitQuaternion::from_scaled_axis(*dr) * orientation;
        let solution = self.ik_solver.compute_ik(position, &trial, None, None)?;
        let (reached_position, reached_orientation) = self.ik_solver.compute_fk(&solution.joints)?;

        let position_cost = (position - reached_position).norm();
        let orientation_cost = 1.0 - orientation_alignment(&reached_orientation, orientation);
        let cost = self.config.position_weight * position_cost
            + self.config.orientation_weight * orientation_cost;
        Ok((cost, solution.joints))
    }

    /// Solves the IK for the position, searching the orientation around the given one.
    /// Randomness comes from `rng` only, so a seeded generator gives reproducible results.
    pub fn compute_ik_opt<R: Rng + ?Sized>(&self, rng: &mut R, position: &Vector3<f64>,
                                           orientation: &UnitQuaternion<f64>) -> Result<PoseOptimization, IkError> {
        let cost_fn = |x: &DVector<f64>| {
            let dr = Vector3::new(x[0], x[1], x[2]);
            match self.evaluate(position, orientation, &dr) {
                Ok((cost, joints)) => (cost, Some((joints, dr))),
                Err(err) => {
                    warn!("IK failed for orientation offset {:?}: {}", dr.as_slice(), err);
                    (f64::INFINITY, None)
                }
            }
        };

        let result = self.optimizer.optimize(rng, cost_fn, &DVector::zeros(3))?;
        let (joints, orientation_offset) = result.payload
            .ok_or_else(|| IkError::BackendError("IK failed for every sampled orientation".to_string()))?;

        let (reached_position, reached_orientation) = self.ik_solver.compute_fk(&joints)?;
        info!("After IK optimization, cost: {:.6}, reached {:?} {:?} vs desired {:?} {:?}, joints {}",
            result.cost, reached_position.as_slice(), reached_orientation.coords.as_slice(),
            position.as_slice(), orientation.coords.as_slice(), format_joints(&joints));

        Ok(PoseOptimization {
            joints,
            cost: result.cost,
            orientation_offset,
            iterations: result.iterations,
            sigma: Vector3::new(result.sigma[0], result.sigma[1], result.sigma[2]),
            termination: result.termination,
        })
    }
}
