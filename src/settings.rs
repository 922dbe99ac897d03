//! Settings of the IK solver and the pose optimizer, with YAML support (optional)

use std::sync::Arc;
use crate::dls_solver::{DifferentialIkSolver, DlsConfig, IkTask};
use crate::error::IkError;
use crate::kinematic_traits::{IkSolver, KinematicModel};
use crate::pose_optimizer::{PoseOptimizerConfig, StochasticPoseOptimizer};

/// All tunable numbers of the solver stack.
#[derive(Debug, Clone, Default)]
pub struct SolverSettings {
    pub ik: DlsConfig,
    pub optimizer: PoseOptimizerConfig,
}

impl SolverSettings {
    /// Differential IK solver for the given model, end effector frame and controlled joints.
    pub fn ik_solver(&self, model: Arc<dyn KinematicModel>, end_effector: &str,
                     controlled_joints: &[&str]) -> Result<DifferentialIkSolver, IkError> {
        DifferentialIkSolver::new(model, end_effector, controlled_joints, self.ik)
    }

    /// Pose optimizer running on top of the differential IK solver.
    pub fn pose_optimizer(&self, model: Arc<dyn KinematicModel>, end_effector: &str,
                          controlled_joints: &[&str]) -> Result<StochasticPoseOptimizer, IkError> {
        let solver: Arc<dyn IkSolver> = Arc::new(self.ik_solver(model, end_effector, controlled_joints)?);
        StochasticPoseOptimizer::new(solver, self.optimizer.clone())
    }

    /// Produces the YAML that [SolverSettings::from_yaml_str] reads back.
    pub fn to_yaml(&self) -> String {
        let ik = &self.ik;
        let opt = &self.optimizer;
        let range = &opt.orientation_error_range;
        let threads = match opt.num_threads {
            Some(threads) => format!("  num_threads: {}\n", threads),
            None => String::new(),
        };
        format!(
            "ik:\n  \
              epsilon: {:?}\n  \
              damping: {:?}\n  \
              step_size: {:?}\n  \
              max_iterations: {}\n  \
              task: {}\n\
            optimizer:\n  \
              position_weight: {:?}\n  \
              orientation_weight: {:?}\n  \
              position_tolerance: {:?}\n  \
              orientation_error_range: [{:?}, {:?}, {:?}]\n  \
              max_iterations: {}\n  \
              num_samples: {}\n  \
              num_top: {}\n  \
              sigma_floor: {:?}\n\
            {}",
            ik.epsilon,
            ik.damping,
            ik.step_size,
            ik.max_iterations,
            task_name(ik.task),
            opt.position_weight,
            opt.orientation_weight,
            opt.position_tolerance,
            range.x, range.y, range.z,
            opt.max_iterations,
            opt.num_samples,
            opt.num_top,
            opt.sigma_floor,
            threads
        )
    }
}

fn task_name(task: IkTask) -> &'static str {
    match task {
        IkTask::Pose => "pose",
        IkTask::Position => "position",
    }
}

#[cfg(feature = "allow_filesystem")]
mod yaml {
    use std::path::Path;
    use anyhow::Context;
    use nalgebra::Vector3;
    use yaml_rust2::{Yaml, YamlLoader};
    use crate::dls_solver::IkTask;
    use crate::error::IkError;
    use super::SolverSettings;

    impl SolverSettings {
        /// Reads the settings from YAML like this:
        /// ```yaml
        /// ik:
        ///   epsilon: 0.0001
        ///   damping: 1e-12
        ///   step_size: 0.1
        ///   max_iterations: 100
        ///   task: pose          # or position
        /// optimizer:
        ///   position_weight: 1.0
        ///   orientation_weight: 0.0
        ///   position_tolerance: 0.005
        ///   orientation_error_range: [0.1, 0.1, 1.5708]   # or a single number for all axes
        ///   max_iterations: 30
        ///   num_samples: 100
        ///   num_top: 10
        ///   sigma_floor: 0.0
        ///   num_threads: 4
        /// ```
        /// Every key is optional, missing ones keep the default value.
        pub fn from_yaml_str(yaml: &str) -> Result<Self, IkError> {
            let docs = YamlLoader::load_from_str(yaml)
                .map_err(|e| IkError::ParseError(format!("{}", e)))?;
            let mut settings = SolverSettings::default();
            let Some(doc) = docs.first() else {
                return Ok(settings);
            };

            let ik = &doc["ik"];
            if let Some(v) = read_f64(ik, "epsilon")? { settings.ik.epsilon = v; }
            if let Some(v) = read_f64(ik, "damping")? { settings.ik.damping = v; }
            if let Some(v) = read_f64(ik, "step_size")? { settings.ik.step_size = v; }
            if let Some(v) = read_usize(ik, "max_iterations")? { settings.ik.max_iterations = v; }
            match &ik["task"] {
                Yaml::BadValue | Yaml::Null => {}
                Yaml::String(task) => settings.ik.task = parse_task(task)?,
                other => return Err(IkError::ParseError(format!("task must be a string, got {:?}", other))),
            }

            let opt = &doc["optimizer"];
            let config = &mut settings.optimizer;
            if let Some(v) = read_f64(opt, "position_weight")? { config.position_weight = v; }
            if let Some(v) = read_f64(opt, "orientation_weight")? { config.orientation_weight = v; }
            if let Some(v) = read_f64(opt, "position_tolerance")? { config.position_tolerance = v; }
            if let Some(v) = read_range(opt, "orientation_error_range")? { config.orientation_error_range = v; }
            if let Some(v) = read_usize(opt, "max_iterations")? { config.max_iterations = v; }
            if let Some(v) = read_usize(opt, "num_samples")? { config.num_samples = v; }
            if let Some(v) = read_usize(opt, "num_top")? { config.num_top = v; }
            if let Some(v) = read_f64(opt, "sigma_floor")? { config.sigma_floor = v; }
            if let Some(v) = read_usize(opt, "num_threads")? { config.num_threads = Some(v); }

            Ok(settings)
        }

        /// Reads the settings from the YAML file, see [SolverSettings::from_yaml_str].
        pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
            let path = path.as_ref();
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read solver settings from {}", path.display()))?;
            let settings = Self::from_yaml_str(&contents)
                .with_context(|| format!("Invalid solver settings in {}", path.display()))?;
            Ok(settings)
        }
    }

    fn parse_task(task: &str) -> Result<IkTask, IkError> {
        match task.to_lowercase().as_str() {
            "pose" => Ok(IkTask::Pose),
            "position" => Ok(IkTask::Position),
            _ => Err(IkError::ParseError(format!("unknown IK task '{}', expected pose or position", task))),
        }
    }

    fn as_number(value: &Yaml) -> Option<f64> {
        value.as_f64().or_else(|| value.as_i64().map(|i| i as f64))
    }

    fn read_f64(section: &Yaml, key: &str) -> Result<Option<f64>, IkError> {
        match &section[key] {
            Yaml::BadValue | Yaml::Null => Ok(None),
            value => as_number(value)
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| IkError::ParseError(format!("{} must be a finite number, got {:?}", key, value))),
        }
    }

    fn read_usize(section: &Yaml, key: &str) -> Result<Option<usize>, IkError> {
        match &section[key] {
            Yaml::BadValue | Yaml::Null => Ok(None),
            value => value.as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| IkError::ParseError(format!("{} must be a non negative integer, got {:?}", key, value))),
        }
    }

    fn read_range(section: &Yaml, key: &str) -> Result<Option<Vector3<f64>>, IkError> {
        match &section[key] {
            Yaml::BadValue | Yaml::Null => Ok(None),
            Yaml::Array(items) => {
                let values: Option<Vec<f64>> = items.iter().map(as_number).collect();
                match values {
                    Some(v) if v.len() == 3 => Ok(Some(Vector3::new(v[0], v[1], v[2]))),
                    _ => Err(IkError::ParseError(format!("{} must have 3 numbers", key))),
                }
            }
            value => as_number(value)
                .map(|v| Some(Vector3::from_element(v)))
                .ok_or_else(|| IkError::ParseError(format!("{} must be a number or a list of 3, got {:?}", key, value))),
        }
    }
}
