//! Cross-Entropy Method: derivative free minimizer that repeatedly refits a diagonal
//! Gaussian to the best ("elite") samples of the previous population.

extern crate nalgebra as na;

use na::DVector;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;
use crate::error::{check_dimension, IkError};

/// Hyperparameters of the Cross-Entropy optimizer.
#[derive(Debug, Clone)]
pub struct CemConfig {
    /// Maximal number of sampling rounds
    pub max_iterations: usize,

    /// Samples drawn per round
    pub num_samples: usize,

    /// Samples used to refit the distribution, 1 <= num_top <= num_samples
    pub num_top: usize,

    /// Stop once the best cost is at or below this value. Also stops once every
    /// standard deviation component is at or below tenth of it.
    pub cost_tolerance: f64,

    /// Initial standard deviation, one entry per dimension of the search space
    pub sigma0: DVector<f64>,

    /// Lower bound of every standard deviation component after refitting. With 0 (the default)
    /// a degenerate elite set collapses the distribution, that then stops the search.
    pub sigma_floor: f64,

    /// Threads of a dedicated pool for the cost evaluations. None uses the global rayon pool.
    pub num_threads: Option<usize>,
}

impl CemConfig {
    pub fn new(sigma0: DVector<f64>) -> Self {
        CemConfig {
            max_iterations: 30,
            num_samples: 100,
            num_top: 10,
            cost_tolerance: 1e-3,
            sigma0,
            sigma_floor: 0.0,
            num_threads: None,
        }
    }
}

/// Why the optimization stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    MaxIterations,
    CostTolerance,
    SigmaConverged,
}

/// Outcome of [CrossEntropyOptimizer::optimize]
#[derive(Debug, Clone)]
pub struct CemResult<P> {
    /// Lowest cost seen over all iterations
    pub cost: f64,

    /// Payload returned by the cost function together with that cost
    pub payload: P,

    /// Sampling rounds done
    pub iterations: usize,

    /// Standard deviation of the distribution at termination
    pub sigma: DVector<f64>,

    /// Mean of the distribution at termination
    pub mean: DVector<f64>,

    pub termination: Termination,

    /// Best cost seen so far, recorded after every iteration. Never increases.
    pub best_cost_history: Vec<f64>,
}

pub struct CrossEntropyOptimizer {
    config: CemConfig,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl CrossEntropyOptimizer {
    pub fn new(config: CemConfig) -> Result<Self, IkError> {
        if config.max_iterations < 1 {
            return Err(IkError::InvalidParameter("max_iterations must be at least 1".to_string()));
        }
        if config.num_samples < 1 {
            return Err(IkError::InvalidParameter("num_samples must be at least 1".to_string()));
        }
        if config.num_top < 1 || config.num_top > config.num_samples {
            return Err(IkError::InvalidParameter(format!(
                "num_top must be between 1 and num_samples ({}), got {}",
                config.num_samples, config.num_top)));
        }
        if !config.sigma0.iter().all(|s| s.is_finite() && *s >= 0.0) {
            return Err(IkError::InvalidParameter("sigma0 must be finite and non negative".to_string()));
        }
        if !(config.sigma_floor.is_finite() && config.sigma_floor >= 0.0) {
            return Err(IkError::InvalidParameter("sigma_floor must be finite and non negative".to_string()));
        }

        #[cfg(feature = "parallel")]
        let pool = match config.num_threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| IkError::ThreadPoolError(e.to_string()))?),
            None => None,
        };

        Ok(CrossEntropyOptimizer {
            config,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn config(&self) -> &CemConfig {
        &self.config
    }

    /// Minimizes `cost_fn` starting from the mean `x0` and the configured `sigma0`.
    /// `cost_fn` returns the cost and a payload that is handed back for the best sample.
    /// Evaluations are independent and may run in parallel; all randomness comes from `rng`.
    pub fn optimize<P, F, R>(&self, rng: &mut R, cost_fn: F, x0: &DVector<f64>) -> Result<CemResult<P>, IkError>
    where
        P: Send,
        F: Fn(&DVector<f64>) -> (f64, P) + Sync,
        R: Rng + ?Sized,
    {
        check_dimension("x0 (sigma0 length)", self.config.sigma0.len(), x0.len())?;

        let config = &self.config;
        let sigma_threshold = config.cost_tolerance / 10.0;
        let mut mean = x0.clone();
        let mut sigma = config.sigma0.clone();
        let mut best: Option<(f64, P)> = None;
        let mut history = Vec::with_capacity(config.max_iterations);
        let mut iterations = 0;

        let termination = loop {
            let samples: Vec<DVector<f64>> = (0..config.num_samples)
                .map(|_| self.draw(&mut *rng, &mean, &sigma))
                .collect();
            let mut evaluated = self.evaluate(&samples, &cost_fn);

            // NaN costs go last
            let key = |cost: f64| if cost.is_nan() { f64::INFINITY } else { cost };
            let mut order: Vec<usize> = (0..samples.len()).collect();
            order.sort_by(|&a, &b| key(evaluated[a].0).total_cmp(&key(evaluated[b].0)));

            let elite: Vec<&DVector<f64>> = order[..config.num_top].iter().map(|&i| &samples[i]).collect();
            let candidate = evaluated.swap_remove(order[0]);
            best = match best {
                Some(current) if key(candidate.0) >= key(current.0) => Some(current),
                _ => Some(candidate),
            };
            let best_cost = best.as_ref().map_or(f64::INFINITY, |(cost, _)| *cost);
            history.push(best_cost);
            iterations += 1;

            debug!("CEM iteration {}: best cost {:.6}, sigma {:?}",
                iterations, best_cost, sigma.as_slice());

            if best_cost <= config.cost_tolerance {
                break Termination::CostTolerance;
            }
            if sigma.iter().all(|s| *s <= sigma_threshold) {
                break Termination::SigmaConverged;
            }
            if iterations >= config.max_iterations {
                break Termination::MaxIterations;
            }

            let (elite_mean, elite_sigma) = elite_statistics(&elite);
            mean = elite_mean;
            sigma = elite_sigma.map(|s| s.max(config.sigma_floor));

            if sigma.iter().all(|s| *s <= sigma_threshold) {
                break Termination::SigmaConverged;
            }
        };

        let (cost, payload) = best
            .ok_or_else(|| IkError::InvalidParameter("no samples were evaluated".to_string()))?;
        Ok(CemResult {
            cost,
            payload,
            iterations,
            sigma,
            mean,
            termination,
            best_cost_history: history,
        })
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R, mean: &DVector<f64>, sigma: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(mean.len(), |i, _| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            mean[i] + sigma[i] * z
        })
    }

    fn evaluate<P, F>(&self, samples: &[DVector<f64>], cost_fn: &F) -> Vec<(f64, P)>
    where
        P: Send,
        F: Fn(&DVector<f64>) -> (f64, P) + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            let run = || -> Vec<(f64, P)> { samples.par_iter().map(|x| cost_fn(x)).collect() };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            samples.iter().map(|x| cost_fn(x)).collect()
        }
    }
}

/// Mean and population standard deviation (ddof = 0) of the elite samples, per dimension.
fn elite_statistics(elite: &[&DVector<f64>]) -> (DVector<f64>, DVector<f64>) {
    let n = elite.len() as f64;
    let dim = elite.first().map_or(0, |x| x.len());
    let mut mean = DVector::zeros(dim);
    for x in elite {
        mean += *x;
    }
    mean /= n;
    let mut variance = DVector::zeros(dim);
    for x in elite {
        let d = *x - &mean;
        variance += d.component_mul(&d);
    }
    variance /= n;
    (mean, variance.map(f64::sqrt))
}
