//! Configuration options for the MCCFR blueprint solver.
//!
//! This module provides configuration structs that control sampling,
//! weighting, discounting and pruning, plus the statistics a training run
//! reports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the MCCFR solver.
///
/// This struct controls:
/// - Exploration used when sampling the traverser's own actions
/// - Linear weighting and periodic (DCFR-style) discounting
/// - Regret-based pruning of clearly dominated branches
///
/// # Example
/// ```
/// use blueprint_resolver::cfr::CFRConfig;
///
/// let config = CFRConfig::default();
/// assert_eq!(config.exploration, 0.6);
/// assert!(config.use_linear_cfr);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CFRConfig {
    /// Floor all regrets at zero at every discount step (CFR+).
    ///
    /// Disabled by default: pruning relies on regrets going negative.
    pub use_cfr_plus: bool,

    /// Weight updates by the iteration number (linear CFR).
    pub use_linear_cfr: bool,

    /// Probability of sampling uniformly at the traverser's own nodes.
    ///
    /// The remaining mass follows the current regret-matching strategy.
    pub exploration: f64,

    /// Enable regret-based pruning at opponent nodes.
    pub enable_pruning: bool,

    /// Chance of skipping a prunable branch.
    pub pruning_probability: f64,

    /// A node is prunable when every action's regret is below this value.
    pub prune_threshold: f64,

    /// Iterations to run before pruning is allowed.
    pub pruning_warmup: u64,

    /// Iterations between discount steps.
    pub discount_interval: u64,

    /// Stop discounting after this many iterations. `None` never stops.
    pub discount_stop: Option<u64>,

    /// Fixed regret discount factor per step.
    ///
    /// `None` uses the linear schedule `k / (k + 1)` where `k` is the number
    /// of completed discount intervals.
    pub regret_discount: Option<f64>,

    /// Fixed strategy-sum discount factor per step. `None` uses the linear
    /// schedule.
    pub strategy_discount: Option<f64>,

    /// Write versioned, street-segmented infoset keys.
    pub versioned_keys: bool,

    /// Random seed for reproducibility.
    ///
    /// With a seed, two runs of the same length produce identical tables.
    /// If `None`, a random seed is drawn.
    pub seed: Option<u64>,
}

impl Default for CFRConfig {
    fn default() -> Self {
        Self {
            use_cfr_plus: false,
            use_linear_cfr: true,
            exploration: 0.6,
            enable_pruning: true,
            pruning_probability: 0.95,
            prune_threshold: -2_000.0,
            pruning_warmup: 1_000,
            discount_interval: 1_000,
            discount_stop: Some(400_000),
            regret_discount: None,
            strategy_discount: None,
            versioned_keys: true,
            seed: None,
        }
    }
}

impl CFRConfig {
    /// Create a new CFRConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for quick smoke runs and tests: no pruning, frequent
    /// discounting, fixed seed.
    pub fn fast() -> Self {
        Self {
            enable_pruning: false,
            discount_interval: 100,
            discount_stop: None,
            seed: Some(0),
            ..Default::default()
        }
    }

    /// Builder method: set whether to use CFR+.
    pub fn with_cfr_plus(mut self, enable: bool) -> Self {
        self.use_cfr_plus = enable;
        self
    }

    /// Builder method: set whether to use linear weighting.
    pub fn with_linear_cfr(mut self, enable: bool) -> Self {
        self.use_linear_cfr = enable;
        self
    }

    /// Builder method: set exploration probability.
    pub fn with_exploration(mut self, exploration: f64) -> Self {
        self.exploration = exploration.clamp(0.0, 1.0);
        self
    }

    /// Builder method: enable or disable pruning.
    pub fn with_pruning(mut self, enable: bool) -> Self {
        self.enable_pruning = enable;
        self
    }

    /// Builder method: set the discount interval.
    pub fn with_discount_interval(mut self, interval: u64) -> Self {
        self.discount_interval = interval;
        self
    }

    /// Builder method: set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Discount factors to apply after `iteration`, if a step is due.
    ///
    /// Returns `(regret_factor, strategy_factor)`.
    pub fn discount_due(&self, iteration: u64) -> Option<(f64, f64)> {
        if self.discount_interval == 0 || iteration == 0 || iteration % self.discount_interval != 0
        {
            return None;
        }
        if self.discount_stop.is_some_and(|stop| iteration > stop) {
            return None;
        }
        let k = (iteration / self.discount_interval) as f64;
        let linear = k / (k + 1.0);
        Some((
            self.regret_discount.unwrap_or(linear),
            self.strategy_discount.unwrap_or(linear),
        ))
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.exploration) {
            return Err(ConfigError::InvalidExploration(self.exploration));
        }
        if !(0.0..=1.0).contains(&self.pruning_probability) {
            return Err(ConfigError::InvalidProbability(
                "pruning_probability",
                self.pruning_probability,
            ));
        }
        if !self.prune_threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "training.prune_threshold",
                reason: "must be finite".to_string(),
            });
        }
        if self.discount_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "training.discount_interval",
                reason: "must be positive".to_string(),
            });
        }
        for (name, discount) in [
            ("regret", self.regret_discount),
            ("strategy", self.strategy_discount),
        ] {
            if let Some(d) = discount {
                if !(d > 0.0 && d <= 2.0) {
                    return Err(ConfigError::InvalidDiscount(name, d));
                }
            }
        }
        Ok(())
    }
}

/// Errors raised by configuration loading and validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Exploration probability is out of range [0, 1].
    #[error("exploration probability {0} is out of range [0, 1]")]
    InvalidExploration(f64),
    /// A probability is out of range [0, 1].
    #[error("{0} {1} is out of range [0, 1]")]
    InvalidProbability(&'static str, f64),
    /// Discount factor is out of range (0, 2].
    #[error("{0} discount {1} is out of range (0, 2]")]
    InvalidDiscount(&'static str, f64),
    /// Any other rejected value.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Dotted settings path.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The settings file could not be read.
    #[error("IO error: {0}")]
    Io(String),
    /// The settings file is not valid JSON for the expected schema.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Statistics tracked during training.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CFRStats {
    /// Total number of iterations completed.
    pub iterations: u64,

    /// Number of unique information sets discovered.
    pub info_sets: usize,

    /// Total time spent training (in seconds), across resumes.
    pub elapsed_seconds: f64,

    /// Iterations per second.
    pub iterations_per_second: f64,

    /// Opponent branches skipped by pruning.
    pub pruned_branches: u64,

    /// Latest convergence indicator (if calculated).
    pub convergence: Option<f64>,

    /// History of convergence indicator measurements.
    pub convergence_history: Vec<ConvergencePoint>,
}

/// A single convergence measurement at a specific iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergencePoint {
    /// Iteration number when this measurement was taken.
    pub iteration: u64,
    /// Mean strategy drift since the previous snapshot, scaled by 100.
    pub indicator: f64,
}

impl CFRStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update iterations per second based on elapsed time.
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.iterations_per_second = self.iterations as f64 / self.elapsed_seconds;
        }
    }

    /// Record a convergence measurement.
    pub fn record_convergence(&mut self, iteration: u64, indicator: f64) {
        self.convergence = Some(indicator);
        self.convergence_history.push(ConvergencePoint {
            iteration,
            indicator,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = CFRConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pruning_probability, 0.95);
        assert!(CFRConfig::fast().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CFRConfig::default();
        config.exploration = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidExploration(1.5)));

        let config = CFRConfig {
            regret_discount: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDiscount("regret", _))
        ));

        let config = CFRConfig::default().with_discount_interval(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discount_schedule() {
        let config = CFRConfig::default()
            .with_discount_interval(10);
        assert_eq!(config.discount_due(5), None);
        assert_eq!(config.discount_due(10), Some((0.5, 0.5)));
        let (r, s) = config.discount_due(30).unwrap();
        assert!((r - 0.75).abs() < 1e-12 && (s - 0.75).abs() < 1e-12);

        let stopped = CFRConfig {
            discount_stop: Some(20),
            ..config
        };
        assert_eq!(stopped.discount_due(30), None);
    }

    #[test]
    fn test_stats_rate() {
        let mut stats = CFRStats::new();
        stats.iterations = 100;
        stats.elapsed_seconds = 4.0;
        stats.update_rate();
        assert_eq!(stats.iterations_per_second, 25.0);
        stats.record_convergence(100, 12.5);
        assert_eq!(stats.convergence, Some(12.5));
        assert_eq!(stats.convergence_history.len(), 1);
    }
}
