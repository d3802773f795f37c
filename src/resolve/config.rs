//! Resolver configuration.

use serde::{Deserialize, Serialize};

use super::leaf::{LeafEstimate, LeafPolicy};
use crate::cards::Street;
use crate::cfr::ConfigError;

/// Acceptance rule for external leaf estimates.
///
/// Estimates for subgames rooted preflop are always rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafGate {
    /// Widest acceptable prediction interval, in big blinds.
    pub max_interval_width: f64,
    /// Largest acceptable absolute value, in big blinds.
    pub max_abs_value: f64,
    /// Accept estimates for a player who is out of position at the leaf.
    pub allow_out_of_position: bool,
}

impl Default for LeafGate {
    fn default() -> Self {
        Self {
            max_interval_width: 4.0,
            max_abs_value: 500.0,
            allow_out_of_position: true,
        }
    }
}

impl LeafGate {
    /// Whether `estimate` may replace the blueprint value.
    pub fn accepts(&self, estimate: &LeafEstimate, root_street: Street, in_position: bool) -> bool {
        if root_street == Street::Preflop {
            return false;
        }
        if !in_position && !self.allow_out_of_position {
            return false;
        }
        estimate.is_finite()
            && estimate.width() <= self.max_interval_width
            && estimate.value.abs() <= self.max_abs_value
    }
}

/// Configuration for [`SubgameResolver`](super::SubgameResolver).
///
/// # Example
/// ```
/// use blueprint_resolver::resolve::ResolverConfig;
///
/// let config = ResolverConfig::default();
/// assert_eq!(config.time_limit_ms, 80);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Iterations always run, even past the deadline.
    pub min_iterations: u64,
    /// Hard iteration cap.
    pub max_iterations: u64,
    /// Wall-clock budget after `min_iterations`.
    pub time_limit_ms: u64,
    /// Betting rounds inside the subgame, counting the root's.
    pub streets_covered: usize,
    /// Root regrets are seeded with `blueprint probability * strength`.
    pub warm_start_strength: f64,
    /// Weight of the `KL(current || blueprint)` penalty.
    pub kl_weight: f64,
    /// Uniform exploration at the traverser's nodes.
    pub exploration: f64,
    /// Weight updates by iteration number.
    pub use_linear_cfr: bool,
    /// Independent solves over sampled next-street cards. Ignored on the river.
    pub samples_per_solve: usize,
    /// Continuation policies used at leaves, one solve each.
    pub leaf_policies: Vec<LeafPolicy>,
    /// Multiplier applied by biased leaf policies.
    pub rollout_bias: f64,
    /// Solve from the start of the current betting round with the hero's
    /// earlier actions this round frozen.
    pub round_start: bool,
    /// Run independent solves on the rayon pool.
    pub parallel: bool,
    /// Leaf estimate acceptance.
    pub leaf_gate: LeafGate,
    /// Random seed. `None` draws one per resolve.
    pub seed: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_iterations: 100,
            max_iterations: 10_000,
            time_limit_ms: 80,
            streets_covered: 1,
            warm_start_strength: 10.0,
            kl_weight: 0.5,
            exploration: 0.6,
            use_linear_cfr: true,
            samples_per_solve: 1,
            leaf_policies: vec![LeafPolicy::Blueprint],
            rollout_bias: 5.0,
            round_start: false,
            parallel: true,
            leaf_gate: LeafGate::default(),
            seed: None,
        }
    }
}

impl ResolverConfig {
    /// Builder method: set iteration bounds.
    pub fn with_iterations(mut self, min: u64, max: u64) -> Self {
        self.min_iterations = min;
        self.max_iterations = max;
        self
    }

    /// Builder method: set the time limit.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Builder method: set the number of sampled boards.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples_per_solve = samples;
        self
    }

    /// Builder method: set leaf policies.
    pub fn with_leaf_policies(mut self, policies: Vec<LeafPolicy>) -> Self {
        self.leaf_policies = policies;
        self
    }

    /// Builder method: enable round-start resolving.
    pub fn with_round_start(mut self, enable: bool) -> Self {
        self.round_start = enable;
        self
    }

    /// Builder method: set the KL weight.
    pub fn with_kl_weight(mut self, weight: f64) -> Self {
        self.kl_weight = weight;
        self
    }

    /// Builder method: set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::InvalidValue {
                field,
                reason: reason.to_string(),
            })
        };
        if self.max_iterations == 0 {
            return invalid("resolver.max_iterations", "must be positive");
        }
        if self.min_iterations > self.max_iterations {
            return invalid("resolver.min_iterations", "exceeds max_iterations");
        }
        if self.time_limit_ms == 0 {
            return invalid("resolver.time_limit_ms", "must be positive");
        }
        if self.streets_covered == 0 {
            return invalid("resolver.streets_covered", "must be at least 1");
        }
        if !(self.warm_start_strength >= 0.0 && self.warm_start_strength.is_finite()) {
            return invalid("resolver.warm_start_strength", "must be finite and non-negative");
        }
        if !(self.kl_weight >= 0.0 && self.kl_weight.is_finite()) {
            return invalid("resolver.kl_weight", "must be finite and non-negative");
        }
        if !(0.0..=1.0).contains(&self.exploration) {
            return Err(ConfigError::InvalidExploration(self.exploration));
        }
        if self.samples_per_solve == 0 {
            return invalid("resolver.samples_per_solve", "must be at least 1");
        }
        if self.leaf_policies.is_empty() {
            return invalid("resolver.leaf_policies", "must not be empty");
        }
        if !(self.rollout_bias >= 1.0 && self.rollout_bias.is_finite()) {
            return invalid("resolver.rollout_bias", "must be finite and at least 1");
        }
        if !(self.leaf_gate.max_interval_width >= 0.0) {
            return invalid("resolver.leaf_gate.max_interval_width", "must be non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_rejects_preflop_and_wide_intervals() {
        let gate = LeafGate::default();
        let tight = LeafEstimate::new(3.0, 2.0, 4.0);
        assert!(gate.accepts(&tight, Street::Flop, true));
        assert!(!gate.accepts(&tight, Street::Preflop, true));

        let wide = LeafEstimate::new(3.0, -5.0, 11.0);
        assert!(!gate.accepts(&wide, Street::Turn, true));

        let strict = LeafGate {
            allow_out_of_position: false,
            ..LeafGate::default()
        };
        assert!(!strict.accepts(&tight, Street::Flop, false));
        assert!(!gate.accepts(&LeafEstimate::new(f64::NAN, 0.0, 0.0), Street::Flop, true));
    }

    #[test]
    fn test_validate() {
        assert!(ResolverConfig::default().validate().is_ok());
        assert!(ResolverConfig::default()
            .with_iterations(10, 5)
            .validate()
            .is_err());
        assert!(ResolverConfig::default()
            .with_leaf_policies(Vec::new())
            .validate()
            .is_err());
        assert!(ResolverConfig::default().with_samples(0).validate().is_err());
    }
}
