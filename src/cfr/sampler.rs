//! Monte Carlo CFR with outcome sampling.
//!
//! Each iteration deals a hand and samples one trajectory per traverser:
//!
//! - At the traverser's nodes one action is drawn from the current strategy
//!   mixed with ε-uniform exploration. Regret is updated for every action
//!   with the importance-weighted estimate of the single sampled outcome.
//! - At other players' nodes one action is drawn on-policy. Clearly
//!   dominated branches may be skipped (pruned) before the river.
//! - Chance nodes reveal the board that was dealt with the hand.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, trace};

use crate::abstraction::{encode_infoset, ActionAbstraction, HandBucketer};
use crate::cards::{HoleCards, ShowdownEvaluator, Street};
use crate::cfr::blueprint::BlueprintPolicy;
use crate::cfr::config::{CFRConfig, CFRStats, ConfigError};
use crate::cfr::rng::{RngState, SolverRng};
use crate::cfr::storage::{RegretTracker, StrategySnapshot, TrackerError, TrackerState};
use crate::game::{Deal, HandState, Phase, TableRules};

/// Builds infoset keys for decision points.
#[derive(Clone)]
pub struct InfosetEncoder {
    bucketer: Arc<dyn HandBucketer>,
    versioned: bool,
}

impl InfosetEncoder {
    /// Encoder over `bucketer`, writing versioned keys when `versioned`.
    pub fn new(bucketer: Arc<dyn HandBucketer>, versioned: bool) -> Self {
        Self {
            bucketer,
            versioned,
        }
    }

    /// Key for `seat` holding `hole` at `state`.
    pub fn key(&self, state: &HandState, seat: usize, hole: &HoleCards) -> String {
        let bucket = self.bucketer.bucket(
            hole,
            state.board(),
            state.street(),
            state.pot(),
            state.stack(seat),
            state.is_in_position(seat),
        );
        let (key, _) = encode_infoset(bucket, state.street(), state.history(), self.versioned);
        key.to_string()
    }

    /// Fingerprint of the underlying bucketing.
    pub fn fingerprint(&self) -> String {
        self.bucketer.fingerprint()
    }

    /// The bucketer.
    pub fn bucketer(&self) -> &Arc<dyn HandBucketer> {
        &self.bucketer
    }
}

/// Sample an index according to a probability distribution.
///
/// Rounding leftovers fall to the last index with positive probability.
pub fn sample_index<R: Rng + ?Sized>(rng: &mut R, probs: &[f64]) -> usize {
    let r: f64 = rng.gen();
    let mut cumsum = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return i;
        }
    }
    probs.iter().rposition(|&p| p > 0.0).unwrap_or(0)
}

/// Mix `strategy` with uniform exploration of weight `epsilon`.
pub fn explore(strategy: &[f64], epsilon: f64) -> Vec<f64> {
    let uniform = 1.0 / strategy.len() as f64;
    strategy
        .iter()
        .map(|&p| epsilon * uniform + (1.0 - epsilon) * p)
        .collect()
}

/// Outcome-sampling values at a traverser node.
///
/// The sampled action's value is `utility / sample_prob`, every other action
/// is credited zero. Returns the node value `strategy[sampled] * v` and the
/// per-action regrets `v(a) - node_value`.
pub fn outcome_regrets(
    strategy: &[f64],
    sampled: usize,
    sample_prob: f64,
    utility: f64,
) -> (f64, Vec<f64>) {
    if sample_prob <= 0.0 {
        return (0.0, vec![0.0; strategy.len()]);
    }
    let sampled_value = utility / sample_prob;
    let node_value = strategy[sampled] * sampled_value;
    let regrets = (0..strategy.len())
        .map(|i| if i == sampled { sampled_value } else { 0.0 } - node_value)
        .collect();
    (node_value, regrets)
}

/// The MCCFR blueprint engine.
///
/// Owns its [`RegretTracker`] and RNG; independent instances share nothing.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use blueprint_resolver::abstraction::{ActionAbstraction, StrengthBucketer};
/// use blueprint_resolver::cards::RankEvaluator;
/// use blueprint_resolver::cfr::{CFRConfig, OutcomeSampler};
/// use blueprint_resolver::game::TableRules;
///
/// let mut sampler = OutcomeSampler::new(
///     TableRules::heads_up(20.0),
///     ActionAbstraction::single_size(1.0),
///     Arc::new(StrengthBucketer::default()),
///     Arc::new(RankEvaluator),
///     CFRConfig::fast(),
/// )
/// .unwrap();
/// sampler.train(10).unwrap();
/// assert!(sampler.tracker().num_info_sets() > 0);
/// ```
pub struct OutcomeSampler {
    rules: TableRules,
    abstraction: ActionAbstraction,
    encoder: InfosetEncoder,
    evaluator: Arc<dyn ShowdownEvaluator>,
    config: CFRConfig,
    root: HandState,
    tracker: RegretTracker,
    rng: SolverRng,
    iteration: u64,
    stats: CFRStats,
}

impl OutcomeSampler {
    /// Create a sampler. Every configuration section is validated.
    pub fn new(
        rules: TableRules,
        abstraction: ActionAbstraction,
        bucketer: Arc<dyn HandBucketer>,
        evaluator: Arc<dyn ShowdownEvaluator>,
        config: CFRConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        abstraction.validate()?;
        let root = HandState::new(&rules)?;
        for street in Street::ALL {
            if bucketer.num_buckets(street) == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "bucketing",
                    reason: format!("bucketer yields no buckets on {street}"),
                });
            }
        }
        Ok(Self {
            rng: SolverRng::from_optional_seed(config.seed),
            encoder: InfosetEncoder::new(bucketer, config.versioned_keys),
            rules,
            abstraction,
            evaluator,
            config,
            root,
            tracker: RegretTracker::new(),
            iteration: 0,
            stats: CFRStats::new(),
        })
    }

    /// Run a single iteration: one sampled trajectory per player, then a
    /// discount step if one is due.
    pub fn run_iteration(&mut self) -> Result<(), TrackerError> {
        self.iteration += 1;
        let n = self.rules.num_players;
        let root = self.root.clone();

        for traverser in 0..n {
            let Some(deal) = Deal::sample(n, &mut self.rng) else {
                continue;
            };
            self.traverse(&root, &deal, traverser, 1.0);
        }

        if let Some((regret_factor, strategy_factor)) = self.config.discount_due(self.iteration) {
            self.tracker.discount(regret_factor, strategy_factor)?;
            if self.config.use_cfr_plus {
                self.tracker.reset_regrets();
            }
            trace!(
                iteration = self.iteration,
                regret_factor,
                strategy_factor,
                "discount step"
            );
        }
        Ok(())
    }

    /// Train the solver for a specified number of iterations.
    pub fn train(&mut self, iterations: u64) -> Result<&CFRStats, TrackerError> {
        self.train_with_callback(iterations, 0, |_| {})
    }

    /// Train with a callback every `callback_interval` iterations (0 = never).
    pub fn train_with_callback<F>(
        &mut self,
        iterations: u64,
        callback_interval: u64,
        mut callback: F,
    ) -> Result<&CFRStats, TrackerError>
    where
        F: FnMut(&CFRStats),
    {
        let start_time = Instant::now();
        let base_elapsed = self.stats.elapsed_seconds;

        for i in 0..iterations {
            self.run_iteration()?;

            if callback_interval > 0 && (i + 1) % callback_interval == 0 {
                self.refresh_stats(base_elapsed + start_time.elapsed().as_secs_f64());
                callback(&self.stats);
            }
        }

        self.refresh_stats(base_elapsed + start_time.elapsed().as_secs_f64());
        debug!(
            iterations = self.iteration,
            info_sets = self.stats.info_sets,
            pruned = self.stats.pruned_branches,
            "training batch finished"
        );
        Ok(&self.stats)
    }

    fn refresh_stats(&mut self, elapsed: f64) {
        self.stats.iterations = self.iteration;
        self.stats.info_sets = self.tracker.num_info_sets();
        self.stats.elapsed_seconds = elapsed;
        self.stats.update_rate();
    }

    fn iteration_weight(&self) -> f64 {
        if self.config.use_linear_cfr {
            self.iteration as f64
        } else {
            1.0
        }
    }

    fn traverse(&mut self, state: &HandState, deal: &Deal, traverser: usize, reach: f64) -> f64 {
        match state.phase() {
            Phase::Terminal => {
                state.utilities(&deal.hands, &deal.board, self.evaluator.as_ref())[traverser]
            }
            Phase::Chance => {
                let mut next = state.clone();
                next.reveal(&deal.board);
                self.traverse(&next, deal, traverser, reach)
            }
            Phase::Decision(seat) => {
                let actions = state.legal_actions(&self.abstraction);
                if actions.is_empty() {
                    return 0.0;
                }
                let key = self.encoder.key(state, seat, &deal.hands[seat]);
                if seat == traverser {
                    self.traverse_player(state, deal, traverser, reach, &actions, &key)
                } else {
                    self.traverse_opponent(state, deal, traverser, reach, &actions, &key)
                }
            }
        }
    }

    fn traverse_player(
        &mut self,
        state: &HandState,
        deal: &Deal,
        traverser: usize,
        reach: f64,
        actions: &[crate::abstraction::AbstractAction],
        key: &str,
    ) -> f64 {
        let strategy = self.tracker.get_strategy(key, actions);
        let sampling = explore(&strategy, self.config.exploration);
        let a = sample_index(&mut self.rng, &sampling);

        let child = state.apply(actions[a]);
        let utility = self.traverse(&child, deal, traverser, reach * strategy[a]);

        let (node_value, regrets) = outcome_regrets(&strategy, a, sampling[a], utility);
        let weight = self.iteration_weight();
        self.tracker.update_regrets(key, actions, &regrets, weight);
        self.tracker.add_strategy(key, actions, &strategy, reach * weight);
        node_value
    }

    fn traverse_opponent(
        &mut self,
        state: &HandState,
        deal: &Deal,
        traverser: usize,
        reach: f64,
        actions: &[crate::abstraction::AbstractAction],
        key: &str,
    ) -> f64 {
        let prune_allowed = self.config.enable_pruning
            && state.street() != Street::River
            && self.iteration > self.config.pruning_warmup;
        if prune_allowed
            && self
                .tracker
                .should_prune(key, actions, self.config.prune_threshold)
            && self.rng.gen_bool(self.config.pruning_probability)
        {
            self.stats.pruned_branches += 1;
            return 0.0;
        }

        let strategy = self.tracker.get_strategy(key, actions);
        let a = sample_index(&mut self.rng, &strategy);
        let child = state.apply(actions[a]);
        self.traverse(&child, deal, traverser, reach)
    }

    /// Restore tracker, RNG and iteration count from a checkpoint.
    ///
    /// Without a saved RNG state the generator is reseeded from the config.
    pub fn restore(
        &mut self,
        tracker: TrackerState,
        rng: Option<&RngState>,
        iteration: u64,
    ) -> Result<(), TrackerError> {
        self.tracker.set_state(tracker)?;
        self.rng = match rng {
            Some(state) => SolverRng::from_state(state),
            None => SolverRng::from_optional_seed(self.config.seed),
        };
        self.iteration = iteration;
        self.stats.iterations = iteration;
        self.stats.info_sets = self.tracker.num_info_sets();
        Ok(())
    }

    /// Publish the current average strategy as a blueprint.
    pub fn blueprint(&self) -> BlueprintPolicy {
        BlueprintPolicy::from_tracker(&self.tracker, &self.encoder.fingerprint())
    }

    /// Take a snapshot of current average strategies for CI calculation.
    pub fn snapshot_strategies(&self) -> StrategySnapshot {
        self.tracker.snapshot_strategies()
    }

    /// Convergence indicator against a snapshot.
    pub fn calculate_ci(&self, snapshot: &StrategySnapshot) -> f64 {
        self.tracker.calculate_ci(snapshot)
    }

    /// Get the current iteration count.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Get training statistics.
    pub fn stats(&self) -> &CFRStats {
        &self.stats
    }

    /// Set the elapsed time carried over from earlier runs.
    pub fn set_elapsed_seconds(&mut self, elapsed: f64) {
        self.stats.elapsed_seconds = elapsed;
    }

    /// Continue counting from `iteration`, so linear weights and the
    /// discount schedule line up with an assigned iteration range.
    pub fn start_at(&mut self, iteration: u64) {
        self.iteration = iteration;
        self.stats.iterations = iteration;
    }

    /// Record a convergence indicator at the current iteration.
    pub fn record_convergence(&mut self, indicator: f64) {
        self.stats.record_convergence(self.iteration, indicator);
    }

    /// Get the regret tracker.
    pub fn tracker(&self) -> &RegretTracker {
        &self.tracker
    }

    /// Snapshot of the RNG.
    pub fn rng_state(&self) -> RngState {
        self.rng.state()
    }

    /// Get the configuration.
    pub fn config(&self) -> &CFRConfig {
        &self.config
    }

    /// Get the table rules.
    pub fn rules(&self) -> &TableRules {
        &self.rules
    }

    /// Get the action abstraction.
    pub fn abstraction(&self) -> &ActionAbstraction {
        &self.abstraction
    }

    /// Get the infoset encoder.
    pub fn encoder(&self) -> &InfosetEncoder {
        &self.encoder
    }

    /// Bucketing fingerprint stored in checkpoints.
    pub fn bucket_fingerprint(&self) -> String {
        self.encoder.fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::{InfosetKey, KeyFormat, StrengthBucketer};
    use crate::cards::RankEvaluator;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sampler(rules: TableRules, config: CFRConfig) -> OutcomeSampler {
        OutcomeSampler::new(
            rules,
            ActionAbstraction::single_size(1.0),
            Arc::new(StrengthBucketer::default()),
            Arc::new(RankEvaluator),
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_outcome_regrets() {
        let strategy = [0.25, 0.75];
        let (node, regrets) = outcome_regrets(&strategy, 1, 0.5, 2.0);
        // v(a*) = 4, node = 0.75 * 4 = 3
        assert_abs_diff_eq!(node, 3.0);
        assert_abs_diff_eq!(regrets[0], -3.0);
        assert_abs_diff_eq!(regrets[1], 1.0);
        let (node, regrets) = outcome_regrets(&strategy, 0, 0.0, 2.0);
        assert_eq!(node, 0.0);
        assert_eq!(regrets, vec![0.0, 0.0]);
    }

    #[test]
    fn test_explore_and_sample() {
        let mixed = explore(&[1.0, 0.0, 0.0, 0.0], 0.6);
        assert_abs_diff_eq!(mixed[0], 0.55);
        assert_abs_diff_eq!(mixed[1], 0.15);
        assert_abs_diff_eq!(mixed.iter().sum::<f64>(), 1.0);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(sample_index(&mut rng, &[0.0, 1.0, 0.0]), 1);
        }
    }

    #[test]
    fn test_same_seed_bit_identical_tables() {
        let config = CFRConfig::fast().with_seed(17).with_pruning(true);
        let mut a = sampler(TableRules::heads_up(20.0), config.clone());
        let mut b = sampler(TableRules::heads_up(20.0), config);
        a.train(300).unwrap();
        b.train(300).unwrap();
        assert_eq!(a.tracker().get_state().rows, b.tracker().get_state().rows);
        assert_eq!(a.rng_state(), b.rng_state());
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let config = CFRConfig::fast().with_seed(5);
        let mut straight = sampler(TableRules::heads_up(20.0), config.clone());
        straight.train(120).unwrap();

        let mut first = sampler(TableRules::heads_up(20.0), config.clone());
        first.train(60).unwrap();
        let saved = serde_json::to_string(&first.tracker().get_state()).unwrap();
        let rng = first.rng_state();

        let mut resumed = sampler(TableRules::heads_up(20.0), config);
        resumed
            .restore(serde_json::from_str(&saved).unwrap(), Some(&rng), 60)
            .unwrap();
        resumed.train(60).unwrap();

        assert_eq!(
            straight.tracker().get_state().rows,
            resumed.tracker().get_state().rows
        );
    }

    #[test]
    fn test_trained_strategies_are_distributions() {
        let mut s = sampler(TableRules::heads_up(20.0), CFRConfig::fast());
        s.train(200).unwrap();
        let tracker = s.tracker();
        assert!(tracker.num_info_sets() > 10);
        for key in tracker.keys() {
            let actions = tracker.actions(key).unwrap();
            let avg = tracker.get_average_strategy(key, actions);
            assert_abs_diff_eq!(avg.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
            let current = tracker.get_strategy(key, actions);
            assert_abs_diff_eq!(current.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        }
        assert_eq!(
            KeyFormat::detect_all(tracker.keys()).unwrap(),
            Some(KeyFormat::Versioned(crate::abstraction::KEY_VERSION))
        );
    }

    #[test]
    fn test_multiway_training_runs() {
        let rules = TableRules::default().with_players(3).with_stack(15.0);
        let mut s = sampler(rules, CFRConfig::fast());
        s.train(100).unwrap();
        assert!(s.tracker().num_info_sets() > 0);
        for key in s.tracker().keys() {
            InfosetKey::parse(key).unwrap();
        }
    }

    #[test]
    fn test_legacy_keys_option() {
        let config = CFRConfig {
            versioned_keys: false,
            ..CFRConfig::fast()
        };
        let mut s = sampler(TableRules::heads_up(10.0), config);
        s.train(50).unwrap();
        assert_eq!(
            KeyFormat::detect_all(s.tracker().keys()).unwrap(),
            Some(KeyFormat::Legacy)
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = OutcomeSampler::new(
            TableRules::heads_up(10.0),
            ActionAbstraction::default(),
            Arc::new(StrengthBucketer::default()),
            Arc::new(RankEvaluator),
            CFRConfig::default().with_discount_interval(0),
        );
        assert!(result.is_err());
    }
}
