//! Real-time depth-limited resolving.
//!
//! A resolve runs in four steps:
//!
//! 1. **Warm start**: root regrets are seeded from the blueprint.
//! 2. **Iterate**: outcome-sampling CFR over the subgame. Leaves take an
//!    accepted external estimate or a blueprint rollout, and every traverser
//!    node is penalized by `kl_weight * KL(current || blueprint)`.
//! 3. **Time check**: stop at `max_iterations`, or once the job's share of
//!    `min_iterations` is done and the deadline has passed. Jobs that queue
//!    behind others on the pool split `min_iterations` between them, so the
//!    guaranteed work per resolve stays the same however many jobs run.
//! 4. **Finalize**: average the root strategy over the independent solves
//!    (sampled next-street cards × leaf policies).
//!
//! The independent solves share nothing mutable and run on the rayon pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::config::ResolverConfig;
use super::leaf::{BlueprintRollout, LeafEvaluator, LeafPolicy, LeafQuery};
use super::subgame::Subgame;
use crate::abstraction::{AbstractAction, ActionAbstraction, HandBucketer, KeyFormat};
use crate::cards::{Card, HoleCards, ShowdownEvaluator};
use crate::cfr::{
    explore, outcome_regrets, sample_index, BlueprintPolicy, ConfigError, InfosetEncoder,
    RegretTracker, SolverRng,
};
use crate::game::{Deal, GameError, HandState, Phase};

const PROB_FLOOR: f64 = 1e-6;

/// Errors raised by [`SubgameResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// The subgame root is not the hero's decision.
    #[error("seat {hero} is not to act (to act: {to_act:?})")]
    NotHeroTurn {
        /// Hero seat.
        hero: usize,
        /// Seat actually to act.
        to_act: Option<usize>,
    },
    /// Known cards overlap.
    #[error("hero cards collide with the board")]
    CardCollision,
    /// The hero has no legal action.
    #[error("no legal actions at the root")]
    NoActions,
    /// No solve reached the root infoset.
    #[error("root infoset {0} was never visited")]
    NotVisited(String),
    /// No consistent deal could be drawn.
    #[error("could not deal cards consistent with the subgame")]
    NoDeal,
    /// Bad game input.
    #[error(transparent)]
    Game(#[from] GameError),
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where a returned strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrategySource {
    /// Real-time solve.
    Resolved,
    /// Blueprint row for the infoset.
    Blueprint,
    /// Neither was available.
    Uniform,
}

/// Distribution over the root's abstract actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStrategy {
    /// Root infoset key.
    pub key: String,
    /// Legal actions in canonical order.
    pub actions: Vec<AbstractAction>,
    /// Probability per action.
    pub probabilities: Vec<f64>,
    /// Provenance.
    pub source: StrategySource,
    /// Iterations summed over all solves.
    pub iterations: u64,
    /// Independent solves averaged.
    pub solves: usize,
    /// Leaf estimates accepted from the external evaluator.
    pub leaf_estimates: u64,
    /// Leaf estimates rejected by the gate.
    pub leaf_rejections: u64,
    /// Wall-clock time.
    pub elapsed_ms: f64,
}

impl ResolvedStrategy {
    fn fixed(
        key: String,
        actions: Vec<AbstractAction>,
        probabilities: Vec<f64>,
        source: StrategySource,
    ) -> Self {
        Self {
            key,
            actions,
            probabilities,
            source,
            iterations: 0,
            solves: 0,
            leaf_estimates: 0,
            leaf_rejections: 0,
            elapsed_ms: 0.0,
        }
    }

    /// Probability of `action` (zero when absent).
    pub fn probability(&self, action: AbstractAction) -> f64 {
        self.actions
            .iter()
            .position(|&a| a == action)
            .map_or(0.0, |i| self.probabilities[i])
    }

    /// Most likely action.
    pub fn best_action(&self) -> Option<AbstractAction> {
        self.actions
            .iter()
            .zip(&self.probabilities)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&a, _)| a)
    }

    /// Draw an action.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<AbstractAction> {
        if self.actions.is_empty() {
            return None;
        }
        Some(self.actions[sample_index(rng, &self.probabilities)])
    }
}

/// The real-time resolver.
///
/// Holds only shared, read-only inputs; each [`resolve`](Self::resolve)
/// builds its own trackers and discards them on return.
pub struct SubgameResolver {
    config: ResolverConfig,
    abstraction: ActionAbstraction,
    encoder: InfosetEncoder,
    evaluator: Arc<dyn ShowdownEvaluator>,
    blueprint: Arc<BlueprintPolicy>,
    leaf_evaluator: Option<Arc<dyn LeafEvaluator>>,
}

impl SubgameResolver {
    /// Create a resolver.
    ///
    /// A non-empty blueprint must have been trained with `bucketer`.
    pub fn new(
        config: ResolverConfig,
        abstraction: ActionAbstraction,
        bucketer: Arc<dyn HandBucketer>,
        evaluator: Arc<dyn ShowdownEvaluator>,
        blueprint: Arc<BlueprintPolicy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        abstraction.validate()?;
        let fingerprint = bucketer.fingerprint();
        if !blueprint.is_empty() && blueprint.bucket_fingerprint() != fingerprint {
            return Err(ConfigError::InvalidValue {
                field: "bucketing",
                reason: format!(
                    "blueprint was trained with {} but {} is loaded",
                    blueprint.bucket_fingerprint(),
                    fingerprint
                ),
            });
        }
        let versioned = blueprint.key_format() != Some(KeyFormat::Legacy);
        Ok(Self {
            config,
            abstraction,
            encoder: InfosetEncoder::new(bucketer, versioned),
            evaluator,
            blueprint,
            leaf_evaluator: None,
        })
    }

    /// Builder method: use an external leaf evaluator.
    pub fn with_leaf_evaluator(mut self, evaluator: Arc<dyn LeafEvaluator>) -> Self {
        self.leaf_evaluator = Some(evaluator);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The blueprint.
    pub fn blueprint(&self) -> &Arc<BlueprintPolicy> {
        &self.blueprint
    }

    /// The infoset encoder.
    pub fn encoder(&self) -> &InfosetEncoder {
        &self.encoder
    }

    /// Subgame for `hero` at `state` using the configured depth and mode.
    pub fn subgame(
        &self,
        state: HandState,
        hero: usize,
        hero_hand: HoleCards,
    ) -> Result<Subgame, ResolveError> {
        let subgame = Subgame::new(state, hero, hero_hand, self.config.streets_covered)?;
        Ok(if self.config.round_start {
            subgame.from_round_start()
        } else {
            subgame
        })
    }

    /// Resolve the hero's decision.
    #[instrument(level = "debug", skip(self, subgame), fields(street = %subgame.street()))]
    pub fn resolve(&self, subgame: &Subgame) -> Result<ResolvedStrategy, ResolveError> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.time_limit_ms);

        let decision = subgame.decision();
        let actions = decision.legal_actions(&self.abstraction);
        if actions.is_empty() {
            return Err(ResolveError::NoActions);
        }
        let key = self.encoder.key(decision, subgame.hero(), &subgame.hero_hand());

        let mut seed_rng = SolverRng::from_optional_seed(self.config.seed);
        let samples = if subgame.street().next().is_some() {
            self.config.samples_per_solve
        } else {
            1
        };
        let mut jobs = Vec::with_capacity(samples * self.config.leaf_policies.len());
        for _ in 0..samples {
            let fixed = if samples > 1 {
                subgame.sample_next_cards(&mut seed_rng)
            } else {
                Vec::new()
            };
            for &policy in &self.config.leaf_policies {
                jobs.push(SolveJob {
                    fixed: fixed.clone(),
                    policy,
                    seed: seed_rng.gen(),
                });
            }
        }

        let parallel = self.config.parallel && jobs.len() > 1;
        let min_iterations = self.min_iterations_per_job(jobs.len(), parallel);
        let run = |job: &SolveJob| {
            SubSolve::new(self, subgame, job, &key, &actions).run(deadline, min_iterations)
        };
        let results: Vec<SolveResult> = if parallel {
            jobs.par_iter().map(run).collect::<Result<_, _>>()?
        } else {
            jobs.iter().map(run).collect::<Result<_, _>>()?
        };

        let mut probabilities = vec![0.0; actions.len()];
        let mut visited = 0usize;
        for strategy in results.iter().filter_map(|r| r.strategy.as_ref()) {
            for (p, s) in probabilities.iter_mut().zip(strategy) {
                *p += s;
            }
            visited += 1;
        }
        if visited == 0 {
            return Err(ResolveError::NotVisited(key));
        }
        let total: f64 = probabilities.iter().sum();
        probabilities.iter_mut().for_each(|p| *p /= total);

        let resolved = ResolvedStrategy {
            key,
            actions,
            probabilities,
            source: StrategySource::Resolved,
            iterations: results.iter().map(|r| r.iterations).sum(),
            solves: results.len(),
            leaf_estimates: results.iter().map(|r| r.leaf_estimates).sum(),
            leaf_rejections: results.iter().map(|r| r.leaf_rejections).sum(),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        debug!(
            key = %resolved.key,
            iterations = resolved.iterations,
            solves = resolved.solves,
            elapsed_ms = resolved.elapsed_ms,
            "resolve finished"
        );
        Ok(resolved)
    }

    /// Iterations each job must finish before it may stop at the deadline.
    ///
    /// Jobs beyond the worker count run in consecutive batches; every batch
    /// gets an equal share of `min_iterations`.
    fn min_iterations_per_job(&self, jobs: usize, parallel: bool) -> u64 {
        let workers = if parallel {
            rayon::current_num_threads().max(1)
        } else {
            1
        };
        let batches = jobs.max(1).div_ceil(workers) as u64;
        self.config.min_iterations.div_ceil(batches)
    }

    /// Resolve, falling back to the blueprint on any failure.
    pub fn resolve_or_blueprint(&self, subgame: &Subgame) -> ResolvedStrategy {
        match self.resolve(subgame) {
            Ok(strategy) => strategy,
            Err(err) => {
                warn!(error = %err, "resolve failed, using blueprint");
                self.blueprint_strategy(subgame.decision(), subgame.hero(), &subgame.hero_hand())
            }
        }
    }

    /// Blueprint distribution for `seat` at `state`, or uniform if the
    /// blueprint has no row.
    pub fn blueprint_strategy(
        &self,
        state: &HandState,
        seat: usize,
        hand: &HoleCards,
    ) -> ResolvedStrategy {
        let actions = state.legal_actions(&self.abstraction);
        let key = self.encoder.key(state, seat, hand);
        let source = if self.blueprint.contains(&key) {
            StrategySource::Blueprint
        } else {
            StrategySource::Uniform
        };
        let probabilities = self.blueprint.strategy_for(&key, &actions);
        ResolvedStrategy::fixed(key, actions, probabilities, source)
    }
}

struct SolveJob {
    fixed: Vec<Card>,
    policy: LeafPolicy,
    seed: u64,
}

struct SolveResult {
    strategy: Option<Vec<f64>>,
    iterations: u64,
    leaf_estimates: u64,
    leaf_rejections: u64,
}

/// One independent solve with its own tracker and RNG.
struct SubSolve<'a> {
    resolver: &'a SubgameResolver,
    subgame: &'a Subgame,
    job: &'a SolveJob,
    root_key: &'a str,
    root_actions: &'a [AbstractAction],
    tracker: RegretTracker,
    rng: SolverRng,
    iteration: u64,
    leaf_estimates: u64,
    leaf_rejections: u64,
}

impl<'a> SubSolve<'a> {
    fn new(
        resolver: &'a SubgameResolver,
        subgame: &'a Subgame,
        job: &'a SolveJob,
        root_key: &'a str,
        root_actions: &'a [AbstractAction],
    ) -> Self {
        Self {
            resolver,
            subgame,
            job,
            root_key,
            root_actions,
            tracker: RegretTracker::new(),
            rng: SolverRng::seed_from_u64(job.seed),
            iteration: 0,
            leaf_estimates: 0,
            leaf_rejections: 0,
        }
    }

    fn run(mut self, deadline: Instant, min_iterations: u64) -> Result<SolveResult, ResolveError> {
        let resolver = self.resolver;
        let config = &resolver.config;
        self.warm_start();

        let start = self.subgame.start().clone();
        let players: Vec<usize> = (0..start.num_players())
            .filter(|&s| !start.has_folded(s))
            .collect();

        loop {
            self.iteration += 1;
            for &traverser in &players {
                let deal = self
                    .subgame
                    .sample_deal(&self.job.fixed, &mut self.rng)
                    .ok_or(ResolveError::NoDeal)?;
                self.traverse(&start, &deal, traverser, 1.0);
            }
            if self.iteration >= config.max_iterations {
                break;
            }
            if self.iteration >= min_iterations && Instant::now() >= deadline {
                break;
            }
        }

        let strategy = self
            .tracker
            .contains(self.root_key)
            .then(|| self.tracker.get_average_strategy(self.root_key, self.root_actions));
        Ok(SolveResult {
            strategy,
            iterations: self.iteration,
            leaf_estimates: self.leaf_estimates,
            leaf_rejections: self.leaf_rejections,
        })
    }

    fn warm_start(&mut self) {
        let strength = self.resolver.config.warm_start_strength;
        if strength <= 0.0 || !self.resolver.blueprint.contains(self.root_key) {
            return;
        }
        let bp = self
            .resolver
            .blueprint
            .strategy_for(self.root_key, self.root_actions);
        let seeds: Vec<f64> = bp.iter().map(|p| p * strength).collect();
        self.tracker
            .update_regrets(self.root_key, self.root_actions, &seeds, 1.0);
    }

    fn weight(&self) -> f64 {
        if self.resolver.config.use_linear_cfr {
            self.iteration as f64
        } else {
            1.0
        }
    }

    fn traverse(&mut self, state: &HandState, deal: &Deal, traverser: usize, reach: f64) -> f64 {
        match state.phase() {
            Phase::Terminal => state.utilities(
                &deal.hands,
                &deal.board,
                self.resolver.evaluator.as_ref(),
            )[traverser],
            Phase::Chance if self.subgame.is_leaf(state) => self.leaf_value(state, deal, traverser),
            Phase::Chance => {
                let mut next = state.clone();
                next.reveal(&deal.board);
                self.traverse(&next, deal, traverser, reach)
            }
            Phase::Decision(seat) => {
                let actions = state.legal_actions(&self.resolver.abstraction);
                if actions.is_empty() {
                    return 0.0;
                }
                if seat == self.subgame.hero() {
                    if let Some(forced) = self.subgame.forced_action(state, &actions) {
                        return self.traverse(&state.apply(forced), deal, traverser, reach);
                    }
                }
                let key = self.resolver.encoder.key(state, seat, &deal.hands[seat]);
                let strategy = self.tracker.get_strategy(&key, &actions);
                if seat == traverser {
                    self.traverse_player(state, deal, traverser, reach, &actions, &key, &strategy)
                } else {
                    let a = sample_index(&mut self.rng, &strategy);
                    self.traverse(&state.apply(actions[a]), deal, traverser, reach)
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn traverse_player(
        &mut self,
        state: &HandState,
        deal: &Deal,
        traverser: usize,
        reach: f64,
        actions: &[AbstractAction],
        key: &str,
        strategy: &[f64],
    ) -> f64 {
        let sampling = explore(strategy, self.resolver.config.exploration);
        let a = sample_index(&mut self.rng, &sampling);
        let utility = self.traverse(&state.apply(actions[a]), deal, traverser, reach * strategy[a]);
        let (mut value, mut regrets) = outcome_regrets(strategy, a, sampling[a], utility);

        let kl_weight = self.resolver.config.kl_weight;
        if kl_weight > 0.0 && self.resolver.blueprint.contains(key) {
            let bp = self.resolver.blueprint.strategy_for(key, actions);
            value = kl_penalize(strategy, &bp, kl_weight, &mut regrets, value);
        }

        let weight = self.weight();
        self.tracker.update_regrets(key, actions, &regrets, weight);
        self.tracker.add_strategy(key, actions, strategy, reach * weight);
        value
    }

    fn leaf_value(&mut self, state: &HandState, deal: &Deal, player: usize) -> f64 {
        if let Some(evaluator) = &self.resolver.leaf_evaluator {
            let query = LeafQuery {
                state,
                player,
                hand: deal.hands[player],
                position: state.position(player),
                opponent_range: self.subgame.opponent_range(),
            };
            if let Some(estimate) = evaluator.evaluate(&query) {
                let gate = &self.resolver.config.leaf_gate;
                let root_street = self.subgame.start().street();
                if gate.accepts(&estimate, root_street, state.is_in_position(player)) {
                    self.leaf_estimates += 1;
                    return estimate.value * state.big_blind();
                }
                self.leaf_rejections += 1;
            }
        }
        let rollout = BlueprintRollout {
            blueprint: &self.resolver.blueprint,
            encoder: &self.resolver.encoder,
            abstraction: &self.resolver.abstraction,
            evaluator: self.resolver.evaluator.as_ref(),
            bias: self.resolver.config.rollout_bias,
        };
        rollout.value(
            state,
            deal,
            player,
            self.subgame.hero(),
            self.job.policy,
            &mut self.rng,
        )
    }
}

/// `KL(p || q)` with both sides floored.
pub fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .map(|(&pi, &qi)| {
            let pi = pi.max(PROB_FLOOR);
            pi * (pi / qi.max(PROB_FLOOR)).ln()
        })
        .sum()
}

/// Apply the `weight * KL(strategy || blueprint)` penalty to a node.
///
/// Each action's regret moves by the penalty's gradient, pulling the
/// strategy toward the blueprint. Returns the penalized node value.
fn kl_penalize(
    strategy: &[f64],
    blueprint: &[f64],
    weight: f64,
    regrets: &mut [f64],
    value: f64,
) -> f64 {
    let kl = kl_divergence(strategy, blueprint);
    for ((r, &p), &q) in regrets.iter_mut().zip(strategy).zip(blueprint) {
        let log_ratio = (p.max(PROB_FLOOR) / q.max(PROB_FLOOR)).ln();
        *r -= weight * (log_ratio - kl);
    }
    value - weight * kl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::StrengthBucketer;
    use crate::cards::{parse_cards, RankEvaluator};
    use crate::cfr::{CFRConfig, OutcomeSampler};
    use crate::game::TableRules;
    use crate::resolve::LeafEstimate;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicU64, Ordering};
    use test_log::test;

    fn trained_blueprint(
        rules: &TableRules,
        abstraction: &ActionAbstraction,
    ) -> Arc<BlueprintPolicy> {
        let mut sampler = OutcomeSampler::new(
            rules.clone(),
            abstraction.clone(),
            Arc::new(StrengthBucketer::default()),
            Arc::new(RankEvaluator),
            CFRConfig::fast(),
        )
        .unwrap();
        sampler.train(3_000).unwrap();
        Arc::new(sampler.blueprint())
    }

    fn resolver(config: ResolverConfig, blueprint: Arc<BlueprintPolicy>) -> SubgameResolver {
        SubgameResolver::new(
            config,
            ActionAbstraction::default(),
            Arc::new(StrengthBucketer::default()),
            Arc::new(RankEvaluator),
            blueprint,
        )
        .unwrap()
    }

    fn flop_decision() -> (HandState, usize, HoleCards) {
        let rules = TableRules::heads_up(100.0);
        let state = HandState::replay(
            &rules,
            &ActionAbstraction::default(),
            &[
                vec![AbstractAction::CheckCall, AbstractAction::CheckCall],
                vec![AbstractAction::bet(0.75), AbstractAction::bet(1.0)],
            ],
            &parse_cards("2c7d9h").unwrap(),
        )
        .unwrap();
        let hero = state.current_player().unwrap();
        (state, hero, "AhAd".parse().unwrap())
    }

    fn assert_distribution(strategy: &ResolvedStrategy) {
        assert_eq!(strategy.actions.len(), strategy.probabilities.len());
        assert_abs_diff_eq!(strategy.probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(strategy.probabilities.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_kl_penalty_pulls_toward_blueprint() {
        let strategy = [0.9, 0.1];
        let blueprint = [0.5, 0.5];
        let mut regrets = [0.0, 0.0];
        let value = kl_penalize(&strategy, &blueprint, 1.0, &mut regrets, 2.0);
        assert!(value < 2.0);
        assert!(regrets[0] < 0.0);
        assert!(regrets[1] > 0.0);
        assert_abs_diff_eq!(kl_divergence(&blueprint, &blueprint), 0.0);
    }

    #[test]
    fn test_resolve_within_time_budget() {
        let (state, hero, hand) = flop_decision();
        let config = ResolverConfig::default()
            .with_iterations(100, 1_000_000)
            .with_time_limit_ms(80)
            .with_seed(1);
        let resolver = resolver(config, Arc::new(BlueprintPolicy::default()));
        let subgame = resolver.subgame(state, hero, hand).unwrap();

        let started = Instant::now();
        let strategy = resolver.resolve(&subgame).unwrap();
        let elapsed = started.elapsed();

        assert_distribution(&strategy);
        assert_eq!(strategy.source, StrategySource::Resolved);
        assert!(strategy.iterations >= 100);
        // Scheduling noise allowance.
        assert!(elapsed < Duration::from_millis(80 + 150), "took {elapsed:?}");
    }

    #[test]
    fn test_many_serial_jobs_share_time_budget() {
        let (state, hero, hand) = flop_decision();
        let mut config = ResolverConfig::default()
            .with_iterations(100, 1_000_000)
            .with_time_limit_ms(80)
            .with_samples(3)
            .with_leaf_policies(LeafPolicy::ALL.to_vec())
            .with_seed(3);
        config.parallel = false;
        let resolver = resolver(config, Arc::new(BlueprintPolicy::default()));
        let subgame = resolver.subgame(state, hero, hand).unwrap();

        let started = Instant::now();
        let strategy = resolver.resolve(&subgame).unwrap();
        let elapsed = started.elapsed();

        assert_distribution(&strategy);
        assert_eq!(strategy.solves, 12);
        assert!(strategy.iterations >= 100);
        assert!(elapsed < Duration::from_millis(80 + 150), "took {elapsed:?}");
    }

    #[test]
    fn test_min_iterations_split_across_batches() {
        let config = ResolverConfig::default().with_iterations(100, 10_000);
        let resolver = resolver(config, Arc::new(BlueprintPolicy::default()));
        assert_eq!(resolver.min_iterations_per_job(1, false), 100);
        assert_eq!(resolver.min_iterations_per_job(12, false), 9);
        assert_eq!(resolver.min_iterations_per_job(0, false), 100);

        let workers = rayon::current_num_threads();
        assert_eq!(resolver.min_iterations_per_job(workers, true), 100);
        assert_eq!(resolver.min_iterations_per_job(2 * workers, true), 50);
    }

    #[test]
    fn test_same_seed_same_strategy() {
        let (state, hero, hand) = flop_decision();
        let config = ResolverConfig::default()
            .with_iterations(200, 200)
            .with_samples(3)
            .with_leaf_policies(LeafPolicy::ALL.to_vec())
            .with_seed(9);
        let resolver = resolver(config, Arc::new(BlueprintPolicy::default()));
        let subgame = resolver.subgame(state, hero, hand).unwrap();
        let a = resolver.resolve(&subgame).unwrap();
        let b = resolver.resolve(&subgame).unwrap();
        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.solves, 12);
        assert_eq!(a.iterations, 12 * 200);
        assert_distribution(&a);
    }

    #[test]
    fn test_round_start_resolves_current_decision() {
        let (state, hero, hand) = flop_decision();
        let config = ResolverConfig::default()
            .with_iterations(400, 400)
            .with_round_start(true)
            .with_seed(2);
        let resolver = resolver(config, Arc::new(BlueprintPolicy::default()));
        let subgame = resolver.subgame(state.clone(), hero, hand).unwrap();
        assert_eq!(subgame.frozen().len(), 1);
        let strategy = resolver.resolve_or_blueprint(&subgame);
        assert_distribution(&strategy);
        assert_eq!(strategy.actions, state.legal_actions(&ActionAbstraction::default()));
    }

    #[test]
    fn test_strong_kl_weight_stays_near_blueprint() {
        let rules = TableRules::heads_up(100.0);
        let abstraction = ActionAbstraction::default();
        let blueprint = trained_blueprint(&rules, &abstraction);
        let state = HandState::new(&rules).unwrap();
        let hero = state.current_player().unwrap();
        let hand: HoleCards = "7c2d".parse().unwrap();

        let config = ResolverConfig::default()
            .with_iterations(300, 300)
            .with_kl_weight(1e4)
            .with_seed(3);
        let resolver = resolver(config, blueprint.clone());
        let subgame = resolver.subgame(state.clone(), hero, hand).unwrap();
        let resolved = resolver.resolve(&subgame).unwrap();
        let bp = resolver.blueprint_strategy(&state, hero, &hand);
        assert_distribution(&resolved);
        let l1: f64 = resolved
            .probabilities
            .iter()
            .zip(&bp.probabilities)
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(l1 < 1.0, "drifted {l1}");
    }

    #[test]
    fn test_fallback_never_fails() {
        let (state, hero, hand) = flop_decision();
        let config = ResolverConfig::default()
            .with_iterations(1, 1)
            .with_round_start(true)
            .with_seed(4);
        let resolver = resolver(config, Arc::new(BlueprintPolicy::default()));
        // A range with no live weight deals random opponents.
        let subgame = resolver
            .subgame(state, hero, hand)
            .unwrap()
            .with_opponent_range(vec![("KhKd".parse().unwrap(), 0.0)]);
        let strategy = resolver.resolve_or_blueprint(&subgame);
        assert_distribution(&strategy);
    }

    #[test]
    fn test_blueprint_strategy_sources() {
        let rules = TableRules::heads_up(100.0);
        let abstraction = ActionAbstraction::default();
        let blueprint = trained_blueprint(&rules, &abstraction);
        let resolver = resolver(ResolverConfig::default(), blueprint);
        let state = HandState::new(&rules).unwrap();
        let hero = state.current_player().unwrap();
        let hand: HoleCards = "AsAh".parse().unwrap();
        let bp = resolver.blueprint_strategy(&state, hero, &hand);
        assert_eq!(bp.source, StrategySource::Blueprint);
        assert_distribution(&bp);

        let (flop, hero, hand) = flop_decision();
        let unknown = resolver.blueprint_strategy(&flop, hero, &hand);
        assert_distribution(&unknown);
    }

    struct FixedLeaf {
        value: f64,
        width: f64,
        calls: AtomicU64,
    }

    impl LeafEvaluator for FixedLeaf {
        fn evaluate(&self, _query: &LeafQuery<'_>) -> Option<LeafEstimate> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let half = self.width / 2.0;
            Some(LeafEstimate::new(self.value, self.value - half, self.value + half))
        }
    }

    #[test]
    fn test_leaf_estimates_gated() {
        let (state, hero, hand) = flop_decision();
        let config = ResolverConfig::default().with_iterations(50, 50).with_seed(5);

        let narrow = Arc::new(FixedLeaf {
            value: 1.0,
            width: 1.0,
            calls: AtomicU64::new(0),
        });
        let r = resolver(config.clone(), Arc::new(BlueprintPolicy::default()))
            .with_leaf_evaluator(narrow.clone());
        let subgame = r.subgame(state.clone(), hero, hand).unwrap();
        let s = r.resolve(&subgame).unwrap();
        assert!(s.leaf_estimates > 0);
        assert_eq!(s.leaf_rejections, 0);

        let wide = Arc::new(FixedLeaf {
            value: 1.0,
            width: 100.0,
            calls: AtomicU64::new(0),
        });
        let r = resolver(config, Arc::new(BlueprintPolicy::default()))
            .with_leaf_evaluator(wide.clone());
        let s = r.resolve(&subgame).unwrap();
        assert_eq!(s.leaf_estimates, 0);
        assert!(s.leaf_rejections > 0);
        assert!(wide.calls.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_rejects_fingerprint_mismatch() {
        let rules = TableRules::heads_up(20.0);
        let abstraction = ActionAbstraction::single_size(1.0);
        let blueprint = trained_blueprint(&rules, &abstraction);
        let other = StrengthBucketer::new(&crate::abstraction::BucketConfig {
            postflop_sub_buckets: 8,
        });
        let result = SubgameResolver::new(
            ResolverConfig::default(),
            abstraction,
            Arc::new(other),
            Arc::new(RankEvaluator),
            blueprint,
        );
        assert!(result.is_err());
    }
}
