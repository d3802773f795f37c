//! Values at the depth limit of a subgame.
//!
//! A leaf is the chance node that opens the first betting round outside the
//! subgame. Its value comes from an external [`LeafEvaluator`] when the
//! estimate passes the [`LeafGate`](super::LeafGate), and otherwise from a
//! [`BlueprintRollout`] of the rest of the hand.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::abstraction::{AbstractAction, ActionAbstraction};
use crate::cards::{HoleCards, ShowdownEvaluator};
use crate::cfr::{sample_index, BlueprintPolicy, InfosetEncoder};
use crate::game::{Deal, HandState, Phase, Position};

/// Bounded value estimate with a prediction interval, in big blinds.
///
/// The value is the player's expected net result for the whole hand, the
/// same quantity as [`HandState::utilities`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeafEstimate {
    /// Point estimate.
    pub value: f64,
    /// Lower end of the prediction interval.
    pub low: f64,
    /// Upper end of the prediction interval.
    pub high: f64,
}

impl LeafEstimate {
    /// Estimate with interval `[low, high]`.
    pub fn new(value: f64, low: f64, high: f64) -> Self {
        Self { value, low, high }
    }

    /// Interval width.
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Whether all fields are finite.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite() && self.low.is_finite() && self.high.is_finite()
    }
}

/// What a leaf evaluator is asked.
#[derive(Debug, Clone, Copy)]
pub struct LeafQuery<'a> {
    /// State at the leaf (awaiting the next street's cards).
    pub state: &'a HandState,
    /// Seat whose value is wanted.
    pub player: usize,
    /// That seat's hole cards.
    pub hand: HoleCards,
    /// That seat's position.
    pub position: Position,
    /// Weighted opponent holdings; empty means unknown.
    pub opponent_range: &'a [(HoleCards, f64)],
}

/// External value estimator for subgame leaves.
///
/// Returning `None` means no estimate; the rollout value is used instead.
pub trait LeafEvaluator: Send + Sync {
    /// Estimate the value of `query.player` at `query.state`.
    fn evaluate(&self, query: &LeafQuery<'_>) -> Option<LeafEstimate>;
}

/// How the players other than the hero continue past a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafPolicy {
    /// Follow the blueprint.
    Blueprint,
    /// Blueprint with folding scaled up.
    FoldBiased,
    /// Blueprint with checking and calling scaled up.
    CallBiased,
    /// Blueprint with bets and raises scaled up.
    RaiseBiased,
}

impl LeafPolicy {
    /// All policies.
    pub const ALL: [LeafPolicy; 4] = [
        LeafPolicy::Blueprint,
        LeafPolicy::FoldBiased,
        LeafPolicy::CallBiased,
        LeafPolicy::RaiseBiased,
    ];

    fn favours(&self, action: AbstractAction) -> bool {
        match self {
            LeafPolicy::Blueprint => false,
            LeafPolicy::FoldBiased => action == AbstractAction::Fold,
            LeafPolicy::CallBiased => action == AbstractAction::CheckCall,
            LeafPolicy::RaiseBiased => action.is_aggressive(),
        }
    }

    /// Scale favoured actions by `bias` and renormalize.
    pub fn apply(&self, actions: &[AbstractAction], probs: &[f64], bias: f64) -> Vec<f64> {
        let scaled: Vec<f64> = actions
            .iter()
            .zip(probs)
            .map(|(&a, &p)| if self.favours(a) { p * bias } else { p })
            .collect();
        let total: f64 = scaled.iter().sum();
        if total > 0.0 {
            scaled.into_iter().map(|p| p / total).collect()
        } else {
            probs.to_vec()
        }
    }
}

/// Plays a hand out from a leaf under the blueprint.
pub struct BlueprintRollout<'a> {
    /// Strategies to follow.
    pub blueprint: &'a BlueprintPolicy,
    /// Key builder matching the blueprint.
    pub encoder: &'a InfosetEncoder,
    /// Action sets.
    pub abstraction: &'a ActionAbstraction,
    /// Showdown ranking.
    pub evaluator: &'a dyn ShowdownEvaluator,
    /// Multiplier for biased policies.
    pub bias: f64,
}

impl BlueprintRollout<'_> {
    /// One sampled playout from `state` to the end of the hand, returning
    /// `player`'s net chips.
    ///
    /// The `hero` follows the blueprint; everyone else follows `policy`.
    pub fn value<R: Rng + ?Sized>(
        &self,
        state: &HandState,
        deal: &Deal,
        player: usize,
        hero: usize,
        policy: LeafPolicy,
        rng: &mut R,
    ) -> f64 {
        let mut state = state.clone();
        loop {
            match state.phase() {
                Phase::Terminal => {
                    return state.utilities(&deal.hands, &deal.board, self.evaluator)[player];
                }
                Phase::Chance => state.reveal(&deal.board),
                Phase::Decision(seat) => {
                    let actions = state.legal_actions(self.abstraction);
                    if actions.is_empty() {
                        return 0.0;
                    }
                    let key = self.encoder.key(&state, seat, &deal.hands[seat]);
                    let mut probs = self.blueprint.strategy_for(&key, &actions);
                    if seat != hero {
                        probs = policy.apply(&actions, &probs, self.bias);
                    }
                    let a = sample_index(rng, &probs);
                    state.apply_mut(actions[a]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::StrengthBucketer;
    use crate::cards::RankEvaluator;
    use crate::game::TableRules;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    #[test]
    fn test_policy_bias() {
        let actions = [
            AbstractAction::Fold,
            AbstractAction::CheckCall,
            AbstractAction::bet(1.0),
            AbstractAction::AllIn,
        ];
        let probs = [0.25; 4];
        let fold = LeafPolicy::FoldBiased.apply(&actions, &probs, 5.0);
        assert_abs_diff_eq!(fold[0], 5.0 / 8.0);
        let raise = LeafPolicy::RaiseBiased.apply(&actions, &probs, 5.0);
        assert_abs_diff_eq!(raise[2], 5.0 / 12.0);
        assert_abs_diff_eq!(raise[3], 5.0 / 12.0);
        assert_eq!(LeafPolicy::Blueprint.apply(&actions, &probs, 5.0), probs.to_vec());
    }

    #[test]
    fn test_rollout_is_zero_sum_heads_up() {
        let rules = TableRules::heads_up(20.0);
        let abstraction = ActionAbstraction::single_size(1.0);
        let encoder = InfosetEncoder::new(Arc::new(StrengthBucketer::default()), true);
        let blueprint = BlueprintPolicy::default();
        let rollout = BlueprintRollout {
            blueprint: &blueprint,
            encoder: &encoder,
            abstraction: &abstraction,
            evaluator: &RankEvaluator,
            bias: 5.0,
        };
        let state = HandState::new(&rules).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let deal = Deal::sample(2, &mut rng).unwrap();
            let mut r0 = rng.clone();
            let mut r1 = rng.clone();
            let v0 = rollout.value(&state, &deal, 0, 0, LeafPolicy::CallBiased, &mut r0);
            let v1 = rollout.value(&state, &deal, 1, 0, LeafPolicy::CallBiased, &mut r1);
            assert_abs_diff_eq!(v0 + v1, 0.0, epsilon = 1e-9);
            assert!(v0.abs() <= 20.0);
            rng = r0;
        }
    }
}
