//! Depth-limited subgames.

use rand::Rng;

use super::resolver::ResolveError;
use crate::abstraction::AbstractAction;
use crate::cards::{Card, Deck, HoleCards, Street};
use crate::game::{Deal, HandState, Phase};

const MAX_DEAL_ATTEMPTS: usize = 64;

/// A bounded subtree rooted at a live decision.
///
/// Built per decision from frozen inputs and never persisted.
#[derive(Debug, Clone)]
pub struct Subgame {
    decision: HandState,
    start: HandState,
    hero: usize,
    hero_hand: HoleCards,
    opponent_range: Vec<(HoleCards, f64)>,
    streets_covered: usize,
    frozen: Vec<AbstractAction>,
}

impl Subgame {
    /// Subgame for `hero` holding `hero_hand` at `decision`.
    ///
    /// `decision` must be the hero's turn and the hand must not share cards
    /// with the board.
    pub fn new(
        decision: HandState,
        hero: usize,
        hero_hand: HoleCards,
        streets_covered: usize,
    ) -> Result<Self, ResolveError> {
        let to_act = decision.current_player();
        if to_act != Some(hero) {
            return Err(ResolveError::NotHeroTurn { hero, to_act });
        }
        if hero_hand.collides_with(decision.board()) {
            return Err(ResolveError::CardCollision);
        }
        Ok(Self {
            start: decision.clone(),
            decision,
            hero,
            hero_hand,
            opponent_range: Vec::new(),
            streets_covered: streets_covered.max(1),
            frozen: Vec::new(),
        })
    }

    /// Builder method: weighted holdings assumed for every opponent.
    pub fn with_opponent_range(mut self, range: Vec<(HoleCards, f64)>) -> Self {
        self.opponent_range = range;
        self
    }

    /// Rebuild the subgame from the start of the current betting round.
    ///
    /// The hero's actions already taken this round are replayed as forced
    /// moves; the other players' actions are left free.
    pub fn from_round_start(mut self) -> Self {
        let Some(start) = self.decision.round_start() else {
            return self;
        };
        let street = self.decision.street().index();
        let (Some(actions), Some(actors)) = (
            self.decision.history().get(street),
            self.decision.actors().get(street),
        ) else {
            return self;
        };
        self.frozen = actions
            .iter()
            .zip(actors)
            .filter(|(_, &seat)| seat == self.hero)
            .map(|(&a, _)| a)
            .collect();
        self.start = start.clone();
        self
    }

    /// The live decision being resolved.
    pub fn decision(&self) -> &HandState {
        &self.decision
    }

    /// Where traversal starts: the decision, or the round start.
    pub fn start(&self) -> &HandState {
        &self.start
    }

    /// Hero seat.
    pub fn hero(&self) -> usize {
        self.hero
    }

    /// Hero hole cards.
    pub fn hero_hand(&self) -> HoleCards {
        self.hero_hand
    }

    /// Opponent range (empty when unknown).
    pub fn opponent_range(&self) -> &[(HoleCards, f64)] {
        &self.opponent_range
    }

    /// Betting rounds covered.
    pub fn streets_covered(&self) -> usize {
        self.streets_covered
    }

    /// Hero actions forced in round-start mode.
    pub fn frozen(&self) -> &[AbstractAction] {
        &self.frozen
    }

    /// Whether `state` is at the depth limit.
    pub fn is_leaf(&self, state: &HandState) -> bool {
        state.phase() == Phase::Chance
            && state.street().index() >= self.start.street().index() + self.streets_covered
    }

    /// Forced hero action at `state`, if the hero still has frozen moves
    /// left this round and the next one is legal here.
    pub fn forced_action(
        &self,
        state: &HandState,
        legal: &[AbstractAction],
    ) -> Option<AbstractAction> {
        if self.frozen.is_empty()
            || state.current_player() != Some(self.hero)
            || state.street() != self.start.street()
        {
            return None;
        }
        let street = state.street().index();
        let taken = state
            .actors()
            .get(street)?
            .iter()
            .filter(|&&seat| seat == self.hero)
            .count();
        let next = *self.frozen.get(taken)?;
        legal.contains(&next).then_some(next)
    }

    /// Cards of the next street, sampled once per independent solve.
    ///
    /// Empty on the river.
    pub fn sample_next_cards<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Card> {
        let board = self.decision.board();
        let Some(next) = self.decision.street().next() else {
            return Vec::new();
        };
        let mut dead = board.to_vec();
        dead.extend_from_slice(&self.hero_hand.cards());
        let mut deck = Deck::without(&dead);
        deck.shuffle(rng);
        (board.len()..next.board_len())
            .filter_map(|_| deck.deal())
            .collect()
    }

    /// Deal hands and a full board consistent with everything known.
    ///
    /// Opponents are drawn from the range when one is given; `fixed` cards
    /// extend the visible board.
    pub fn sample_deal<R: Rng + ?Sized>(&self, fixed: &[Card], rng: &mut R) -> Option<Deal> {
        let mut board = self.decision.board().to_vec();
        board.extend_from_slice(fixed);
        for _ in 0..MAX_DEAL_ATTEMPTS {
            let mut dead = board.clone();
            dead.extend_from_slice(&self.hero_hand.cards());
            let mut known = vec![None; self.decision.num_players()];
            known[self.hero] = Some(self.hero_hand);
            if !self.opponent_range.is_empty() {
                for (seat, slot) in known.iter_mut().enumerate() {
                    if seat == self.hero {
                        continue;
                    }
                    if let Some(hand) = sample_from_range(&self.opponent_range, &dead, rng) {
                        dead.extend_from_slice(&hand.cards());
                        *slot = Some(hand);
                    }
                }
            }
            if let Some(deal) = Deal::complete(&known, &board, rng) {
                return Some(deal);
            }
        }
        None
    }

    /// Street of the live decision.
    pub fn street(&self) -> Street {
        self.decision.street()
    }
}

fn sample_from_range<R: Rng + ?Sized>(
    range: &[(HoleCards, f64)],
    dead: &[Card],
    rng: &mut R,
) -> Option<HoleCards> {
    let live: Vec<(HoleCards, f64)> = range
        .iter()
        .copied()
        .filter(|(hand, w)| *w > 0.0 && !hand.collides_with(dead))
        .collect();
    let total: f64 = live.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut r = rng.gen::<f64>() * total;
    for (hand, w) in &live {
        if r < *w {
            return Some(*hand);
        }
        r -= w;
    }
    live.last().map(|(hand, _)| *hand)
}
