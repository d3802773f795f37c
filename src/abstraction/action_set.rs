//! Street and position dependent action ladders.

use serde::{Deserialize, Serialize};

use super::action::{AbstractAction, BetSize};
use crate::cards::Street;
use crate::cfr::ConfigError;

/// Pot-fraction bet sizes for one street.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetLadder {
    /// Sizes offered to the player acting last.
    pub in_position: Vec<f64>,
    /// Sizes offered to everyone else.
    pub out_of_position: Vec<f64>,
}

impl StreetLadder {
    fn new(in_position: &[f64], out_of_position: &[f64]) -> Self {
        Self {
            in_position: in_position.to_vec(),
            out_of_position: out_of_position.to_vec(),
        }
    }

    fn sizes(&self, in_position: bool) -> &[f64] {
        if in_position {
            &self.in_position
        } else {
            &self.out_of_position
        }
    }
}

/// The betting situation a decision is made in. Amounts are in chips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BettingSpot {
    /// Chips in the middle, including bets on the current street.
    pub pot: f64,
    /// Acting player's remaining stack.
    pub stack: f64,
    /// Chips needed to call.
    pub to_call: f64,
    /// Minimum raise increment (the big blind or the last raise size).
    pub min_raise: f64,
    /// Betting round.
    pub street: Street,
    /// Whether the actor closes the action postflop.
    pub in_position: bool,
    /// Bets and raises already made on this street.
    pub raises: u8,
    /// Whether raising is open to the actor. False after an incomplete
    /// all-in raise reaches a player who already acted.
    pub reopened: bool,
}

/// Maps a betting spot to a finite, canonically ordered action set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionAbstraction {
    /// Preflop sizes.
    pub preflop: StreetLadder,
    /// Flop sizes.
    pub flop: StreetLadder,
    /// Turn sizes.
    pub turn: StreetLadder,
    /// River sizes.
    pub river: StreetLadder,
    /// Once this many bets were made on a street only fold/call remain.
    pub max_raises_per_street: u8,
}

impl Default for ActionAbstraction {
    fn default() -> Self {
        Self {
            preflop: StreetLadder::new(&[0.5, 0.75, 1.0, 1.5, 2.0, 3.0], &[0.5, 1.0, 2.0]),
            flop: StreetLadder::new(&[0.33, 0.75, 1.0, 1.5], &[0.33, 0.75, 1.0]),
            turn: StreetLadder::new(&[0.5, 1.0, 1.5], &[0.5, 1.0]),
            river: StreetLadder::new(&[0.5, 1.0, 2.0], &[0.5, 1.0]),
            max_raises_per_street: 4,
        }
    }
}

impl ActionAbstraction {
    /// Single-size abstraction, handy for small test trees.
    pub fn single_size(fraction: f64) -> Self {
        let ladder = StreetLadder::new(&[fraction], &[fraction]);
        Self {
            preflop: ladder.clone(),
            flop: ladder.clone(),
            turn: ladder.clone(),
            river: ladder,
            max_raises_per_street: 2,
        }
    }

    /// Builder method: set the raise cap.
    pub fn with_max_raises(mut self, max_raises: u8) -> Self {
        self.max_raises_per_street = max_raises;
        self
    }

    /// Ladder for a street.
    pub fn ladder(&self, street: Street) -> &StreetLadder {
        match street {
            Street::Preflop => &self.preflop,
            Street::Flop => &self.flop,
            Street::Turn => &self.turn,
            Street::River => &self.river,
        }
    }

    /// Chips a bet of `size` puts in.
    ///
    /// The raw amount is `fraction * pot`; it is lifted to a legal minimum
    /// (`to_call + min_raise` when facing a bet, `min_raise` otherwise).
    pub fn bet_amount(size: BetSize, pot: f64, to_call: f64, min_raise: f64) -> f64 {
        let raw = size.fraction() * pot;
        if to_call > 0.0 {
            raw.max(to_call + min_raise)
        } else {
            raw.max(min_raise)
        }
    }

    /// Legal abstract actions at `spot`, ascending and deduplicated.
    pub fn legal_actions(&self, spot: &BettingSpot) -> Vec<AbstractAction> {
        let mut actions = Vec::new();
        if spot.stack <= 0.0 {
            return actions;
        }
        if spot.to_call > 0.0 {
            actions.push(AbstractAction::Fold);
        }
        actions.push(AbstractAction::CheckCall);

        let can_raise = spot.reopened
            && spot.stack > spot.to_call
            && spot.raises < self.max_raises_per_street;
        if !can_raise {
            return actions;
        }

        let mut sizes: Vec<BetSize> = self
            .ladder(spot.street)
            .sizes(spot.in_position)
            .iter()
            .map(|&f| BetSize::from_fraction(f))
            .filter(|s| s.percent() > 0)
            .collect();
        sizes.sort();
        sizes.dedup();

        let mut last_amount = f64::NEG_INFINITY;
        for size in sizes {
            let amount = Self::bet_amount(size, spot.pot, spot.to_call, spot.min_raise);
            if amount >= spot.stack {
                continue;
            }
            // Several small fractions can collapse onto the same min-raise.
            if amount - last_amount <= 1e-9 {
                continue;
            }
            last_amount = amount;
            actions.push(AbstractAction::Bet(size));
        }

        actions.push(AbstractAction::AllIn);
        actions
    }

    /// Validate ladder contents.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for street in Street::ALL {
            let ladder = self.ladder(street);
            for &f in ladder.in_position.iter().chain(&ladder.out_of_position) {
                if !f.is_finite() || f <= 0.0 || f > 100.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "abstraction.bet_sizes",
                        reason: format!("{street} size {f} must be in (0, 100]"),
                    });
                }
            }
        }
        if self.max_raises_per_street == 0 {
            return Err(ConfigError::InvalidValue {
                field: "abstraction.max_raises_per_street",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
