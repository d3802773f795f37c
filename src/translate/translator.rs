//! Abstract to concrete action translation.
//!
//! All arithmetic is done in whole multiples of the table's minimum chip, so
//! every produced amount is representable at the venue.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::abstraction::{AbstractAction, ActionAbstraction, BettingSpot};
use crate::cards::Street;
use crate::cfr::ConfigError;

/// Venue limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConstraints {
    /// Smallest chip increment.
    pub min_chip: f64,
    /// Largest single wager the venue accepts, if limited.
    pub max_bet: Option<f64>,
    /// Bets of at least this share of the stack become all-in.
    pub all_in_threshold: f64,
    /// Largest acceptable pot-relative amount change when a round trip
    /// changes the action type.
    pub max_ev_distance: f64,
}

impl Default for TableConstraints {
    fn default() -> Self {
        Self {
            min_chip: 0.01,
            max_bet: None,
            all_in_threshold: 0.97,
            max_ev_distance: 0.05,
        }
    }
}

impl TableConstraints {
    /// Constraints with chip increment `min_chip`.
    pub fn with_min_chip(min_chip: f64) -> Self {
        Self {
            min_chip,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_chip > 0.0 && self.min_chip.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "translator.min_chip",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_bet.is_some_and(|m| !(m > 0.0)) {
            return Err(ConfigError::InvalidValue {
                field: "translator.max_bet",
                reason: "must be positive".to_string(),
            });
        }
        if !(self.all_in_threshold > 0.0 && self.all_in_threshold <= 1.0) {
            return Err(ConfigError::InvalidProbability(
                "translator.all_in_threshold",
                self.all_in_threshold,
            ));
        }
        if !(self.max_ev_distance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "translator.max_ev_distance",
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    fn units(&self, chips: f64) -> i64 {
        (chips / self.min_chip).round() as i64
    }

    // Whole chips a player actually holds; never rounds a stack up.
    fn floor_units(&self, chips: f64) -> i64 {
        (chips / self.min_chip + 1e-9).floor() as i64
    }

    fn chips(&self, units: i64) -> f64 {
        units as f64 * self.min_chip
    }
}

/// Betting situation of the player about to act, in chips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableSpot {
    /// Pot including every bet made so far.
    pub pot: f64,
    /// Chips behind.
    pub stack: f64,
    /// Largest bet on this street.
    pub current_bet: f64,
    /// This player's bet on this street.
    pub player_bet: f64,
    /// Minimum raise increment.
    pub min_raise: f64,
    /// Betting street.
    pub street: Street,
    /// Whether the player acts last postflop.
    pub in_position: bool,
    /// Bets and raises already made this street.
    pub raises: u8,
}

impl TableSpot {
    /// Chips needed to call.
    pub fn to_call(&self) -> f64 {
        (self.current_bet - self.player_bet).max(0.0)
    }

    /// The spot as seen by the action abstraction.
    pub fn betting_spot(&self) -> BettingSpot {
        BettingSpot {
            pot: self.pot,
            stack: self.stack,
            to_call: self.to_call(),
            min_raise: self.min_raise,
            street: self.street,
            in_position: self.in_position,
            raises: self.raises,
            reopened: true,
        }
    }
}

/// Kind of a concrete action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Give up the hand.
    Fold,
    /// Pass with nothing to call.
    Check,
    /// Match the current bet.
    Call,
    /// Open the betting.
    Bet,
    /// Raise a bet.
    Raise,
    /// Put the whole stack in.
    AllIn,
}

/// What the execution layer receives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcreteAction {
    /// Action type.
    pub kind: ActionKind,
    /// Chips added by this action.
    pub amount: f64,
}

impl ConcreteAction {
    /// Fold.
    pub fn fold() -> Self {
        Self {
            kind: ActionKind::Fold,
            amount: 0.0,
        }
    }

    /// Check.
    pub fn check() -> Self {
        Self {
            kind: ActionKind::Check,
            amount: 0.0,
        }
    }

    /// Action of `kind` adding `amount` chips.
    pub fn new(kind: ActionKind, amount: f64) -> Self {
        Self { kind, amount }
    }

    /// Whether the action puts chips in beyond a call.
    pub fn is_aggressive(&self) -> bool {
        matches!(self.kind, ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn)
    }
}

impl fmt::Display for ConcreteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActionKind::Fold => write!(f, "fold"),
            ActionKind::Check => write!(f, "check"),
            ActionKind::Call => write!(f, "call {:.2}", self.amount),
            ActionKind::Bet => write!(f, "bet {:.2}", self.amount),
            ActionKind::Raise => write!(f, "raise {:.2}", self.amount),
            ActionKind::AllIn => write!(f, "all-in {:.2}", self.amount),
        }
    }
}

/// Translation failures.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum TranslateError {
    /// The observed action cannot be played at the spot.
    #[error("{0} is not a legal action at this spot")]
    IllegalInput(ConcreteAction),

    /// No action of the observed kind fits and the translation drifts too far.
    #[error("{input} translated to {output} (ev distance {ev_distance:.3})")]
    TypeChange {
        /// Observed action.
        input: ConcreteAction,
        /// Translation back from the abstract action.
        output: ConcreteAction,
        /// Pot-relative amount change.
        ev_distance: f64,
    },
}

/// Round-trip counters.
#[derive(Debug, Default)]
pub struct TranslatorMetrics {
    roundtrips: AtomicU64,
    type_changes: AtomicU64,
    kind_kept: AtomicU64,
    illegal_after_roundtrip: AtomicU64,
}

impl TranslatorMetrics {
    /// `(name, value)` pairs under the `translator/` prefix.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("translator/roundtrips", self.roundtrips()),
            ("translator/type_changes", self.type_changes()),
            ("translator/kind_kept", self.kind_kept()),
            (
                "translator/illegal_after_roundtrip",
                self.illegal_after_roundtrip(),
            ),
        ]
    }

    /// Round trips performed.
    pub fn roundtrips(&self) -> u64 {
        self.roundtrips.load(Ordering::Relaxed)
    }

    /// Round trips that changed the action type.
    pub fn type_changes(&self) -> u64 {
        self.type_changes.load(Ordering::Relaxed)
    }

    /// Round trips whose translation would have changed the action type
    /// too much and were answered with an action of the input's kind.
    pub fn kind_kept(&self) -> u64 {
        self.kind_kept.load(Ordering::Relaxed)
    }

    /// Round trips that produced an illegal action. Must stay zero.
    pub fn illegal_after_roundtrip(&self) -> u64 {
        self.illegal_after_roundtrip.load(Ordering::Relaxed)
    }
}

/// Outcome of [`ActionTranslator::round_trip`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTrip {
    /// Abstract action chosen for the input.
    pub abstract_action: AbstractAction,
    /// Concrete action produced back.
    pub output: ConcreteAction,
    /// Whether the output has a different kind than the input.
    pub type_changed: bool,
    /// `|amount_in - amount_out| / pot`.
    pub ev_distance: f64,
    /// Whether the abstract translation was replaced by the nearest action
    /// of the input's kind.
    pub kind_kept: bool,
    /// Whether the output is legal.
    pub legal: bool,
}

/// Maps between abstract actions and legal table actions.
///
/// # Example
/// ```
/// use blueprint_resolver::abstraction::{AbstractAction, ActionAbstraction};
/// use blueprint_resolver::cards::Street;
/// use blueprint_resolver::translate::{ActionKind, ActionTranslator, TableConstraints, TableSpot};
///
/// let translator =
///     ActionTranslator::new(ActionAbstraction::default(), TableConstraints::default()).unwrap();
/// let spot = TableSpot {
///     pot: 10.0,
///     stack: 100.0,
///     current_bet: 0.0,
///     player_bet: 0.0,
///     min_raise: 1.0,
///     street: Street::Flop,
///     in_position: true,
///     raises: 0,
/// };
/// let action = translator.to_client(AbstractAction::bet(0.75), &spot);
/// assert_eq!(action.kind, ActionKind::Bet);
/// assert!((action.amount - 7.5).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct ActionTranslator {
    abstraction: ActionAbstraction,
    constraints: TableConstraints,
    metrics: TranslatorMetrics,
}

impl ActionTranslator {
    /// Create a translator.
    pub fn new(
        abstraction: ActionAbstraction,
        constraints: TableConstraints,
    ) -> Result<Self, ConfigError> {
        abstraction.validate()?;
        constraints.validate()?;
        Ok(Self {
            abstraction,
            constraints,
            metrics: TranslatorMetrics::default(),
        })
    }

    /// The venue constraints.
    pub fn constraints(&self) -> &TableConstraints {
        &self.constraints
    }

    /// Round-trip counters.
    pub fn metrics(&self) -> &TranslatorMetrics {
        &self.metrics
    }

    /// Abstract actions available at `spot`.
    pub fn legal_abstract(&self, spot: &TableSpot) -> Vec<AbstractAction> {
        self.abstraction.legal_actions(&spot.betting_spot())
    }

    /// Concrete, legal action for `action` at `spot`.
    ///
    /// Bets are sized as a pot fraction, rounded to the chip increment,
    /// raised to the minimum, capped by the stack and the venue maximum, and
    /// turned into all-in at or above the all-in threshold. A bet that
    /// cannot be made legally becomes a check or call.
    pub fn to_client(&self, action: AbstractAction, spot: &TableSpot) -> ConcreteAction {
        let c = &self.constraints;
        let stack = c.floor_units(spot.stack);
        let to_call = c.units(spot.to_call());
        if stack <= 0 {
            return ConcreteAction::check();
        }
        let passive = || {
            if to_call > 0 {
                ConcreteAction::new(ActionKind::Call, c.chips(to_call.min(stack)))
            } else {
                ConcreteAction::check()
            }
        };
        let cap = c
            .max_bet
            .map_or(stack, |m| stack.min(c.floor_units(m).max(0)));
        let min_total = if to_call > 0 {
            to_call + c.units(spot.min_raise).max(1)
        } else {
            c.units(spot.min_raise).max(1)
        };
        let aggressive_kind = if to_call > 0 {
            ActionKind::Raise
        } else {
            ActionKind::Bet
        };

        match action {
            AbstractAction::Fold if to_call > 0 => ConcreteAction::fold(),
            AbstractAction::Fold | AbstractAction::CheckCall => passive(),
            AbstractAction::AllIn => {
                if to_call >= stack || cap == stack {
                    if to_call >= stack {
                        passive()
                    } else {
                        ConcreteAction::new(ActionKind::AllIn, c.chips(stack))
                    }
                } else if cap >= min_total {
                    ConcreteAction::new(aggressive_kind, c.chips(cap))
                } else {
                    passive()
                }
            }
            AbstractAction::Bet(size) => {
                if to_call >= stack {
                    return passive();
                }
                if min_total >= stack {
                    return if cap == stack {
                        ConcreteAction::new(ActionKind::AllIn, c.chips(stack))
                    } else {
                        passive()
                    };
                }
                if cap < min_total {
                    return passive();
                }
                let raw = (size.fraction() * spot.pot / c.min_chip).round() as i64;
                let amount = raw.max(min_total).min(cap);
                let snap = (amount as f64) >= c.all_in_threshold * stack as f64;
                // Under a venue cap below the stack the bet stays a bet.
                if snap && cap == stack {
                    ConcreteAction::new(ActionKind::AllIn, c.chips(stack))
                } else {
                    ConcreteAction::new(aggressive_kind, c.chips(amount))
                }
            }
        }
    }

    /// Nearest abstract action for an observed concrete action.
    pub fn to_discrete(&self, action: &ConcreteAction, spot: &TableSpot) -> AbstractAction {
        let candidates = self.legal_abstract(spot);
        self.to_discrete_among(action, spot, &candidates)
    }

    /// Nearest action among `candidates`.
    ///
    /// Passive actions map directly. An aggressive action maps to the
    /// candidate whose translation reproduces it exactly if one exists,
    /// otherwise to the candidate with the nearest pot fraction (all-in
    /// counts as `stack / pot`). Candidates that translate to the same
    /// concrete action are represented by the first of them, so translating
    /// the result back and forth again is stable.
    pub fn to_discrete_among(
        &self,
        action: &ConcreteAction,
        spot: &TableSpot,
        candidates: &[AbstractAction],
    ) -> AbstractAction {
        let passive = match candidates.first() {
            Some(&first) if !candidates.contains(&AbstractAction::CheckCall) => first,
            _ => AbstractAction::CheckCall,
        };
        match action.kind {
            ActionKind::Fold => {
                if candidates.contains(&AbstractAction::Fold) {
                    AbstractAction::Fold
                } else {
                    passive
                }
            }
            ActionKind::Check | ActionKind::Call => passive,
            ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => {
                let aggressive: Vec<(AbstractAction, ConcreteAction)> = candidates
                    .iter()
                    .filter(|a| a.is_aggressive())
                    .map(|&a| (a, self.to_client(a, spot)))
                    .filter(|(_, out)| out.is_aggressive())
                    .collect();
                if aggressive.is_empty() {
                    return passive;
                }
                let canonical = |out: &ConcreteAction| {
                    aggressive
                        .iter()
                        .find(|(_, o)| self.same_action(o, out))
                        .map(|&(a, _)| a)
                };
                if let Some(exact) = canonical(action) {
                    return exact;
                }
                let pot = spot.pot.max(self.constraints.min_chip);
                let observed = action.amount / pot;
                let nearest = aggressive
                    .iter()
                    .min_by(|(a, _), (b, _)| {
                        let da = (candidate_fraction(*a, spot, pot) - observed).abs();
                        let db = (candidate_fraction(*b, spot, pot) - observed).abs();
                        da.total_cmp(&db)
                    })
                    .map(|&(_, out)| out);
                nearest.and_then(|out| canonical(&out)).unwrap_or(passive)
            }
        }
    }

    fn same_action(&self, a: &ConcreteAction, b: &ConcreteAction) -> bool {
        a.kind == b.kind && self.constraints.units(a.amount) == self.constraints.units(b.amount)
    }

    /// Whether `action` is legal at `spot`.
    pub fn is_legal(&self, action: &ConcreteAction, spot: &TableSpot) -> bool {
        let c = &self.constraints;
        let units_f = action.amount / c.min_chip;
        if !units_f.is_finite() || (units_f - units_f.round()).abs() > 1e-6 || units_f < 0.0 {
            return false;
        }
        let amount = units_f.round() as i64;
        let stack = c.floor_units(spot.stack);
        let to_call = c.units(spot.to_call());
        let within_max = c.max_bet.map_or(true, |m| amount <= c.floor_units(m));
        match action.kind {
            ActionKind::Fold => to_call > 0 && amount == 0,
            ActionKind::Check => to_call == 0 && amount == 0,
            ActionKind::Call => to_call > 0 && amount == to_call.min(stack),
            ActionKind::AllIn => stack > 0 && amount == stack && to_call < stack && within_max,
            ActionKind::Bet | ActionKind::Raise => {
                let facing = to_call > 0;
                if facing != (action.kind == ActionKind::Raise) {
                    return false;
                }
                let min_total = to_call + c.units(spot.min_raise).max(1);
                amount >= min_total && amount < stack && within_max
            }
        }
    }

    /// Translate `action` to abstract and back, recording metrics.
    ///
    /// The output keeps the input's kind unless the abstract translation
    /// stays within `max_ev_distance` of the input. Past that, the nearest
    /// legal action of the input's kind is returned instead: a bet the
    /// ladder cannot express stays a bet, and a raise past the abstraction's
    /// raise cap stays a raise.
    pub fn round_trip(
        &self,
        action: &ConcreteAction,
        spot: &TableSpot,
    ) -> Result<RoundTrip, TranslateError> {
        if !self.is_legal(action, spot) {
            return Err(TranslateError::IllegalInput(*action));
        }
        let abstract_action = self.to_discrete(action, spot);
        let translated = self.to_client(abstract_action, spot);
        let pot = spot.pot.max(self.constraints.min_chip);
        let distance = |out: &ConcreteAction| (action.amount - out.amount).abs() / pot;

        let kind_kept = translated.kind != action.kind
            && distance(&translated) > self.constraints.max_ev_distance;
        let output = if kind_kept {
            let kept = self
                .nearest_of_kind(action.kind, translated.amount, spot)
                .ok_or(TranslateError::TypeChange {
                    input: *action,
                    output: translated,
                    ev_distance: distance(&translated),
                })?;
            debug!(
                input = %action,
                translated = %translated,
                output = %kept,
                "kept action type on round trip"
            );
            kept
        } else {
            translated
        };
        let type_changed = output.kind != action.kind;
        let ev_distance = distance(&output);
        let legal = self.is_legal(&output, spot);

        self.metrics.roundtrips.fetch_add(1, Ordering::Relaxed);
        if type_changed {
            self.metrics.type_changes.fetch_add(1, Ordering::Relaxed);
        }
        if kind_kept {
            self.metrics.kind_kept.fetch_add(1, Ordering::Relaxed);
        }
        if !legal {
            self.metrics
                .illegal_after_roundtrip
                .fetch_add(1, Ordering::Relaxed);
            error!(input = %action, output = %output, ?spot, "illegal action after round trip");
        }
        trace!(input = %action, %abstract_action, output = %output, "round trip");

        Ok(RoundTrip {
            abstract_action,
            output,
            type_changed,
            ev_distance,
            kind_kept,
            legal,
        })
    }

    /// Legal action of `kind` closest to `target` chips, if `kind` is
    /// playable at `spot`. Bets and raises stay below the all-in snap when
    /// the minimum allows it.
    fn nearest_of_kind(
        &self,
        kind: ActionKind,
        target: f64,
        spot: &TableSpot,
    ) -> Option<ConcreteAction> {
        let c = &self.constraints;
        let stack = c.floor_units(spot.stack);
        let to_call = c.units(spot.to_call());
        let action = match kind {
            ActionKind::Fold => ConcreteAction::fold(),
            ActionKind::Check => ConcreteAction::check(),
            ActionKind::Call => ConcreteAction::new(ActionKind::Call, c.chips(to_call.min(stack))),
            ActionKind::AllIn => ConcreteAction::new(ActionKind::AllIn, c.chips(stack)),
            ActionKind::Bet | ActionKind::Raise => {
                let cap = c
                    .max_bet
                    .map_or(stack, |m| stack.min(c.floor_units(m).max(0)));
                let low = to_call + c.units(spot.min_raise).max(1);
                let mut high = cap.min(stack - 1);
                let below_snap = (c.all_in_threshold * stack as f64).ceil() as i64 - 1;
                if cap == stack && below_snap >= low {
                    high = high.min(below_snap);
                }
                if low > high {
                    return None;
                }
                ConcreteAction::new(kind, c.chips(c.units(target).clamp(low, high)))
            }
        };
        self.is_legal(&action, spot).then_some(action)
    }
}

fn candidate_fraction(action: AbstractAction, spot: &TableSpot, pot: f64) -> f64 {
    match action {
        AbstractAction::AllIn => spot.stack / pot,
        other => other.fraction().unwrap_or(0.0),
    }
}
