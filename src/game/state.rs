//! Abstract no-limit betting game.
//!
//! [`HandState`] tracks one hand as played with abstract actions: blinds,
//! per-street bets, the raise cap and min-raise, street transitions, board
//! reveals (chance nodes), all-in runouts and side-pot settlement. Cards are
//! not dealt here; callers reveal the board at chance nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::position::{Position, SeatTable};
use crate::abstraction::{AbstractAction, ActionAbstraction, BettingSpot};
use crate::cards::{Card, HoleCards, ShowdownEvaluator, Street};
use crate::cfr::ConfigError;

/// Table stakes and layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRules {
    /// Players dealt in (2 to 6).
    pub num_players: usize,
    /// Button seat.
    pub button: usize,
    /// Small blind in chips.
    pub small_blind: f64,
    /// Big blind in chips.
    pub big_blind: f64,
    /// Starting stack of every player in chips.
    pub starting_stack: f64,
}

impl Default for TableRules {
    fn default() -> Self {
        Self {
            num_players: 2,
            button: 0,
            small_blind: 0.5,
            big_blind: 1.0,
            starting_stack: 100.0,
        }
    }
}

impl TableRules {
    /// Heads-up with `stack` big blinds.
    pub fn heads_up(stack: f64) -> Self {
        Self {
            starting_stack: stack,
            ..Default::default()
        }
    }

    /// Builder method: set the number of players.
    pub fn with_players(mut self, num_players: usize) -> Self {
        self.num_players = num_players;
        self
    }

    /// Builder method: set the starting stack.
    pub fn with_stack(mut self, stack: f64) -> Self {
        self.starting_stack = stack;
        self
    }

    /// Validate the rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SeatTable::new(self.num_players, self.button)?;
        if !(self.small_blind > 0.0 && self.big_blind >= self.small_blind) {
            return Err(ConfigError::InvalidValue {
                field: "table.blinds",
                reason: format!("sb {} / bb {}", self.small_blind, self.big_blind),
            });
        }
        if !(self.starting_stack > self.big_blind) || !self.starting_stack.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "table.starting_stack",
                reason: format!("{} must exceed the big blind", self.starting_stack),
            });
        }
        Ok(())
    }
}

/// Errors raised while replaying a described hand.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// An action was not in the legal set at its decision point.
    #[error("illegal action {action} on {street} (legal: {legal})")]
    IllegalAction {
        /// Offending action.
        action: AbstractAction,
        /// Street it was played on.
        street: Street,
        /// Legal codes at that point.
        legal: String,
    },
    /// Actions for a later street were given before this street's round closed.
    #[error("betting on {0} is still open")]
    RoundOpen(Street),
    /// Actions were supplied where no player was to act.
    #[error("no decision pending on {0}; the hand is over or waiting for cards")]
    NoDecision(Street),
    /// The board does not cover the streets the history reaches.
    #[error("board has {have} cards but {street} needs {need}")]
    MissingBoard {
        /// Street being revealed.
        street: Street,
        /// Cards required.
        need: usize,
        /// Cards supplied.
        have: usize,
    },
    /// Table rules were rejected.
    #[error(transparent)]
    Rules(#[from] ConfigError),
}

/// What happens next at a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Seat to act.
    Decision(usize),
    /// Board cards for the current street must be revealed.
    Chance,
    /// The hand is over.
    Terminal,
}

/// State of one hand in the abstract game.
#[derive(Clone)]
pub struct HandState {
    seats: SeatTable,
    big_blind: f64,
    street: Street,
    stacks: Vec<f64>,
    committed: Vec<f64>,
    street_bets: Vec<f64>,
    folded: Vec<bool>,
    pending: Vec<bool>,
    // Seats facing an incomplete raise after they already acted.
    raise_closed: Vec<bool>,
    to_act: Option<usize>,
    raises: u8,
    last_raise: f64,
    board: Vec<Card>,
    history: Vec<Vec<AbstractAction>>,
    actors: Vec<Vec<usize>>,
    awaiting_cards: bool,
    finished: bool,
    round_start: Option<Arc<HandState>>,
}

impl HandState {
    /// Post blinds and hand the action to the first preflop actor.
    pub fn new(rules: &TableRules) -> Result<Self, ConfigError> {
        rules.validate()?;
        let seats = SeatTable::new(rules.num_players, rules.button)?;
        let n = rules.num_players;
        let mut state = Self {
            seats,
            big_blind: rules.big_blind,
            street: Street::Preflop,
            stacks: vec![rules.starting_stack; n],
            committed: vec![0.0; n],
            street_bets: vec![0.0; n],
            folded: vec![false; n],
            pending: vec![true; n],
            raise_closed: vec![false; n],
            to_act: None,
            raises: 0,
            last_raise: rules.big_blind,
            board: Vec::with_capacity(5),
            history: vec![Vec::new()],
            actors: vec![Vec::new()],
            awaiting_cards: false,
            finished: false,
            round_start: None,
        };
        state.post(seats.small_blind_seat(), rules.small_blind);
        state.post(seats.big_blind_seat(), rules.big_blind);
        state.to_act = state.first_actor();
        state.round_start = Some(Arc::new(state.clone()));
        Ok(state)
    }

    /// Replay a hand from the start.
    ///
    /// `history` holds one action list per street; `board` must contain the
    /// cards of every street the history reaches. Each action is checked
    /// against the abstraction's legal set.
    pub fn replay(
        rules: &TableRules,
        abstraction: &ActionAbstraction,
        history: &[Vec<AbstractAction>],
        board: &[Card],
    ) -> Result<Self, GameError> {
        let mut state = HandState::new(rules)?;
        for (i, street_actions) in history.iter().enumerate() {
            if i > 0 {
                state.reveal_from(board)?;
                if state.street.index() != i && !street_actions.is_empty() {
                    return Err(GameError::RoundOpen(state.street));
                }
            }
            for &action in street_actions {
                let legal = state.legal_actions(abstraction);
                if !matches!(state.phase(), Phase::Decision(_)) {
                    return Err(GameError::NoDecision(state.street));
                }
                if !legal.contains(&action) {
                    return Err(GameError::IllegalAction {
                        action,
                        street: state.street,
                        legal: legal.iter().map(|a| a.code()).collect::<Vec<_>>().join(","),
                    });
                }
                state.apply_mut(action);
            }
        }
        // Surface the board of a street that was reached but not yet acted on.
        if state.phase() == Phase::Chance && board.len() >= state.street.board_len() {
            state.reveal_from(board)?;
        }
        Ok(state)
    }

    fn reveal_from(&mut self, board: &[Card]) -> Result<(), GameError> {
        while self.phase() == Phase::Chance {
            let need = self.street.board_len();
            if board.len() < need {
                return Err(GameError::MissingBoard {
                    street: self.street,
                    need,
                    have: board.len(),
                });
            }
            self.reveal(board);
        }
        Ok(())
    }

    fn post(&mut self, seat: usize, amount: f64) {
        let put = amount.min(self.stacks[seat]);
        self.stacks[seat] -= put;
        self.street_bets[seat] += put;
        self.committed[seat] += put;
        if self.stacks[seat] <= 0.0 {
            self.pending[seat] = false;
        }
    }

    fn can_act(&self, seat: usize) -> bool {
        !self.folded[seat] && self.stacks[seat] > 0.0
    }

    fn first_actor(&self) -> Option<usize> {
        self.seats
            .acting_order(self.street)
            .into_iter()
            .find(|&s| self.pending[s] && self.can_act(s))
    }

    fn next_actor_after(&self, seat: usize) -> Option<usize> {
        let order = self.seats.acting_order(self.street);
        let at = order.iter().position(|&s| s == seat)?;
        (1..order.len())
            .map(|i| order[(at + i) % order.len()])
            .find(|&s| self.pending[s] && self.can_act(s))
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        if self.finished {
            Phase::Terminal
        } else if self.awaiting_cards {
            Phase::Chance
        } else {
            match self.to_act {
                Some(seat) => Phase::Decision(seat),
                None => Phase::Terminal,
            }
        }
    }

    /// Whether the hand is over.
    pub fn is_terminal(&self) -> bool {
        self.phase() == Phase::Terminal
    }

    /// Seat to act, if any.
    pub fn current_player(&self) -> Option<usize> {
        match self.phase() {
            Phase::Decision(seat) => Some(seat),
            _ => None,
        }
    }

    /// Seat layout.
    pub fn seats(&self) -> &SeatTable {
        &self.seats
    }

    /// Number of players dealt in.
    pub fn num_players(&self) -> usize {
        self.seats.num_players()
    }

    /// Current street.
    pub fn street(&self) -> Street {
        self.street
    }

    /// Revealed board cards.
    pub fn board(&self) -> &[Card] {
        &self.board
    }

    /// Total chips in the middle.
    pub fn pot(&self) -> f64 {
        self.committed.iter().sum()
    }

    /// Remaining stack of a seat.
    pub fn stack(&self, seat: usize) -> f64 {
        self.stacks[seat]
    }

    /// Chips a seat has put in this hand.
    pub fn committed(&self, seat: usize) -> f64 {
        self.committed[seat]
    }

    /// Chips a seat has put in on the current street.
    pub fn street_bet(&self, seat: usize) -> f64 {
        self.street_bets[seat]
    }

    /// Largest bet on the current street.
    pub fn current_bet(&self) -> f64 {
        self.street_bets.iter().copied().fold(0.0, f64::max)
    }

    /// Chips `seat` needs to call.
    pub fn to_call(&self, seat: usize) -> f64 {
        (self.current_bet() - self.street_bets[seat]).max(0.0)
    }

    /// Minimum raise increment on this street.
    pub fn min_raise(&self) -> f64 {
        self.last_raise
    }

    /// Big blind in chips.
    pub fn big_blind(&self) -> f64 {
        self.big_blind
    }

    /// Bets and raises made on the current street.
    pub fn raises(&self) -> u8 {
        self.raises
    }

    /// Seats that have not folded.
    pub fn in_hand(&self) -> Vec<bool> {
        self.folded.iter().map(|f| !f).collect()
    }

    /// Whether `seat` has folded.
    pub fn has_folded(&self, seat: usize) -> bool {
        self.folded[seat]
    }

    /// Position of a seat.
    pub fn position(&self, seat: usize) -> Position {
        self.seats.position(seat)
    }

    /// Whether `seat` acts last postflop among players still in.
    pub fn is_in_position(&self, seat: usize) -> bool {
        self.seats.in_position(seat, &self.in_hand())
    }

    /// Abstract actions per street; the last entry is the current street.
    pub fn history(&self) -> &[Vec<AbstractAction>] {
        &self.history
    }

    /// Seats that took each action in [`HandState::history`].
    pub fn actors(&self) -> &[Vec<usize>] {
        &self.actors
    }

    /// State as it was when the current betting round began.
    pub fn round_start(&self) -> Option<&HandState> {
        self.round_start.as_deref()
    }

    /// Betting situation of the seat to act.
    pub fn betting_spot(&self) -> Option<BettingSpot> {
        let seat = self.current_player()?;
        Some(BettingSpot {
            pot: self.pot(),
            stack: self.stacks[seat],
            to_call: self.to_call(seat),
            min_raise: self.last_raise,
            street: self.street,
            in_position: self.is_in_position(seat),
            raises: self.raises,
            reopened: !self.raise_closed[seat],
        })
    }

    /// Legal abstract actions for the seat to act (empty elsewhere).
    pub fn legal_actions(&self, abstraction: &ActionAbstraction) -> Vec<AbstractAction> {
        match self.betting_spot() {
            Some(spot) => abstraction.legal_actions(&spot),
            None => Vec::new(),
        }
    }

    /// Chips the seat to act would add with `action`.
    pub fn chips_for(&self, action: AbstractAction) -> f64 {
        let Some(seat) = self.current_player() else {
            return 0.0;
        };
        let to_call = self.to_call(seat);
        let stack = self.stacks[seat];
        match action {
            AbstractAction::Fold => 0.0,
            AbstractAction::CheckCall => to_call.min(stack),
            AbstractAction::Bet(size) => {
                ActionAbstraction::bet_amount(size, self.pot(), to_call, self.last_raise).min(stack)
            }
            AbstractAction::AllIn => stack,
        }
    }

    /// Apply an action, returning the successor state.
    pub fn apply(&self, action: AbstractAction) -> Self {
        let mut next = self.clone();
        next.apply_mut(action);
        next
    }

    /// Apply an action in place.
    ///
    /// Actions are expected to come from [`HandState::legal_actions`]; a fold
    /// with nothing to call is played as a check.
    pub fn apply_mut(&mut self, action: AbstractAction) {
        let Some(seat) = self.current_player() else {
            debug_assert!(false, "apply called outside a decision node");
            return;
        };
        let to_call = self.to_call(seat);
        let action = match action {
            AbstractAction::Fold if to_call <= 0.0 => AbstractAction::CheckCall,
            other => other,
        };

        self.history[self.street.index()].push(action);
        self.actors[self.street.index()].push(seat);
        self.pending[seat] = false;
        self.raise_closed[seat] = false;

        if action == AbstractAction::Fold {
            self.folded[seat] = true;
        } else {
            let before = self.current_bet();
            let put = self.chips_for(action);
            self.stacks[seat] -= put;
            self.street_bets[seat] += put;
            self.committed[seat] += put;
            if self.stacks[seat] < 1e-9 {
                self.stacks[seat] = 0.0;
            }

            let increment = self.street_bets[seat] - before;
            if increment > 1e-9 {
                self.raises = self.raises.saturating_add(1);
                // A short all-in over an existing bet does not reopen the
                // raising for seats that already acted; they may only call.
                let full = before <= 0.0 || increment >= self.last_raise;
                if increment >= self.last_raise {
                    self.last_raise = increment;
                }
                for other in 0..self.num_players() {
                    if other != seat && self.can_act(other) {
                        if full {
                            self.raise_closed[other] = false;
                        } else if !self.pending[other] {
                            self.raise_closed[other] = true;
                        }
                        self.pending[other] = true;
                    }
                }
            }
        }

        self.advance_after(seat);
    }

    fn advance_after(&mut self, seat: usize) {
        if self.folded.iter().filter(|f| !**f).count() <= 1 {
            self.finished = true;
            self.to_act = None;
            return;
        }
        match self.next_actor_after(seat) {
            Some(next) => self.to_act = Some(next),
            None => self.end_round(),
        }
    }

    fn end_round(&mut self) {
        self.to_act = None;
        self.street_bets.iter_mut().for_each(|b| *b = 0.0);
        self.raises = 0;
        self.last_raise = self.big_blind;
        self.raise_closed.iter_mut().for_each(|c| *c = false);
        match self.street.next() {
            None => self.finished = true,
            Some(next) => {
                self.street = next;
                self.history.push(Vec::new());
                self.actors.push(Vec::new());
                for seat in 0..self.num_players() {
                    self.pending[seat] = self.can_act(seat);
                }
                self.awaiting_cards = true;
            }
        }
    }

    /// Reveal the current street's board cards from a complete runout.
    ///
    /// `full_board` must hold at least [`Street::board_len`] cards for the
    /// current street; extra cards are ignored.
    pub fn reveal(&mut self, full_board: &[Card]) {
        if !self.awaiting_cards {
            return;
        }
        let need = self.street.board_len().min(full_board.len());
        self.board.clear();
        self.board.extend_from_slice(&full_board[..need]);
        self.awaiting_cards = false;

        let able = (0..self.num_players()).filter(|&s| self.can_act(s)).count();
        if able <= 1 {
            // Nobody left to bet against: run the board out.
            self.end_round();
            return;
        }
        self.to_act = self.first_actor();
        let mut snapshot = self.clone();
        snapshot.round_start = None;
        self.round_start = Some(Arc::new(snapshot));
    }

    /// Net chips won by each seat (chips won minus chips committed).
    ///
    /// Uncontested pots go to the last player standing. Otherwise the pot is
    /// split into side pots by commitment level; folded chips are dead money
    /// in every level they reached. `board` must be complete at showdown.
    pub fn utilities<E: ShowdownEvaluator + ?Sized>(
        &self,
        hands: &[HoleCards],
        board: &[Card],
        evaluator: &E,
    ) -> Vec<f64> {
        let n = self.num_players();
        let mut won = vec![0.0; n];
        let live: Vec<usize> = (0..n).filter(|&s| !self.folded[s]).collect();

        if live.len() == 1 {
            won[live[0]] = self.pot();
        } else {
            let ranks: Vec<_> = (0..n)
                .map(|s| evaluator.rank(&hands[s], board))
                .collect();
            let mut levels: Vec<f64> = self.committed.clone();
            levels.sort_by(f64::total_cmp);
            levels.dedup();

            let mut floor = 0.0;
            for level in levels {
                let band: f64 = self
                    .committed
                    .iter()
                    .map(|&c| c.min(level) - c.min(floor))
                    .sum();
                let mut eligible: Vec<usize> = live
                    .iter()
                    .copied()
                    .filter(|&s| self.committed[s] >= level)
                    .collect();
                if eligible.is_empty() {
                    // Only folded chips reached this level.
                    eligible = live.clone();
                }
                let best = eligible.iter().map(|&s| ranks[s]).max();
                let winners: Vec<usize> = eligible
                    .into_iter()
                    .filter(|&s| Some(ranks[s]) == best)
                    .collect();
                let share = band / winners.len() as f64;
                for s in winners {
                    won[s] += share;
                }
                floor = level;
            }
        }

        (0..n).map(|s| won[s] - self.committed[s]).collect()
    }
}

impl fmt::Debug for HandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandState")
            .field("street", &self.street)
            .field("phase", &self.phase())
            .field("pot", &self.pot())
            .field("stacks", &self.stacks)
            .field("board", &self.board)
            .field("history", &self.history)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{parse_cards, RankEvaluator};
    use approx::assert_relative_eq;

    fn hu() -> HandState {
        HandState::new(&TableRules::heads_up(100.0)).unwrap()
    }

    fn board() -> Vec<Card> {
        parse_cards("Ah7c2d9sKs").unwrap()
    }

    #[test]
    fn test_blinds_and_first_actor() {
        let state = hu();
        assert_relative_eq!(state.pot(), 1.5);
        assert_eq!(state.current_player(), Some(0));
        assert_relative_eq!(state.to_call(0), 0.5);
        assert!(state.round_start().is_some());
    }

    #[test]
    fn test_fold_is_half_pot_with_equal_contributions() {
        let abstraction = ActionAbstraction::default();
        let state = hu().apply(AbstractAction::CheckCall);
        // Big blind raises, button folds.
        let raise = state.legal_actions(&abstraction)[1];
        let state = state.apply(raise).apply(AbstractAction::Fold);
        assert!(state.is_terminal());
        let hands: Vec<HoleCards> = vec!["2c3d".parse().unwrap(), "4c5d".parse().unwrap()];
        let u = state.utilities(&hands, &[], &RankEvaluator);
        assert_relative_eq!(u[0], -1.0);
        assert_relative_eq!(u[1], 1.0);
        assert_relative_eq!(u[0] + u[1], 0.0);
    }

    #[test]
    fn test_limp_check_reaches_flop_chance() {
        let state = hu()
            .apply(AbstractAction::CheckCall)
            .apply(AbstractAction::CheckCall);
        assert_eq!(state.phase(), Phase::Chance);
        assert_eq!(state.street(), Street::Flop);

        let mut state = state;
        state.reveal(&board());
        assert_eq!(state.board().len(), 3);
        // Big blind acts first postflop heads-up.
        assert_eq!(state.current_player(), Some(1));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn test_check_down_to_showdown() {
        let mut state = hu()
            .apply(AbstractAction::CheckCall)
            .apply(AbstractAction::CheckCall);
        for _ in 0..3 {
            state.reveal(&board());
            state = state
                .apply(AbstractAction::CheckCall)
                .apply(AbstractAction::CheckCall);
        }
        assert!(state.is_terminal());
        let hands: Vec<HoleCards> = vec!["AsAd".parse().unwrap(), "QcJc".parse().unwrap()];
        let u = state.utilities(&hands, &board(), &RankEvaluator);
        assert_relative_eq!(u[0], 1.0);
        assert_relative_eq!(u[1], -1.0);
    }

    #[test]
    fn test_all_in_runs_out_to_river() {
        let mut state = hu()
            .apply(AbstractAction::AllIn)
            .apply(AbstractAction::CheckCall);
        let mut reveals = 0;
        while state.phase() == Phase::Chance {
            state.reveal(&board());
            reveals += 1;
        }
        assert_eq!(reveals, 3);
        assert!(state.is_terminal());
        assert_eq!(state.board().len(), 5);
        let hands: Vec<HoleCards> = vec!["QcJc".parse().unwrap(), "AsAd".parse().unwrap()];
        let u = state.utilities(&hands, state.board(), &RankEvaluator);
        assert_relative_eq!(u[1], 100.0);
        assert_relative_eq!(u[0], -100.0);
    }

    #[test]
    fn test_split_pot() {
        let state = hu()
            .apply(AbstractAction::AllIn)
            .apply(AbstractAction::CheckCall);
        let hands: Vec<HoleCards> = vec!["2c3d".parse().unwrap(), "2d3c".parse().unwrap()];
        let board = parse_cards("AhKhQhJhTh").unwrap();
        let u = state.utilities(&hands, &board, &RankEvaluator);
        assert_relative_eq!(u[0], 0.0);
        assert_relative_eq!(u[1], 0.0);
    }

    #[test]
    fn test_side_pot_with_short_stack() {
        let rules = TableRules::default().with_players(3);
        let mut state = HandState::new(&rules).unwrap();
        // Shrink the small blind's stack to create a side pot.
        state.stacks[1] = 9.5;
        state.apply_mut(AbstractAction::AllIn); // button jams 100
        state.apply_mut(AbstractAction::AllIn); // sb jams 10 total
        state.apply_mut(AbstractAction::CheckCall); // bb calls 100
        while state.phase() == Phase::Chance {
            state.reveal(&board());
        }
        assert!(state.is_terminal());
        let hands: Vec<HoleCards> = vec![
            "QcJc".parse().unwrap(),
            "AsAd".parse().unwrap(),
            "KcKd".parse().unwrap(),
        ];
        let u = state.utilities(&hands, &board(), &RankEvaluator);
        // SB wins the 30 main pot, BB wins the 180 side pot.
        assert_relative_eq!(u[1], 20.0);
        assert_relative_eq!(u[2], 80.0);
        assert_relative_eq!(u[0], -100.0);
        assert_relative_eq!(u.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_raise_reopens_action() {
        let abstraction = ActionAbstraction::default();
        let mut state = hu().apply(AbstractAction::CheckCall);
        let bet = *state
            .legal_actions(&abstraction)
            .iter()
            .find(|a| matches!(a, AbstractAction::Bet(_)))
            .unwrap();
        state = state.apply(bet);
        assert_eq!(state.current_player(), Some(0));
        assert!(state.legal_actions(&abstraction).contains(&AbstractAction::Fold));
        assert_eq!(state.raises(), 1);
    }

    #[test]
    fn test_short_all_in_does_not_reopen_raising() {
        let abstraction = ActionAbstraction::default();
        let mut state = HandState::new(&TableRules::default().with_players(3)).unwrap();
        state.stacks[1] = 2.0;

        assert_eq!(state.current_player(), Some(0));
        state.apply_mut(AbstractAction::bet(1.0)); // button min-raises to 2
        assert_relative_eq!(state.current_bet(), 2.0);
        assert_eq!(state.current_player(), Some(1));
        state.apply_mut(AbstractAction::AllIn); // sb shoves 2.5, half a raise

        // The big blind has not acted yet and keeps every option.
        assert_eq!(state.current_player(), Some(2));
        let bb = state.legal_actions(&abstraction);
        assert!(bb.iter().any(|a| matches!(a, AbstractAction::Bet(_) | AbstractAction::AllIn)));
        state.apply_mut(AbstractAction::CheckCall);

        // The button already acted: call or fold only.
        assert_eq!(state.current_player(), Some(0));
        assert_relative_eq!(state.to_call(0), 0.5);
        assert_eq!(
            state.legal_actions(&abstraction),
            vec![AbstractAction::Fold, AbstractAction::CheckCall]
        );
        state.apply_mut(AbstractAction::CheckCall);
        assert_eq!(state.street(), Street::Flop);
    }

    #[test]
    fn test_full_raise_reopens_after_short_all_in() {
        let abstraction = ActionAbstraction::default();
        let mut state = HandState::new(&TableRules::default().with_players(3)).unwrap();
        state.stacks[1] = 2.0;
        state.apply_mut(AbstractAction::bet(1.0));
        state.apply_mut(AbstractAction::AllIn);
        state.apply_mut(AbstractAction::bet(1.0)); // big blind makes a full raise

        assert_eq!(state.current_player(), Some(0));
        assert!(state
            .legal_actions(&abstraction)
            .iter()
            .any(|a| matches!(a, AbstractAction::Bet(_))));
    }

    #[test]
    fn test_replay_validates_actions() {
        let rules = TableRules::heads_up(100.0);
        let abstraction = ActionAbstraction::default();
        let history = vec![
            vec![AbstractAction::CheckCall, AbstractAction::CheckCall],
            vec![AbstractAction::CheckCall],
        ];
        let state = HandState::replay(&rules, &abstraction, &history, &board()).unwrap();
        assert_eq!(state.street(), Street::Flop);
        assert_eq!(state.current_player(), Some(0));

        let bad = vec![vec![AbstractAction::bet(0.33), AbstractAction::bet(7.0)]];
        assert!(matches!(
            HandState::replay(&rules, &abstraction, &bad, &[]),
            Err(GameError::IllegalAction { .. })
        ));

        let short = HandState::replay(&rules, &abstraction, &history, &board()[..2]);
        assert!(matches!(short, Err(GameError::MissingBoard { .. })));
    }
}
