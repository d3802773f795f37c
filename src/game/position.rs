//! Explicit seat and position tracking for 2 to 6 players.
//!
//! Seats are absolute indices `0..n`. Positions are assigned by each seat's
//! offset clockwise from the button, and acting order is read off a fixed
//! table per street rather than derived from history length.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cards::Street;
use crate::cfr::ConfigError;

/// Smallest supported table.
pub const MIN_PLAYERS: usize = 2;
/// Largest supported table.
pub const MAX_PLAYERS: usize = 6;

/// Named table position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Heads-up button, which also posts the small blind.
    ButtonSmallBlind,
    /// Button.
    Button,
    /// Small blind.
    SmallBlind,
    /// Big blind.
    BigBlind,
    /// Under the gun.
    UnderTheGun,
    /// Hijack.
    Hijack,
    /// Cutoff.
    Cutoff,
}

impl Position {
    /// Short label.
    pub fn label(&self) -> &'static str {
        match self {
            Position::ButtonSmallBlind => "BTN/SB",
            Position::Button => "BTN",
            Position::SmallBlind => "SB",
            Position::BigBlind => "BB",
            Position::UnderTheGun => "UTG",
            Position::Hijack => "HJ",
            Position::Cutoff => "CO",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Seat layout of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatTable {
    num_players: usize,
    button: usize,
}

impl SeatTable {
    /// Table of `num_players` with the button on seat `button`.
    pub fn new(num_players: usize, button: usize) -> Result<Self, ConfigError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
            return Err(ConfigError::InvalidValue {
                field: "table.num_players",
                reason: format!("{num_players} not in {MIN_PLAYERS}..={MAX_PLAYERS}"),
            });
        }
        if button >= num_players {
            return Err(ConfigError::InvalidValue {
                field: "table.button",
                reason: format!("seat {button} does not exist at a {num_players}-handed table"),
            });
        }
        Ok(Self {
            num_players,
            button,
        })
    }

    /// Number of seats.
    pub fn num_players(&self) -> usize {
        self.num_players
    }

    /// Button seat.
    pub fn button(&self) -> usize {
        self.button
    }

    fn seat_at(&self, offset: usize) -> usize {
        (self.button + offset) % self.num_players
    }

    fn offset_of(&self, seat: usize) -> usize {
        (seat + self.num_players - self.button) % self.num_players
    }

    /// Seat posting the small blind.
    pub fn small_blind_seat(&self) -> usize {
        if self.num_players == 2 {
            self.button
        } else {
            self.seat_at(1)
        }
    }

    /// Seat posting the big blind.
    pub fn big_blind_seat(&self) -> usize {
        if self.num_players == 2 {
            self.seat_at(1)
        } else {
            self.seat_at(2)
        }
    }

    /// Position of a seat.
    pub fn position(&self, seat: usize) -> Position {
        let offset = self.offset_of(seat);
        match (self.num_players, offset) {
            (2, 0) => Position::ButtonSmallBlind,
            (2, _) => Position::BigBlind,
            (_, 0) => Position::Button,
            (_, 1) => Position::SmallBlind,
            (_, 2) => Position::BigBlind,
            (_, 3) => Position::UnderTheGun,
            (6, 4) => Position::Hijack,
            _ => Position::Cutoff,
        }
    }

    /// Seats in acting order for a street.
    ///
    /// Preflop starts left of the big blind (the button heads-up); postflop
    /// starts left of the button.
    pub fn acting_order(&self, street: Street) -> Vec<usize> {
        let first = match (street, self.num_players) {
            (Street::Preflop, 2) => 0,
            (Street::Preflop, n) => 3 % n,
            (_, _) => 1,
        };
        (0..self.num_players)
            .map(|i| self.seat_at(first + i))
            .collect()
    }

    /// Whether `seat` acts last postflop among the seats still in the hand.
    pub fn in_position(&self, seat: usize, in_hand: &[bool]) -> bool {
        self.acting_order(Street::Flop)
            .into_iter()
            .filter(|&s| in_hand.get(s).copied().unwrap_or(false))
            .last()
            == Some(seat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heads_up_layout() {
        let table = SeatTable::new(2, 0).unwrap();
        assert_eq!(table.position(0), Position::ButtonSmallBlind);
        assert_eq!(table.position(1), Position::BigBlind);
        assert_eq!(table.small_blind_seat(), 0);
        assert_eq!(table.big_blind_seat(), 1);
        assert_eq!(table.acting_order(Street::Preflop), vec![0, 1]);
        assert_eq!(table.acting_order(Street::River), vec![1, 0]);
        assert!(table.in_position(0, &[true, true]));
        assert!(!table.in_position(1, &[true, true]));
    }

    #[test]
    fn test_six_max_layout() {
        let table = SeatTable::new(6, 2).unwrap();
        let labels: Vec<_> = (0..6).map(|s| table.position(s).label()).collect();
        assert_eq!(labels, vec!["HJ", "CO", "BTN", "SB", "BB", "UTG"]);
        assert_eq!(table.acting_order(Street::Preflop), vec![5, 0, 1, 2, 3, 4]);
        assert_eq!(table.acting_order(Street::Flop), vec![3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_three_handed_button_opens() {
        let table = SeatTable::new(3, 0).unwrap();
        assert_eq!(table.position(0), Position::Button);
        assert_eq!(table.acting_order(Street::Preflop), vec![0, 1, 2]);
        assert_eq!(table.acting_order(Street::Turn), vec![1, 2, 0]);
    }

    #[test]
    fn test_five_and_four_handed_positions() {
        let five = SeatTable::new(5, 0).unwrap();
        assert_eq!(five.position(3), Position::UnderTheGun);
        assert_eq!(five.position(4), Position::Cutoff);
        let four = SeatTable::new(4, 0).unwrap();
        assert_eq!(four.position(3), Position::UnderTheGun);
    }

    #[test]
    fn test_in_position_skips_folded_seats() {
        let table = SeatTable::new(6, 0).unwrap();
        let mut in_hand = vec![true; 6];
        assert!(table.in_position(0, &in_hand));
        in_hand[0] = false;
        // Cutoff closes the action once the button is gone.
        assert!(table.in_position(5, &in_hand));
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(SeatTable::new(1, 0).is_err());
        assert!(SeatTable::new(7, 0).is_err());
        assert!(SeatTable::new(3, 3).is_err());
    }
}
