//! Cards, hole cards, streets and the deck.
//!
//! Cards are packed into a single byte (`rank * 4 + suit`) so that hands,
//! boards and dead-card sets stay cheap to copy inside tree traversals.

pub mod eval;

pub use eval::{evaluate, HandCategory, HandRank, RankEvaluator, ShowdownEvaluator};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const RANK_CHARS: [char; 13] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A',
];
const SUIT_CHARS: [char; 4] = ['c', 'd', 'h', 's'];

/// A single playing card.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card(u8);

impl Card {
    /// Build a card from rank (0 = deuce .. 12 = ace) and suit (0..4).
    pub fn new(rank: u8, suit: u8) -> Self {
        debug_assert!(rank < 13 && suit < 4);
        Self(rank * 4 + suit)
    }

    /// Build a card from its packed id (0..52).
    pub fn from_id(id: u8) -> Self {
        debug_assert!(id < 52);
        Self(id)
    }

    /// Packed id in 0..52.
    pub fn id(&self) -> u8 {
        self.0
    }

    /// Rank, 0 = deuce .. 12 = ace.
    pub fn rank(&self) -> u8 {
        self.0 / 4
    }

    /// Suit in 0..4.
    pub fn suit(&self) -> u8 {
        self.0 % 4
    }
}

impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(r), Some(su), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("card must be two characters: {s:?}"));
        };
        let rank = RANK_CHARS
            .iter()
            .position(|&c| c == r.to_ascii_uppercase())
            .ok_or_else(|| format!("bad rank in {s:?}"))?;
        let suit = SUIT_CHARS
            .iter()
            .position(|&c| c == su.to_ascii_lowercase())
            .ok_or_else(|| format!("bad suit in {s:?}"))?;
        Ok(Card::new(rank as u8, suit as u8))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            RANK_CHARS[self.rank() as usize],
            SUIT_CHARS[self.suit() as usize]
        )
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Parse a run of concatenated cards such as `"AsKd7c"`.
pub fn parse_cards(s: &str) -> Result<Vec<Card>, String> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(format!("odd number of characters in {s:?}"));
    }
    let mut cards = Vec::with_capacity(s.len() / 2);
    for i in (0..s.len()).step_by(2) {
        let card: Card = s
            .get(i..i + 2)
            .ok_or_else(|| format!("non-ascii card string {s:?}"))?
            .parse()?;
        if cards.contains(&card) {
            return Err(format!("duplicate card {card} in {s:?}"));
        }
        cards.push(card);
    }
    Ok(cards)
}

/// A player's two private cards, stored high card first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoleCards([Card; 2]);

impl HoleCards {
    /// Create hole cards (order-insensitive).
    pub fn new(a: Card, b: Card) -> Self {
        debug_assert_ne!(a, b);
        if a >= b {
            Self([a, b])
        } else {
            Self([b, a])
        }
    }

    /// Both cards, high first.
    pub fn cards(&self) -> [Card; 2] {
        self.0
    }

    /// Whether either card equals `card`.
    pub fn contains(&self, card: Card) -> bool {
        self.0[0] == card || self.0[1] == card
    }

    /// Whether the two holdings share a card.
    pub fn overlaps(&self, other: &HoleCards) -> bool {
        other.contains(self.0[0]) || other.contains(self.0[1])
    }

    /// Whether either card appears in `cards`.
    pub fn collides_with(&self, cards: &[Card]) -> bool {
        cards.iter().any(|&c| self.contains(c))
    }

    /// Index of the 169 strategically distinct preflop classes.
    ///
    /// Pairs occupy 0..13, suited hands 13..91 and offsuit hands 91..169.
    pub fn hand_class_index(&self) -> u16 {
        let hi = self.0[0].rank().max(self.0[1].rank()) as u16;
        let lo = self.0[0].rank().min(self.0[1].rank()) as u16;
        if hi == lo {
            return hi;
        }
        let tri = hi * (hi - 1) / 2 + lo;
        if self.0[0].suit() == self.0[1].suit() {
            13 + tri
        } else {
            91 + tri
        }
    }
}

impl FromStr for HoleCards {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_cards(s)?.as_slice() {
            [a, b] => Ok(HoleCards::new(*a, *b)),
            _ => Err(format!("hole cards need exactly two cards: {s:?}")),
        }
    }
}

impl fmt::Display for HoleCards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0], self.0[1])
    }
}

impl fmt::Debug for HoleCards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Betting round.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Street {
    /// No community cards.
    Preflop,
    /// Three community cards.
    Flop,
    /// Four community cards.
    Turn,
    /// Five community cards; the final street.
    River,
}

impl Street {
    /// All streets in order.
    pub const ALL: [Street; 4] = [Street::Preflop, Street::Flop, Street::Turn, Street::River];

    /// Next street, `None` after the river.
    pub fn next(&self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }

    /// Street index (0..4).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Number of board cards visible on this street.
    pub fn board_len(&self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 3,
            Street::Turn => 4,
            Street::River => 5,
        }
    }

    /// Upper-case name used inside infoset keys.
    pub fn name(&self) -> &'static str {
        match self {
            Street::Preflop => "PREFLOP",
            Street::Flop => "FLOP",
            Street::Turn => "TURN",
            Street::River => "RIVER",
        }
    }

    /// Inverse of [`Street::name`].
    pub fn from_name(name: &str) -> Option<Street> {
        Street::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Street implied by a board of `len` cards.
    pub fn from_board_len(len: usize) -> Option<Street> {
        Street::ALL.into_iter().find(|s| s.board_len() == len)
    }
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A deck of the cards not yet dealt.
#[derive(Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Full 52-card deck in id order.
    pub fn new() -> Self {
        Self {
            cards: (0..52).map(Card::from_id).collect(),
        }
    }

    /// Deck with `dead` cards removed.
    pub fn without(dead: &[Card]) -> Self {
        Self {
            cards: (0..52)
                .map(Card::from_id)
                .filter(|c| !dead.contains(c))
                .collect(),
        }
    }

    /// Shuffle the remaining cards in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    /// Deal one card from the top.
    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Deal hole cards from the top.
    pub fn deal_hole(&mut self) -> Option<HoleCards> {
        let a = self.deal()?;
        let b = self.deal()?;
        Some(HoleCards::new(a, b))
    }

    /// Remove a specific card if it is still in the deck.
    pub fn remove(&mut self, card: Card) -> bool {
        match self.cards.iter().position(|&c| c == card) {
            Some(i) => {
                self.cards.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Cards left to deal.
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Remaining cards.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deck({} cards)", self.cards.len())
    }
}
