//! Showdown hand ranking.
//!
//! Ranks 5 to 7 card hands with per-suit rank bitmasks and rank counts. The
//! resulting [`HandRank`] packs the category into the high bits followed by up
//! to five 4-bit kickers, so plain integer comparison orders hands correctly.

use super::{Card, HoleCards};
use std::fmt;

/// Made-hand category, worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandCategory {
    /// No pair.
    HighCard = 0,
    /// One pair.
    OnePair = 1,
    /// Two pair.
    TwoPair = 2,
    /// Three of a kind.
    ThreeOfAKind = 3,
    /// Five consecutive ranks.
    Straight = 4,
    /// Five cards of one suit.
    Flush = 5,
    /// Trips plus a pair.
    FullHouse = 6,
    /// Four of a kind.
    FourOfAKind = 7,
    /// Straight in one suit.
    StraightFlush = 8,
}

impl HandCategory {
    /// Number of categories.
    pub const COUNT: u32 = 9;

    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => HandCategory::OnePair,
            2 => HandCategory::TwoPair,
            3 => HandCategory::ThreeOfAKind,
            4 => HandCategory::Straight,
            5 => HandCategory::Flush,
            6 => HandCategory::FullHouse,
            7 => HandCategory::FourOfAKind,
            8 => HandCategory::StraightFlush,
            _ => HandCategory::HighCard,
        }
    }
}

/// Comparable hand strength. Higher is better.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandRank(u32);

impl HandRank {
    fn new(category: HandCategory, kickers: &[u8]) -> Self {
        let mut value = (category as u32) << 20;
        for (i, &k) in kickers.iter().take(5).enumerate() {
            value |= (k as u32) << (16 - i * 4);
        }
        Self(value)
    }

    /// Raw packed value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Made-hand category.
    pub fn category(&self) -> HandCategory {
        HandCategory::from_bits(self.0 >> 20)
    }

    /// Rank of the defining card (pair rank, straight top, ...), 0..13.
    pub fn primary_rank(&self) -> u8 {
        ((self.0 >> 16) & 0xF) as u8
    }
}

impl fmt::Debug for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandRank({:?}, {:#07x})", self.category(), self.0 & 0xFFFFF)
    }
}

/// Top rank of a straight contained in `mask`, if any. Handles the wheel.
fn straight_high(mask: u16) -> Option<u8> {
    // Bit i+1 holds rank i; bit 0 repeats the ace for A-2-3-4-5.
    let m = ((mask as u32) << 1) | ((mask as u32 >> 12) & 1);
    (4..=13u32)
        .rev()
        .find(|&hi| (m >> (hi - 4)) & 0x1F == 0x1F)
        .map(|hi| (hi - 1) as u8)
}

fn top_ranks(mask: u16, n: usize) -> Vec<u8> {
    (0..13u8).rev().filter(|r| mask & (1 << r) != 0).take(n).collect()
}

/// Rank the best five-card hand among `cards` (5 to 7 cards).
pub fn evaluate(cards: &[Card]) -> HandRank {
    debug_assert!((5..=7).contains(&cards.len()));

    let mut counts = [0u8; 13];
    let mut suit_masks = [0u16; 4];
    let mut rank_mask = 0u16;
    for card in cards {
        counts[card.rank() as usize] += 1;
        suit_masks[card.suit() as usize] |= 1 << card.rank();
        rank_mask |= 1 << card.rank();
    }

    if let Some(&flush_mask) = suit_masks.iter().find(|m| m.count_ones() >= 5) {
        if let Some(hi) = straight_high(flush_mask) {
            return HandRank::new(HandCategory::StraightFlush, &[hi]);
        }
    }

    let mut quads = Vec::new();
    let mut trips = Vec::new();
    let mut pairs = Vec::new();
    for rank in (0..13u8).rev() {
        match counts[rank as usize] {
            4 => quads.push(rank),
            3 => trips.push(rank),
            2 => pairs.push(rank),
            _ => {}
        }
    }

    if let Some(&q) = quads.first() {
        let kicker = top_ranks(rank_mask & !(1 << q), 1);
        return HandRank::new(HandCategory::FourOfAKind, &[q, kicker[0]]);
    }

    if let Some(&t) = trips.first() {
        // A second set of trips plays as the pair.
        let pair = trips.get(1).copied().into_iter().chain(pairs.first().copied()).max();
        if let Some(p) = pair {
            return HandRank::new(HandCategory::FullHouse, &[t, p]);
        }
    }

    if let Some(&flush_mask) = suit_masks.iter().find(|m| m.count_ones() >= 5) {
        return HandRank::new(HandCategory::Flush, &top_ranks(flush_mask, 5));
    }

    if let Some(hi) = straight_high(rank_mask) {
        return HandRank::new(HandCategory::Straight, &[hi]);
    }

    if let Some(&t) = trips.first() {
        let kickers = top_ranks(rank_mask & !(1 << t), 2);
        return HandRank::new(HandCategory::ThreeOfAKind, &[t, kickers[0], kickers[1]]);
    }

    if pairs.len() >= 2 {
        let (hi, lo) = (pairs[0], pairs[1]);
        let kicker = top_ranks(rank_mask & !(1 << hi) & !(1 << lo), 1);
        return HandRank::new(HandCategory::TwoPair, &[hi, lo, kicker[0]]);
    }

    if let Some(&p) = pairs.first() {
        let mut ranks = vec![p];
        ranks.extend(top_ranks(rank_mask & !(1 << p), 3));
        return HandRank::new(HandCategory::OnePair, &ranks);
    }

    HandRank::new(HandCategory::HighCard, &top_ranks(rank_mask, 5))
}

/// Showdown evaluation collaborator.
///
/// The solver only needs a total order over hands at showdown; swapping in a
/// table-driven evaluator is a matter of implementing this trait.
pub trait ShowdownEvaluator: Send + Sync {
    /// Strength of `hole` combined with a complete five-card `board`.
    fn rank(&self, hole: &HoleCards, board: &[Card]) -> HandRank;
}

/// Direct evaluator built on [`evaluate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RankEvaluator;

impl ShowdownEvaluator for RankEvaluator {
    fn rank(&self, hole: &HoleCards, board: &[Card]) -> HandRank {
        let mut cards = Vec::with_capacity(7);
        cards.extend_from_slice(&hole.cards());
        cards.extend_from_slice(board);
        evaluate(&cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_cards;

    fn rank(s: &str) -> HandRank {
        evaluate(&parse_cards(s).unwrap())
    }

    #[test]
    fn test_categories() {
        assert_eq!(rank("AsKsQsJsTs").category(), HandCategory::StraightFlush);
        assert_eq!(rank("9c9d9h9s2c").category(), HandCategory::FourOfAKind);
        assert_eq!(rank("9c9d9h2s2c").category(), HandCategory::FullHouse);
        assert_eq!(rank("Ac9c7c4c2c").category(), HandCategory::Flush);
        assert_eq!(rank("5c4d3h2sAc").category(), HandCategory::Straight);
        assert_eq!(rank("9c9d9h5s2c").category(), HandCategory::ThreeOfAKind);
        assert_eq!(rank("9c9d5h5s2c").category(), HandCategory::TwoPair);
        assert_eq!(rank("9c9d6h5s2c").category(), HandCategory::OnePair);
        assert_eq!(rank("Kc9d6h5s2c").category(), HandCategory::HighCard);
    }

    #[test]
    fn test_wheel_loses_to_six_high_straight() {
        assert!(rank("6c5d4h3s2c") > rank("5c4d3h2sAc"));
        assert_eq!(rank("5c4d3h2sAc").primary_rank(), 3);
    }

    #[test]
    fn test_seven_card_best_five() {
        // Two sets of trips make a full house with the higher trips on top.
        let r = rank("9c9d9h5s5c5dAs");
        assert_eq!(r.category(), HandCategory::FullHouse);
        assert_eq!(r.primary_rank(), 7);

        // Kicker decides between equal pairs.
        assert!(rank("AcAdKh7s4c2d3h") > rank("AhAsQh7s4c2d3h"));
    }

    #[test]
    fn test_evaluator_trait() {
        let hole: HoleCards = "AsAd".parse().unwrap();
        let board = parse_cards("Ac7h2d9s4c").unwrap();
        let r = RankEvaluator.rank(&hole, &board);
        assert_eq!(r.category(), HandCategory::ThreeOfAKind);
    }
}
