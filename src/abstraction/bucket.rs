//! Hand bucketing.
//!
//! The solver treats the bucketer as an opaque, deterministic oracle. Its
//! fingerprint is stored in every checkpoint so tables trained against one
//! bucketing are never loaded under another.

use serde::{Deserialize, Serialize};

use crate::cards::{evaluate, Card, HandCategory, HoleCards, Street};
use crate::cfr::ConfigError;

/// Hand abstraction collaborator.
pub trait HandBucketer: Send + Sync {
    /// Bucket for `hole` on `board` at `street`.
    fn bucket(
        &self,
        hole: &HoleCards,
        board: &[Card],
        street: Street,
        pot: f64,
        stack: f64,
        in_position: bool,
    ) -> u32;

    /// Number of distinct buckets a street can produce.
    fn num_buckets(&self, street: Street) -> u32;

    /// Stable description of the bucketing configuration.
    fn fingerprint(&self) -> String;
}

/// Bucketing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Postflop sub-buckets per made-hand category.
    pub postflop_sub_buckets: u32,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            postflop_sub_buckets: 4,
        }
    }
}

impl BucketConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=13).contains(&self.postflop_sub_buckets) {
            return Err(ConfigError::InvalidValue {
                field: "bucketing.postflop_sub_buckets",
                reason: format!("{} not in 1..=13", self.postflop_sub_buckets),
            });
        }
        Ok(())
    }
}

/// Strength-based bucketer.
///
/// Preflop hands map to their 169 strategic classes. Postflop hands map to
/// their made-hand category, split by the rank of the card that defines it.
#[derive(Debug, Clone)]
pub struct StrengthBucketer {
    sub_buckets: u32,
}

impl StrengthBucketer {
    /// Create from configuration.
    pub fn new(config: &BucketConfig) -> Self {
        Self {
            sub_buckets: config.postflop_sub_buckets.clamp(1, 13),
        }
    }
}

impl Default for StrengthBucketer {
    fn default() -> Self {
        Self::new(&BucketConfig::default())
    }
}

impl HandBucketer for StrengthBucketer {
    fn bucket(
        &self,
        hole: &HoleCards,
        board: &[Card],
        street: Street,
        _pot: f64,
        _stack: f64,
        _in_position: bool,
    ) -> u32 {
        if street == Street::Preflop || board.len() < 3 {
            return hole.hand_class_index() as u32;
        }
        let mut cards = Vec::with_capacity(7);
        cards.extend_from_slice(&hole.cards());
        cards.extend_from_slice(board);
        let rank = evaluate(&cards);
        let sub = rank.primary_rank() as u32 * self.sub_buckets / 13;
        rank.category() as u32 * self.sub_buckets + sub
    }

    fn num_buckets(&self, street: Street) -> u32 {
        match street {
            Street::Preflop => 169,
            _ => HandCategory::COUNT * self.sub_buckets,
        }
    }

    fn fingerprint(&self) -> String {
        format!(
            "strength/pre169/post{}x{}",
            HandCategory::COUNT,
            self.sub_buckets
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_cards;

    #[test]
    fn test_preflop_uses_hand_classes() {
        let bucketer = StrengthBucketer::default();
        let aces: HoleCards = "AsAd".parse().unwrap();
        let other_aces: HoleCards = "AcAh".parse().unwrap();
        let b1 = bucketer.bucket(&aces, &[], Street::Preflop, 1.5, 100.0, true);
        let b2 = bucketer.bucket(&other_aces, &[], Street::Preflop, 1.5, 100.0, false);
        assert_eq!(b1, b2);
        assert!(b1 < bucketer.num_buckets(Street::Preflop));
    }

    #[test]
    fn test_postflop_orders_by_strength() {
        let bucketer = StrengthBucketer::default();
        let board = parse_cards("Ah7c2d").unwrap();
        let set: HoleCards = "7s7d".parse().unwrap();
        let top_pair: HoleCards = "AdKc".parse().unwrap();
        let air: HoleCards = "QsJs".parse().unwrap();
        let b_set = bucketer.bucket(&set, &board, Street::Flop, 10.0, 90.0, true);
        let b_pair = bucketer.bucket(&top_pair, &board, Street::Flop, 10.0, 90.0, true);
        let b_air = bucketer.bucket(&air, &board, Street::Flop, 10.0, 90.0, true);
        assert!(b_set > b_pair);
        assert!(b_pair > b_air);
        for b in [b_set, b_pair, b_air] {
            assert!(b < bucketer.num_buckets(Street::Flop));
        }
    }

    #[test]
    fn test_fingerprint_tracks_config() {
        let a = StrengthBucketer::new(&BucketConfig { postflop_sub_buckets: 4 });
        let b = StrengthBucketer::new(&BucketConfig { postflop_sub_buckets: 6 });
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), StrengthBucketer::default().fingerprint());
    }
}
