//! Abstract betting actions.
//!
//! The abstract action set is a small closed enum. Bet sizes are stored as
//! whole percentages of the pot so actions stay hashable and totally ordered:
//! `Fold < CheckCall < Bet(33) < Bet(75) < ... < AllIn`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::infoset::KeyError;

/// A bet size expressed as a whole percentage of the pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BetSize(u16);

impl BetSize {
    /// Size from a percentage, e.g. `75` for three quarters of the pot.
    pub fn from_percent(percent: u16) -> Self {
        Self(percent)
    }

    /// Size from a pot fraction, rounded to the nearest percent.
    pub fn from_fraction(fraction: f64) -> Self {
        Self((fraction * 100.0).round().max(0.0) as u16)
    }

    /// Whole percent of pot.
    pub fn percent(&self) -> u16 {
        self.0
    }

    /// Pot fraction.
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// An abstract action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AbstractAction {
    /// Give up the hand. Only offered when facing a bet.
    Fold,
    /// Check when nothing is owed, otherwise call.
    CheckCall,
    /// Bet or raise a fraction of the pot.
    Bet(BetSize),
    /// Commit the remaining stack.
    AllIn,
}

impl AbstractAction {
    /// Bet of `fraction` times the pot.
    pub fn bet(fraction: f64) -> Self {
        AbstractAction::Bet(BetSize::from_fraction(fraction))
    }

    /// Short code used in action histories: `F`, `C`, `B75`, `A`.
    pub fn code(&self) -> String {
        match self {
            AbstractAction::Fold => "F".to_string(),
            AbstractAction::CheckCall => "C".to_string(),
            AbstractAction::Bet(size) => format!("B{}", size.percent()),
            AbstractAction::AllIn => "A".to_string(),
        }
    }

    /// Inverse of [`AbstractAction::code`].
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(AbstractAction::Fold),
            "C" => Some(AbstractAction::CheckCall),
            "A" => Some(AbstractAction::AllIn),
            _ => {
                let percent = code.strip_prefix('B')?.parse::<u16>().ok()?;
                Some(AbstractAction::Bet(BetSize::from_percent(percent)))
            }
        }
    }

    /// Pot fraction for bets, `None` otherwise.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            AbstractAction::Bet(size) => Some(size.fraction()),
            _ => None,
        }
    }

    /// Whether the action puts in more than a call.
    pub fn is_aggressive(&self) -> bool {
        matches!(self, AbstractAction::Bet(_) | AbstractAction::AllIn)
    }
}

impl fmt::Display for AbstractAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractAction::Fold => write!(f, "FOLD"),
            AbstractAction::CheckCall => write!(f, "CHECK_CALL"),
            AbstractAction::Bet(size) => write!(f, "BET_{}", size.fraction()),
            AbstractAction::AllIn => write!(f, "ALL_IN"),
        }
    }
}

impl FromStr for AbstractAction {
    type Err = KeyError;

    /// Accepts history codes (`F`, `C`, `B75`, `A`), display labels
    /// (`BET_0.75`) and loose tokens (`fold`, `check`, `call`, `allin`,
    /// `bet_0.75`, `raise_1.5`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(action) = AbstractAction::from_code(s) {
            return Ok(action);
        }
        let token = s.trim().to_ascii_lowercase();
        match token.as_str() {
            "fold" => return Ok(AbstractAction::Fold),
            "check" | "call" | "check_call" | "checkcall" => return Ok(AbstractAction::CheckCall),
            "allin" | "all_in" | "all-in" | "jam" => return Ok(AbstractAction::AllIn),
            _ => {}
        }
        let fraction = token
            .strip_prefix("bet_")
            .or_else(|| token.strip_prefix("raise_"))
            .and_then(|f| f.parse::<f64>().ok())
            .filter(|f| f.is_finite() && *f > 0.0)
            .ok_or_else(|| KeyError::BadAction(s.to_string()))?;
        Ok(AbstractAction::bet(fraction))
    }
}

impl From<AbstractAction> for String {
    fn from(action: AbstractAction) -> Self {
        action.code()
    }
}

impl TryFrom<String> for AbstractAction {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Abbreviate a run of abstract actions, e.g. `C-B75-C`.
///
/// The encoding depends only on the actions themselves, so it is stable
/// across processes and safe to use as a durable training key.
pub fn encode_action_history(actions: &[AbstractAction]) -> String {
    actions
        .iter()
        .map(AbstractAction::code)
        .collect::<Vec<_>>()
        .join("-")
}

/// Encode loosely written action tokens (`["check", "bet_0.75", "call"]`).
pub fn encode_token_history(tokens: &[&str]) -> Result<String, KeyError> {
    let actions = tokens
        .iter()
        .map(|t| t.parse::<AbstractAction>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(encode_action_history(&actions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for action in [
            AbstractAction::Fold,
            AbstractAction::CheckCall,
            AbstractAction::bet(0.33),
            AbstractAction::bet(1.5),
            AbstractAction::AllIn,
        ] {
            assert_eq!(AbstractAction::from_code(&action.code()), Some(action));
        }
        assert_eq!(AbstractAction::from_code("B"), None);
        assert_eq!(AbstractAction::from_code("X"), None);
    }

    #[test]
    fn test_total_order_is_canonical() {
        let mut actions = vec![
            AbstractAction::AllIn,
            AbstractAction::bet(1.0),
            AbstractAction::Fold,
            AbstractAction::bet(0.33),
            AbstractAction::CheckCall,
        ];
        actions.sort();
        assert_eq!(
            actions,
            vec![
                AbstractAction::Fold,
                AbstractAction::CheckCall,
                AbstractAction::bet(0.33),
                AbstractAction::bet(1.0),
                AbstractAction::AllIn,
            ]
        );
    }

    #[test]
    fn test_encode_history() {
        let history = [
            AbstractAction::CheckCall,
            AbstractAction::bet(0.75),
            AbstractAction::CheckCall,
        ];
        assert_eq!(encode_action_history(&history), "C-B75-C");
        assert_eq!(encode_action_history(&[]), "");
    }

    #[test]
    fn test_encode_tokens() {
        let encoded = encode_token_history(&["check", "bet_0.75", "raise_1.5", "allin", "fold"]);
        assert_eq!(encoded.unwrap(), "C-B75-B150-A-F");
        assert!(encode_token_history(&["shove_big"]).is_err());
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&AbstractAction::bet(0.75)).unwrap();
        assert_eq!(json, "\"B75\"");
        let back: AbstractAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AbstractAction::bet(0.75));
    }
}
