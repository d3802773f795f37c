//! State and action abstraction.
//!
//! Turns a concrete decision point into a compact information set key and a
//! finite action set:
//!
//! - [`action`]: the closed [`AbstractAction`] enum and history encoding
//! - [`infoset`]: versioned and legacy [`InfosetKey`] formats
//! - [`action_set`]: street/position bet ladders ([`ActionAbstraction`])
//! - [`bucket`]: the [`HandBucketer`] collaborator and a default implementation

pub mod action;
pub mod action_set;
pub mod bucket;
pub mod infoset;

pub use action::{encode_action_history, encode_token_history, AbstractAction, BetSize};
pub use action_set::{ActionAbstraction, BettingSpot, StreetLadder};
pub use bucket::{BucketConfig, HandBucketer, StrengthBucketer};
pub use infoset::{encode_infoset, InfosetKey, KeyError, KeyFormat, KEY_VERSION};
