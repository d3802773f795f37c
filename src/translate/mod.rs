//! Translation between abstract actions and table actions.
//!
//! [`ActionTranslator::to_client`] turns an abstract action into a legal
//! wager; [`ActionTranslator::to_discrete`] maps an observed wager back onto
//! the abstraction. A round trip must never yield an illegal action, nor
//! change the action type by more than the configured EV distance;
//! [`TranslatorMetrics`] tracks both.

pub mod translator;

pub use translator::{
    ActionKind, ActionTranslator, ConcreteAction, RoundTrip, TableConstraints, TableSpot,
    TranslateError, TranslatorMetrics,
};
