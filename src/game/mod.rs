//! The abstract betting game the solver trains on.

pub mod deal;
pub mod position;
pub mod state;

pub use deal::Deal;
pub use position::{Position, SeatTable, MAX_PLAYERS, MIN_PLAYERS};
pub use state::{GameError, HandState, Phase, TableRules};
