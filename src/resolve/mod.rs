//! Real-time subgame resolving.
//!
//! At decision time the blueprint's strategy for the current infoset is
//! refined by a short, time-boxed CFR solve of a depth-limited subgame:
//!
//! - [`Subgame`]: root, hero hand, opponent range and depth
//! - [`SubgameResolver`]: warm start, KL-regularized iterations, time check
//! - [`LeafEvaluator`]: optional external value at the depth limit, gated
//!   by [`LeafGate`], with [`BlueprintRollout`] as the fallback
//!
//! Resolving never fails at decision time:
//! [`SubgameResolver::resolve_or_blueprint`] falls back to the blueprint.

pub mod config;
pub mod leaf;
pub mod resolver;
pub mod subgame;

pub use config::{LeafGate, ResolverConfig};
pub use leaf::{BlueprintRollout, LeafEstimate, LeafEvaluator, LeafPolicy, LeafQuery};
pub use resolver::{kl_divergence, ResolveError, ResolvedStrategy, StrategySource, SubgameResolver};
pub use subgame::Subgame;
