//! # Blueprint Resolver
//!
//! Blueprint training and real-time resolving for no-limit hold'em.
//!
//! ## Features
//!
//! - **Outcome-sampling MCCFR**: linear weighting, lazy discounting, CFR+
//!   floor and negative-regret pruning
//! - **Checkpointing**: bit-exact resume, including the RNG stream
//! - **Blueprint**: immutable average-strategy snapshot, shareable via `Arc`
//! - **Subgame resolving**: warm-started, KL-regularized, time-boxed CFR on
//!   a depth-limited subgame, with blueprint fallback
//! - **Action translation**: abstract actions to legal table actions and back
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use blueprint_resolver::abstraction::{ActionAbstraction, StrengthBucketer};
//! use blueprint_resolver::cards::RankEvaluator;
//! use blueprint_resolver::cfr::{CFRConfig, OutcomeSampler};
//! use blueprint_resolver::game::TableRules;
//! use blueprint_resolver::resolve::{ResolverConfig, SubgameResolver};
//!
//! // 1. Train a blueprint
//! let mut sampler = OutcomeSampler::new(
//!     TableRules::heads_up(100.0),
//!     ActionAbstraction::default(),
//!     Arc::new(StrengthBucketer::default()),
//!     Arc::new(RankEvaluator),
//!     CFRConfig::default(),
//! )?;
//! sampler.train(100_000)?;
//! let blueprint = Arc::new(sampler.blueprint());
//!
//! // 2. Refine it at decision time
//! let resolver = SubgameResolver::new(
//!     ResolverConfig::default(),
//!     ActionAbstraction::default(),
//!     Arc::new(StrengthBucketer::default()),
//!     Arc::new(RankEvaluator),
//!     blueprint,
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Blueprint Training (offline)                   │
//! │  OutcomeSampler ─► RegretTracker ─► Checkpoint / Blueprint      │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               │ Arc<BlueprintPolicy>
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Real-time Resolving (online)                  │
//! │  Subgame ─► SubgameResolver ─► ResolvedStrategy                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               │ AbstractAction
//!                               ▼
//!                      ┌─────────────────┐
//!                      │ActionTranslator │ ─► legal table action
//!                      └─────────────────┘
//! ```

#![warn(missing_docs)]

/// Cards, streets and showdown evaluation.
pub mod cards;

/// Infoset keys, bet-size ladders and hand bucketing.
pub mod abstraction;

/// The abstract betting game.
pub mod game;

/// MCCFR blueprint training.
///
/// Sampler, regret storage, checkpoints and the published blueprint.
pub mod cfr;

/// Real-time depth-limited subgame resolving.
pub mod resolve;

/// Abstract to concrete action translation.
pub mod translate;

/// Settings file combining every component's configuration.
pub mod config;

// Re-export commonly used types at crate root for convenience
pub use cfr::{BlueprintPolicy, CFRConfig, CFRStats, OutcomeSampler, RegretTracker};
pub use config::SolverSettings;
pub use resolve::{ResolvedStrategy, SubgameResolver};
pub use translate::ActionTranslator;
