//! Blueprint training with Monte Carlo CFR.
//!
//! # Overview
//!
//! The blueprint is the time-averaged strategy of an outcome-sampling MCCFR
//! run over the abstract betting game:
//!
//! 1. [`OutcomeSampler`] samples one trajectory per player per iteration
//! 2. [`RegretTracker`] accumulates regrets and strategy weights, with lazy
//!    discounting and regret-based pruning decisions
//! 3. [`Trainer`] runs the sampler in chunks, checkpoints and stops on budget
//! 4. [`BlueprintPolicy`] freezes the average strategy for decision time
//!
//! # Variants
//!
//! - **Linear CFR**: updates weighted by the iteration number
//! - **Discounted CFR**: periodic `k / (k + 1)` discounting of old mass
//! - **CFR+**: regrets floored at zero at every discount step
//!
//! # Theory
//!
//! **Regret matching**: strategy proportional to positive regret.
//! ```text
//! Strategy(a) = max(0, Regret(a)) / sum(max(0, Regret(a')))
//! ```
//!
//! **Outcome sampling**: the sampled action at a traverser node gets the
//! counterfactual value `u / q(a)` where `q` is the sampling probability;
//! unsampled actions get zero.
//!
//! # References
//!
//! - Lanctot, M., et al. "Monte Carlo Sampling for Regret Minimization in Extensive Games" (2009)
//! - Brown, N., Sandholm, T. "Solving Imperfect-Information Games via Discounted Regret Minimization" (2019)
//! - Brown, N., Sandholm, T. "Superhuman AI for multiplayer poker" (2019)

pub mod blueprint;
pub mod checkpoint;
pub mod config;
pub mod rng;
pub mod sampler;
pub mod storage;
pub mod trainer;

pub use blueprint::{BlueprintEntry, BlueprintFile, BlueprintPolicy, BLUEPRINT_FORMAT_VERSION};
pub use checkpoint::{Checkpoint, CheckpointError, CHECKPOINT_FORMAT_VERSION};
pub use config::{CFRConfig, CFRStats, ConfigError, ConvergencePoint};
pub use rng::{RngState, SolverRng};
pub use sampler::{explore, outcome_regrets, sample_index, InfosetEncoder, OutcomeSampler};
pub use storage::{RegretTracker, RowState, StrategySnapshot, TrackerError, TrackerState};
pub use trainer::{ChunkOutcome, IterationRange, Trainer, TrainingBudget};
