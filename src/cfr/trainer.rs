//! Chunked training driver.
//!
//! Training proceeds in chunks. After each chunk the accumulated wall-clock
//! time is updated first and only then compared to the budget, so stopping
//! by time never runs an extra chunk. Optional checkpoints are written at
//! chunk boundaries.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::blueprint::BlueprintPolicy;
use super::checkpoint::{Checkpoint, CheckpointError};
use super::config::CFRStats;
use super::sampler::OutcomeSampler;
use super::storage::StrategySnapshot;

/// When a run is finished.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrainingBudget {
    /// Stop once the iteration counter reaches this value.
    pub max_iterations: Option<u64>,
    /// Stop once accumulated wall-clock seconds reach this value.
    pub max_seconds: Option<f64>,
}

impl TrainingBudget {
    /// Budget of `iterations` total iterations.
    pub fn iterations(iterations: u64) -> Self {
        Self {
            max_iterations: Some(iterations),
            max_seconds: None,
        }
    }

    /// Builder method: add a time limit.
    pub fn with_max_seconds(mut self, seconds: f64) -> Self {
        self.max_seconds = Some(seconds);
        self
    }

    /// Whether a run at `iteration` with `elapsed` seconds is done.
    pub fn exhausted(&self, iteration: u64, elapsed: f64) -> bool {
        self.max_iterations.is_some_and(|max| iteration >= max)
            || self.max_seconds.is_some_and(|max| elapsed >= max)
    }
}

/// Half-open range `[start, end)` of iteration numbers owned by one
/// independent training instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationRange {
    /// First iteration counter value (exclusive of the work done).
    pub start: u64,
    /// Counter value at which the instance stops.
    pub end: u64,
}

impl IterationRange {
    /// Range `[start, end)`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of iterations in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Split `[0, total)` into `parts` disjoint contiguous ranges whose
    /// lengths differ by at most one.
    ///
    /// Tables trained over different ranges are independent; no merge is
    /// provided.
    pub fn split(total: u64, parts: usize) -> Vec<IterationRange> {
        if parts == 0 {
            return Vec::new();
        }
        let parts_u = parts as u64;
        let base = total / parts_u;
        let extra = total % parts_u;
        let mut start = 0;
        (0..parts_u)
            .map(|i| {
                let len = base + u64::from(i < extra);
                let range = IterationRange::new(start, start + len);
                start += len;
                range
            })
            .collect()
    }
}

/// Result of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Budget remains.
    Continue,
    /// The budget is exhausted.
    Complete,
}

/// Drives an [`OutcomeSampler`] through a budget in chunks.
pub struct Trainer {
    sampler: OutcomeSampler,
    budget: TrainingBudget,
    checkpoint_path: Option<PathBuf>,
    track_convergence: bool,
    snapshot: Option<StrategySnapshot>,
}

impl Trainer {
    /// Trainer starting from the sampler's current state.
    pub fn new(sampler: OutcomeSampler, budget: TrainingBudget) -> Self {
        Self {
            sampler,
            budget,
            checkpoint_path: None,
            track_convergence: true,
            snapshot: None,
        }
    }

    /// Trainer for one independent instance owning `range`.
    pub fn for_range(sampler: OutcomeSampler, range: IterationRange) -> Self {
        Self::for_range_with_budget(sampler, range, TrainingBudget::default())
    }

    /// Trainer for `range` that also honours `budget`.
    ///
    /// The range end caps the iteration limit; the time limit applies as is.
    pub fn for_range_with_budget(
        mut sampler: OutcomeSampler,
        range: IterationRange,
        budget: TrainingBudget,
    ) -> Self {
        sampler.start_at(range.start);
        let max_iterations = budget
            .max_iterations
            .map_or(range.end, |max| max.min(range.end));
        let budget = TrainingBudget {
            max_iterations: Some(max_iterations),
            ..budget
        };
        Self::new(sampler, budget)
    }

    /// Resume from the checkpoint at `path`.
    ///
    /// Tracker, RNG, iteration and elapsed time are restored; a bucketing
    /// mismatch is an error.
    pub fn resume<P: AsRef<Path>>(
        mut sampler: OutcomeSampler,
        path: P,
        budget: TrainingBudget,
    ) -> Result<Self, CheckpointError> {
        let checkpoint = Checkpoint::load(path.as_ref())?;
        checkpoint.restore_into(&mut sampler)?;
        info!(
            path = %path.as_ref().display(),
            iteration = sampler.iteration(),
            elapsed = sampler.stats().elapsed_seconds,
            "resumed from checkpoint"
        );
        Ok(Self::new(sampler, budget).with_checkpoint(path.as_ref()))
    }

    /// Builder method: checkpoint to `path` after every chunk.
    pub fn with_checkpoint<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.checkpoint_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Builder method: enable or disable the per-chunk convergence indicator.
    pub fn with_convergence(mut self, enable: bool) -> Self {
        self.track_convergence = enable;
        self
    }

    /// Whether the budget is exhausted.
    pub fn is_complete(&self) -> bool {
        self.budget
            .exhausted(self.sampler.iteration(), self.sampler.stats().elapsed_seconds)
    }

    /// Run up to `iterations` more iterations, capped by the budget.
    pub fn run_chunk(&mut self, iterations: u64) -> Result<ChunkOutcome, CheckpointError> {
        if self.is_complete() {
            return Ok(ChunkOutcome::Complete);
        }
        let remaining = self
            .budget
            .max_iterations
            .map_or(iterations, |max| max.saturating_sub(self.sampler.iteration()));
        let n = iterations.min(remaining);

        // train() folds this chunk's wall time into the stats before we
        // look at the budget below.
        self.sampler.train(n)?;

        if self.track_convergence {
            if let Some(previous) = &self.snapshot {
                let indicator = self.sampler.calculate_ci(previous);
                self.sampler.record_convergence(indicator);
                debug!(iteration = self.sampler.iteration(), indicator, "convergence");
            }
            self.snapshot = Some(self.sampler.snapshot_strategies());
        }

        if let Some(path) = &self.checkpoint_path {
            Checkpoint::capture(&self.sampler).save(path)?;
        }

        let stats = self.sampler.stats();
        info!(
            iteration = stats.iterations,
            info_sets = stats.info_sets,
            elapsed = stats.elapsed_seconds,
            rate = stats.iterations_per_second,
            "chunk finished"
        );

        Ok(if self.is_complete() {
            ChunkOutcome::Complete
        } else {
            ChunkOutcome::Continue
        })
    }

    /// Run chunks of `chunk_size` until the budget is exhausted, calling
    /// `on_chunk` after each.
    ///
    /// A budget with neither limit would never finish and is run for a
    /// single chunk.
    pub fn run<F>(&mut self, chunk_size: u64, mut on_chunk: F) -> Result<&CFRStats, CheckpointError>
    where
        F: FnMut(&CFRStats),
    {
        let chunk_size = chunk_size.max(1);
        loop {
            let outcome = self.run_chunk(chunk_size)?;
            on_chunk(self.sampler.stats());
            let unbounded =
                self.budget.max_iterations.is_none() && self.budget.max_seconds.is_none();
            if outcome == ChunkOutcome::Complete || unbounded {
                break;
            }
        }
        Ok(self.sampler.stats())
    }

    /// The budget.
    pub fn budget(&self) -> &TrainingBudget {
        &self.budget
    }

    /// The sampler.
    pub fn sampler(&self) -> &OutcomeSampler {
        &self.sampler
    }

    /// Publish the current average strategy.
    pub fn blueprint(&self) -> BlueprintPolicy {
        self.sampler.blueprint()
    }

    /// Give back the sampler.
    pub fn into_sampler(self) -> OutcomeSampler {
        self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::{ActionAbstraction, StrengthBucketer};
    use crate::cards::RankEvaluator;
    use crate::cfr::CFRConfig;
    use crate::game::TableRules;
    use std::sync::Arc;

    fn sampler(seed: u64) -> OutcomeSampler {
        OutcomeSampler::new(
            TableRules::heads_up(20.0),
            ActionAbstraction::single_size(1.0),
            Arc::new(StrengthBucketer::default()),
            Arc::new(RankEvaluator),
            CFRConfig::fast().with_seed(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_chunks_stop_exactly_at_budget() {
        let mut trainer = Trainer::new(sampler(1), TrainingBudget::iterations(50));
        assert_eq!(trainer.run_chunk(20).unwrap(), ChunkOutcome::Continue);
        assert_eq!(trainer.run_chunk(20).unwrap(), ChunkOutcome::Continue);
        assert_eq!(trainer.run_chunk(20).unwrap(), ChunkOutcome::Complete);
        assert_eq!(trainer.sampler().iteration(), 50);
        assert_eq!(trainer.run_chunk(20).unwrap(), ChunkOutcome::Complete);
        assert_eq!(trainer.sampler().iteration(), 50);
        assert_eq!(trainer.sampler().stats().convergence_history.len(), 2);
    }

    #[test]
    fn test_time_budget_checked_after_elapsed_update() {
        let budget = TrainingBudget::default().with_max_seconds(1e-9);
        let mut trainer = Trainer::new(sampler(2), budget);
        assert_eq!(trainer.run_chunk(5).unwrap(), ChunkOutcome::Complete);
        assert_eq!(trainer.sampler().iteration(), 5);
    }

    #[test]
    fn test_resume_keeps_elapsed_and_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.json");

        let mut first = Trainer::new(sampler(4), TrainingBudget::iterations(30)).with_checkpoint(&path);
        first.run(10, |_| {}).unwrap();
        let elapsed = first.sampler().stats().elapsed_seconds;
        assert!(elapsed > 0.0);

        let resumed = Trainer::resume(sampler(4), &path, TrainingBudget::iterations(60)).unwrap();
        assert_eq!(resumed.sampler().iteration(), 30);
        assert_eq!(resumed.sampler().stats().elapsed_seconds, elapsed);
        assert!(!resumed.is_complete());

        let done = Trainer::resume(sampler(4), &path, TrainingBudget::iterations(30)).unwrap();
        assert!(done.is_complete());
    }

    #[test]
    fn test_split_ranges_are_disjoint_and_cover() {
        let ranges = IterationRange::split(10, 3);
        assert_eq!(
            ranges,
            vec![
                IterationRange::new(0, 4),
                IterationRange::new(4, 7),
                IterationRange::new(7, 10)
            ]
        );
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(ranges.iter().map(IterationRange::len).sum::<u64>(), 10);
        assert!(IterationRange::split(10, 0).is_empty());
        assert!(IterationRange::split(2, 4)[3].is_empty());
    }

    #[test]
    fn test_range_trainer_counts_from_start() {
        let range = IterationRange::new(100, 110);
        let mut trainer = Trainer::for_range(sampler(5), range);
        trainer.run(4, |_| {}).unwrap();
        assert_eq!(trainer.sampler().iteration(), 110);
    }

    #[test]
    fn test_fresh_range_run_stops_on_time_limit() {
        let range = IterationRange::new(0, 1_000_000);
        let budget = TrainingBudget::iterations(range.end).with_max_seconds(1e-9);
        let mut trainer = Trainer::for_range_with_budget(sampler(6), range, budget);
        assert_eq!(trainer.budget().max_seconds, Some(1e-9));
        trainer.run(10, |_| {}).unwrap();
        assert_eq!(trainer.sampler().iteration(), 10);
        assert!(trainer.is_complete());
    }

    #[test]
    fn test_range_end_caps_larger_budget() {
        let range = IterationRange::new(20, 30);
        let mut trainer =
            Trainer::for_range_with_budget(sampler(7), range, TrainingBudget::iterations(1_000));
        assert_eq!(trainer.budget().max_iterations, Some(30));
        trainer.run(4, |_| {}).unwrap();
        assert_eq!(trainer.sampler().iteration(), 30);
    }
}
