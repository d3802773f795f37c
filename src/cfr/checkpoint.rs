//! Training checkpoints.
//!
//! A checkpoint carries everything needed to continue a run bit-for-bit:
//! the regret tracker (with its discount history), the RNG position, the
//! iteration count and the accumulated wall-clock time. The bucketing
//! fingerprint is stored alongside and checked on load; tables trained
//! against a different bucketing are refused.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::config::CFRConfig;
use super::rng::RngState;
use super::sampler::OutcomeSampler;
use super::storage::{TrackerError, TrackerState};

/// Format version written by [`Checkpoint::save`].
pub const CHECKPOINT_FORMAT_VERSION: u32 = 2;

/// Errors raised while saving or loading checkpoints and blueprints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Filesystem failure.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid JSON for the expected layout.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The file was produced with a different bucketing.
    #[error("bucket fingerprint mismatch: expected {expected}, found {found}")]
    FingerprintMismatch {
        /// Fingerprint of the bucketing currently loaded.
        expected: String,
        /// Fingerprint stored in the file.
        found: String,
    },
    /// The stored table is unusable.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    /// The file parsed but its contents are inconsistent.
    #[error("invalid file contents: {0}")]
    Invalid(String),
}

/// Serialized training state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Layout version. Files from before versioning read as 0.
    #[serde(default)]
    pub format_version: u32,
    /// Iterations completed.
    pub iteration: u64,
    /// Wall-clock seconds spent across every chunk so far.
    #[serde(default)]
    pub elapsed_seconds: f64,
    /// Regret and strategy tables.
    pub tracker: TrackerState,
    /// RNG position. Missing in older files.
    #[serde(default)]
    pub rng: Option<RngState>,
    /// Fingerprint of the bucketing the table was trained with.
    pub bucket_fingerprint: String,
    /// Solver configuration at save time.
    #[serde(default)]
    pub config: Option<CFRConfig>,
}

impl Checkpoint {
    /// Capture the current state of `sampler`.
    pub fn capture(sampler: &OutcomeSampler) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            iteration: sampler.iteration(),
            elapsed_seconds: sampler.stats().elapsed_seconds,
            tracker: sampler.tracker().get_state(),
            rng: Some(sampler.rng_state()),
            bucket_fingerprint: sampler.bucket_fingerprint(),
            config: Some(sampler.config().clone()),
        }
    }

    /// Write to `path` through a temporary file and an atomic rename.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        write_json_atomic(path.as_ref(), self)?;
        info!(
            path = %path.as_ref().display(),
            iteration = self.iteration,
            info_sets = self.tracker.rows.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Read a checkpoint without validating it against a bucketing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let checkpoint: Checkpoint = read_json(path.as_ref())?;
        if checkpoint.format_version > CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::Invalid(format!(
                "format version {} is newer than supported {}",
                checkpoint.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        Ok(checkpoint)
    }

    /// Read a checkpoint and require its fingerprint to equal `expected`.
    pub fn load_validated<P: AsRef<Path>>(
        path: P,
        expected: &str,
    ) -> Result<Self, CheckpointError> {
        let checkpoint = Self::load(path)?;
        checkpoint.validate_fingerprint(expected)?;
        Ok(checkpoint)
    }

    /// Fail unless the stored fingerprint equals `expected`.
    pub fn validate_fingerprint(&self, expected: &str) -> Result<(), CheckpointError> {
        if self.bucket_fingerprint != expected {
            return Err(CheckpointError::FingerprintMismatch {
                expected: expected.to_string(),
                found: self.bucket_fingerprint.clone(),
            });
        }
        Ok(())
    }

    /// Load this checkpoint into `sampler`, checking the fingerprint first.
    pub fn restore_into(self, sampler: &mut OutcomeSampler) -> Result<(), CheckpointError> {
        self.validate_fingerprint(&sampler.bucket_fingerprint())?;
        sampler.restore(self.tracker, self.rng.as_ref(), self.iteration)?;
        sampler.set_elapsed_seconds(self.elapsed_seconds);
        Ok(())
    }
}

/// Serialize `value` to `<path>.tmp`, sync it, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = tmp_path(path);
    {
        let file = File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush().map_err(io_err)?;
        writer.get_ref().sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CheckpointError> {
    let file = File::open(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::{ActionAbstraction, StrengthBucketer};
    use crate::cards::RankEvaluator;
    use crate::game::TableRules;
    use std::sync::Arc;

    fn sampler() -> OutcomeSampler {
        OutcomeSampler::new(
            TableRules::heads_up(20.0),
            ActionAbstraction::single_size(1.0),
            Arc::new(StrengthBucketer::default()),
            Arc::new(RankEvaluator),
            CFRConfig::fast().with_seed(3),
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_resume_is_bit_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("ckpt.json");

        let mut straight = sampler();
        straight.train(80).unwrap();

        let mut first = sampler();
        first.train(40).unwrap();
        Checkpoint::capture(&first).save(&path).unwrap();
        assert!(!tmp_path(&path).exists());

        let mut resumed = sampler();
        Checkpoint::load(&path)
            .unwrap()
            .restore_into(&mut resumed)
            .unwrap();
        assert_eq!(resumed.iteration(), 40);
        resumed.train(40).unwrap();

        assert_eq!(
            straight.tracker().get_state().rows,
            resumed.tracker().get_state().rows
        );
    }

    #[test]
    fn test_fingerprint_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.json");
        let mut s = sampler();
        s.train(5).unwrap();
        Checkpoint::capture(&s).save(&path).unwrap();

        let err = Checkpoint::load_validated(&path, "strength/pre169/post9x8").unwrap_err();
        assert!(matches!(err, CheckpointError::FingerprintMismatch { .. }));
        assert!(Checkpoint::load_validated(&path, &s.bucket_fingerprint()).is_ok());
    }

    #[test]
    fn test_older_layout_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        let old = r#"{
            "iteration": 12,
            "bucket_fingerprint": "strength/pre169/post9x4",
            "tracker": {
                "regrets": {"PREFLOP:168:": [1.0, -2.0]},
                "strategy_sums": {"PREFLOP:168:": [3.0, 1.0]},
                "action_names": {"PREFLOP:168:": ["C", "A"]}
            }
        }"#;
        fs::write(&path, old).unwrap();

        let checkpoint = Checkpoint::load(&path).unwrap();
        assert_eq!(checkpoint.format_version, 0);
        assert!(checkpoint.rng.is_none());

        let mut s = sampler();
        checkpoint.restore_into(&mut s).unwrap();
        assert_eq!(s.iteration(), 12);
        assert_eq!(s.tracker().num_info_sets(), 1);
        assert_eq!(s.tracker().generation(), 0);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Checkpoint::load("/nonexistent/ckpt.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ckpt.json"));
    }
}
