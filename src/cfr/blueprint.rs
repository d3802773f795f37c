//! Published blueprint strategies.
//!
//! A [`BlueprintPolicy`] is the time-averaged strategy of a finished (or
//! paused) training run. It is immutable once built; share it between
//! resolvers with an `Arc`.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::checkpoint::{read_json, write_json_atomic, CheckpointError};
use super::storage::RegretTracker;
use crate::abstraction::{AbstractAction, KeyFormat};

/// Format version written by [`BlueprintPolicy::save`].
pub const BLUEPRINT_FORMAT_VERSION: u32 = 1;

const ROW_TOLERANCE: f64 = 1e-6;

/// Read-only mapping from infoset key to an action distribution.
#[derive(Debug, Clone, Default)]
pub struct BlueprintPolicy {
    rows: FxHashMap<String, Vec<(AbstractAction, f64)>>,
    bucket_fingerprint: String,
    key_format: Option<KeyFormat>,
}

/// One row of a blueprint file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintEntry {
    /// Infoset key.
    pub key: String,
    /// Actions in canonical order.
    pub actions: Vec<AbstractAction>,
    /// Probability per action.
    pub probabilities: Vec<f64>,
}

/// On-disk blueprint layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintFile {
    /// Layout version.
    pub format_version: u32,
    /// Bucketing the strategies were trained with.
    pub bucket_fingerprint: String,
    /// Key layout, e.g. `v2` or `legacy`.
    #[serde(default)]
    pub key_format: Option<KeyFormat>,
    /// Rows sorted by key.
    pub entries: Vec<BlueprintEntry>,
}

impl BlueprintPolicy {
    /// Average strategies of every row in `tracker`.
    pub fn from_tracker(tracker: &RegretTracker, bucket_fingerprint: &str) -> Self {
        let mut rows = FxHashMap::with_capacity_and_hasher(tracker.num_info_sets(), Default::default());
        for key in tracker.keys() {
            let Some(actions) = tracker.actions(key) else {
                continue;
            };
            let probs = tracker.get_average_strategy(key, actions);
            let mut row: Vec<(AbstractAction, f64)> =
                actions.iter().copied().zip(probs).collect();
            row.sort_by(|a, b| a.0.cmp(&b.0));
            rows.insert(key.to_string(), row);
        }
        let key_format = tracker.keys().first().map(|k| KeyFormat::of(k));
        Self {
            rows,
            bucket_fingerprint: bucket_fingerprint.to_string(),
            key_format,
        }
    }

    /// Distribution over `actions` at `key`, aligned with `actions`.
    ///
    /// Actions the blueprint never saw get zero and the rest is
    /// renormalized. Unknown keys, or rows with no mass on `actions`, give
    /// the uniform distribution.
    pub fn strategy_for(&self, key: &str, actions: &[AbstractAction]) -> Vec<f64> {
        if actions.is_empty() {
            return Vec::new();
        }
        let uniform = vec![1.0 / actions.len() as f64; actions.len()];
        let Some(row) = self.rows.get(key) else {
            return uniform;
        };
        let probs: Vec<f64> = actions
            .iter()
            .map(|a| {
                row.iter()
                    .find(|(b, _)| b == a)
                    .map(|&(_, p)| p)
                    .unwrap_or(0.0)
            })
            .collect();
        let total: f64 = probs.iter().sum();
        if total > 0.0 {
            probs.into_iter().map(|p| p / total).collect()
        } else {
            uniform
        }
    }

    /// Stored probability of `action` at `key`.
    pub fn probability(&self, key: &str, action: AbstractAction) -> Option<f64> {
        self.rows
            .get(key)?
            .iter()
            .find(|(a, _)| *a == action)
            .map(|&(_, p)| p)
    }

    /// Stored row at `key`.
    pub fn get(&self, key: &str) -> Option<&[(AbstractAction, f64)]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// Whether `key` has a row.
    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.rows.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Bucketing fingerprint.
    pub fn bucket_fingerprint(&self) -> &str {
        &self.bucket_fingerprint
    }

    /// Shared key layout, if any rows exist.
    pub fn key_format(&self) -> Option<KeyFormat> {
        self.key_format
    }

    /// On-disk form.
    pub fn to_file(&self) -> BlueprintFile {
        let entries = self
            .keys()
            .into_iter()
            .filter_map(|key| {
                let row = self.rows.get(key)?;
                Some(BlueprintEntry {
                    key: key.to_string(),
                    actions: row.iter().map(|&(a, _)| a).collect(),
                    probabilities: row.iter().map(|&(_, p)| p).collect(),
                })
            })
            .collect();
        BlueprintFile {
            format_version: BLUEPRINT_FORMAT_VERSION,
            bucket_fingerprint: self.bucket_fingerprint.clone(),
            key_format: self.key_format,
            entries,
        }
    }

    /// Validate and index a blueprint file.
    pub fn from_file(file: BlueprintFile) -> Result<Self, CheckpointError> {
        if file.format_version > BLUEPRINT_FORMAT_VERSION {
            return Err(CheckpointError::Invalid(format!(
                "blueprint format version {} is newer than supported {}",
                file.format_version, BLUEPRINT_FORMAT_VERSION
            )));
        }
        let key_format = KeyFormat::detect_all(file.entries.iter().map(|e| e.key.as_str()))
            .map_err(|e| CheckpointError::Invalid(e.to_string()))?;

        let mut rows = FxHashMap::with_capacity_and_hasher(file.entries.len(), Default::default());
        for entry in file.entries {
            if entry.actions.len() != entry.probabilities.len() || entry.actions.is_empty() {
                return Err(CheckpointError::Invalid(format!(
                    "row {} has {} actions and {} probabilities",
                    entry.key,
                    entry.actions.len(),
                    entry.probabilities.len()
                )));
            }
            let total: f64 = entry.probabilities.iter().sum();
            if (total - 1.0).abs() > ROW_TOLERANCE
                || entry.probabilities.iter().any(|p| !(0.0..=1.0 + ROW_TOLERANCE).contains(p))
            {
                return Err(CheckpointError::Invalid(format!(
                    "row {} is not a distribution (sum {total})",
                    entry.key
                )));
            }
            let mut row: Vec<(AbstractAction, f64)> =
                entry.actions.into_iter().zip(entry.probabilities).collect();
            row.sort_by(|a, b| a.0.cmp(&b.0));
            rows.insert(entry.key, row);
        }
        Ok(Self {
            rows,
            bucket_fingerprint: file.bucket_fingerprint,
            key_format,
        })
    }

    /// Write the blueprint atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        write_json_atomic(path.as_ref(), &self.to_file())?;
        info!(path = %path.as_ref().display(), rows = self.len(), "blueprint published");
        Ok(())
    }

    /// Load a blueprint and require its fingerprint to equal `expected`.
    pub fn load<P: AsRef<Path>>(path: P, expected: &str) -> Result<Self, CheckpointError> {
        let file: BlueprintFile = read_json(path.as_ref())?;
        if file.bucket_fingerprint != expected {
            return Err(CheckpointError::FingerprintMismatch {
                expected: expected.to_string(),
                found: file.bucket_fingerprint,
            });
        }
        Self::from_file(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::BetSize;
    use approx::assert_abs_diff_eq;

    const KEY: &str = "v2:FLOP:7:C";

    fn tracker() -> RegretTracker {
        let mut t = RegretTracker::new();
        let actions = [
            AbstractAction::AllIn,
            AbstractAction::CheckCall,
            AbstractAction::Bet(BetSize::from_percent(75)),
        ];
        t.add_strategy(KEY, &actions, &[0.2, 0.5, 0.3], 2.0);
        t
    }

    #[test]
    fn test_rows_are_canonical_distributions() {
        let bp = BlueprintPolicy::from_tracker(&tracker(), "fp");
        let row = bp.get(KEY).unwrap();
        assert_eq!(row[0].0, AbstractAction::CheckCall);
        assert_eq!(row[2].0, AbstractAction::AllIn);
        assert_abs_diff_eq!(row.iter().map(|r| r.1).sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(bp.key_format(), Some(KeyFormat::Versioned(2)));
    }

    #[test]
    fn test_strategy_for_renormalizes_and_falls_back() {
        let bp = BlueprintPolicy::from_tracker(&tracker(), "fp");
        let actions = [AbstractAction::Fold, AbstractAction::CheckCall, AbstractAction::AllIn];
        let probs = bp.strategy_for(KEY, &actions);
        assert_eq!(probs[0], 0.0);
        assert_abs_diff_eq!(probs[1], 0.5 / 0.7, epsilon = 1e-9);
        assert_abs_diff_eq!(probs[2], 0.2 / 0.7, epsilon = 1e-9);

        let unknown = bp.strategy_for("v2:FLOP:8:C", &actions);
        assert_eq!(unknown, vec![1.0 / 3.0; 3]);
        assert!(bp.strategy_for(KEY, &[]).is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blueprint.json");
        let bp = BlueprintPolicy::from_tracker(&tracker(), "fp");
        bp.save(&path).unwrap();

        let loaded = BlueprintPolicy::load(&path, "fp").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(KEY), bp.get(KEY));

        assert!(matches!(
            BlueprintPolicy::load(&path, "other"),
            Err(CheckpointError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_rows() {
        let file = BlueprintFile {
            format_version: 1,
            bucket_fingerprint: "fp".into(),
            key_format: None,
            entries: vec![BlueprintEntry {
                key: KEY.into(),
                actions: vec![AbstractAction::CheckCall, AbstractAction::AllIn],
                probabilities: vec![0.5, 0.4],
            }],
        };
        assert!(BlueprintPolicy::from_file(file.clone()).is_err());

        let mut mixed = file;
        mixed.entries[0].probabilities = vec![0.5, 0.5];
        mixed.entries.push(BlueprintEntry {
            key: "FLOP:7:C".into(),
            actions: vec![AbstractAction::CheckCall],
            probabilities: vec![1.0],
        });
        assert!(BlueprintPolicy::from_file(mixed).is_err());
    }
}
