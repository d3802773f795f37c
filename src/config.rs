//! Solver settings file.
//!
//! One JSON document configures every component. Each section is optional
//! and falls back to its defaults:
//!
//! ```json
//! {
//!   "table": { "num_players": 2, "starting_stack": 100.0 },
//!   "training": { "exploration": 0.6, "seed": 7 },
//!   "abstraction": { "max_raises_per_street": 4 },
//!   "bucketing": { "postflop_sub_buckets": 4 },
//!   "resolver": { "time_limit_ms": 80 },
//!   "translator": { "min_chip": 0.01 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::abstraction::{ActionAbstraction, BucketConfig};
use crate::cfr::{CFRConfig, ConfigError};
use crate::game::TableRules;
use crate::resolve::ResolverConfig;
use crate::translate::TableConstraints;

/// Every tunable, grouped by component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Stakes and seating.
    pub table: TableRules,
    /// Blueprint training.
    pub training: CFRConfig,
    /// Bet-size ladders.
    pub abstraction: ActionAbstraction,
    /// Hand bucketing.
    pub bucketing: BucketConfig,
    /// Real-time resolving.
    pub resolver: ResolverConfig,
    /// Venue constraints for action translation.
    pub translator: TableConstraints,
}

impl SolverSettings {
    /// Load settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Parse settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.table.validate()?;
        self.training.validate()?;
        self.abstraction.validate()?;
        self.bucketing.validate()?;
        self.resolver.validate()?;
        self.translator.validate()?;
        Ok(())
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::LeafPolicy;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = SolverSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, SolverSettings::default());
        assert_eq!(settings.training.exploration, 0.6);
        assert_eq!(settings.translator.all_in_threshold, 0.97);
    }

    #[test]
    fn test_partial_sections() {
        let json = r#"{
            "table": { "num_players": 3, "starting_stack": 50.0 },
            "training": { "seed": 11, "use_cfr_plus": true },
            "resolver": { "time_limit_ms": 25, "leaf_policies": ["blueprint", "fold_biased"] }
        }"#;
        let settings = SolverSettings::from_json_str(json).unwrap();
        assert_eq!(settings.table.num_players, 3);
        assert_eq!(settings.table.starting_stack, 50.0);
        assert_eq!(settings.table.big_blind, 1.0);
        assert_eq!(settings.training.seed, Some(11));
        assert!(settings.training.use_cfr_plus);
        assert_eq!(settings.resolver.time_limit_ms, 25);
        assert_eq!(
            settings.resolver.leaf_policies,
            vec![LeafPolicy::Blueprint, LeafPolicy::FoldBiased]
        );
        assert_eq!(settings.resolver.min_iterations, 100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_exploration = r#"{ "training": { "exploration": 1.5 } }"#;
        assert!(matches!(
            SolverSettings::from_json_str(bad_exploration),
            Err(ConfigError::InvalidExploration(_))
        ));

        let bad_players = r#"{ "table": { "num_players": 9 } }"#;
        assert!(SolverSettings::from_json_str(bad_players).is_err());

        let bad_chip = r#"{ "translator": { "min_chip": 0.0 } }"#;
        assert!(matches!(
            SolverSettings::from_json_str(bad_chip),
            Err(ConfigError::InvalidValue { field: "translator.min_chip", .. })
        ));

        assert!(matches!(
            SolverSettings::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let mut settings = SolverSettings::default();
        settings.training.seed = Some(3);
        settings.resolver = settings.resolver.with_time_limit_ms(40);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_json().unwrap().as_bytes()).unwrap();
        let loaded = SolverSettings::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, settings);

        let missing = SolverSettings::from_json_file("/nonexistent/settings.json");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
