//! # Run Configuration
//!
//! Every constant that shapes an aggregation run lives in [`GatherConfig`].
//! The defaults reproduce the reference pipeline: 40 cross-validation folds
//! drawn as ten repeats of a 4-way split, tasks dealt mutation types after a
//! shuffle seeded with 10301, and 1000 bootstrap draws seeded with 7609.
//!
//! A run directory carries its own `setup/pipeline.toml` manifest. The
//! manifest names the task count; an optional `[gather]` table overrides
//! individual fields and leaves the rest at their defaults. The `[gather]`
//! table is read on its own by [`GatherConfig::load`], so a run whose task
//! count comes from elsewhere needs no complete manifest.

use crate::types::GatherError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "pipeline.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherConfig {
    /// Total number of cross-validation folds each task was run over.
    pub fold_count: usize,
    /// Folds sharing one sample shuffle; each fold holds out every
    /// `folds_per_group`-th sample of that shuffle.
    pub folds_per_group: usize,
    pub group_seed_base: u64,
    pub group_seed_step: u64,
    pub split_seed_base: u64,
    pub split_seed_step: u64,
    /// Seed of the shuffle dealing mutation types to tasks.
    pub assignment_seed: u64,
    pub bootstrap_seed: u64,
    pub bootstrap_draws: usize,
    /// Upper bound on threads used for metric estimation.
    pub max_workers: usize,
    /// Number of fit-timing fields each classifier reports per mutation type.
    pub timing_fields: usize,
    /// Number of tuning-accuracy fields each classifier reports per mutation type.
    pub accuracy_fields: usize,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            fold_count: 40,
            folds_per_group: 4,
            group_seed_base: 13,
            group_seed_step: 7712,
            split_seed_base: 9073,
            split_seed_step: 97,
            assignment_seed: 10301,
            bootstrap_seed: 7609,
            bootstrap_draws: 1000,
            max_workers: 12,
            timing_fields: 2,
            accuracy_fields: 3,
        }
    }
}

impl GatherConfig {
    /// Number of complete passes over the cohort; each sample is held out
    /// exactly this many times.
    pub fn repeats(&self) -> usize {
        self.fold_count / self.folds_per_group
    }

    pub fn validate(&self) -> Result<(), GatherError> {
        if self.folds_per_group == 0 {
            return Err(GatherError::InvalidSetup(
                "folds_per_group must be positive".to_string(),
            ));
        }
        if self.fold_count == 0 || self.fold_count % self.folds_per_group != 0 {
            return Err(GatherError::InvalidSetup(format!(
                "fold_count ({}) must be a positive multiple of folds_per_group ({})",
                self.fold_count, self.folds_per_group
            )));
        }
        if self.max_workers == 0 {
            return Err(GatherError::InvalidSetup(
                "max_workers must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads the `[gather]` table of the run's manifest.
    ///
    /// A missing manifest or table leaves every field at its default; other
    /// manifest keys are not looked at.
    pub fn load(run_dir: &Path) -> Result<Self, GatherError> {
        let path = PipelineManifest::path(run_dir);
        if !path.exists() {
            log::debug!("No manifest at {}, using default settings", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        let settings: GatherSettings = toml::from_str(&text)?;
        settings.gather.validate()?;
        Ok(settings.gather)
    }
}

#[derive(Deserialize)]
struct GatherSettings {
    #[serde(default)]
    gather: GatherConfig,
}

/// The `setup/pipeline.toml` manifest written when the pipeline was dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineManifest {
    pub task_count: usize,
    #[serde(default)]
    pub gather: GatherConfig,
}

impl PipelineManifest {
    pub fn path(run_dir: &Path) -> PathBuf {
        run_dir.join("setup").join(MANIFEST_FILE_NAME)
    }

    pub fn load(run_dir: &Path) -> Result<Self, GatherError> {
        let path = Self::path(run_dir);
        let text = fs::read_to_string(&path)?;
        let manifest: Self = toml::from_str(&text)?;
        if manifest.task_count == 0 {
            return Err(GatherError::InvalidSetup(format!(
                "'{}' declares zero tasks",
                path.display()
            )));
        }
        manifest.gather.validate()?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(text: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("setup")).unwrap();
        fs::write(PipelineManifest::path(dir.path()), text).unwrap();
        dir
    }

    #[test]
    fn defaults_match_reference_pipeline() {
        let config = GatherConfig::default();
        assert_eq!(config.fold_count, 40);
        assert_eq!(config.repeats(), 10);
        assert_eq!(config.fold_count * config.timing_fields, 80);
        assert_eq!(config.fold_count * config.accuracy_fields, 120);
        config.validate().unwrap();
    }

    #[test]
    fn manifest_without_gather_table_uses_defaults() {
        let dir = write_manifest("task_count = 8\n");
        let manifest = PipelineManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.task_count, 8);
        assert_eq!(manifest.gather, GatherConfig::default());
    }

    #[test]
    fn manifest_overrides_individual_fields() {
        let dir = write_manifest("task_count = 3\n\n[gather]\nfold_count = 8\nbootstrap_draws = 25\n");
        let manifest = PipelineManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.gather.fold_count, 8);
        assert_eq!(manifest.gather.bootstrap_draws, 25);
        assert_eq!(manifest.gather.folds_per_group, 4);
        assert_eq!(manifest.gather.repeats(), 2);
    }

    #[test]
    fn fold_count_must_divide_into_groups() {
        let dir = write_manifest("task_count = 3\n\n[gather]\nfold_count = 10\n");
        match PipelineManifest::load(dir.path()) {
            Err(GatherError::InvalidSetup(msg)) => assert!(msg.contains("fold_count")),
            other => panic!("Expected InvalidSetup, got {other:?}"),
        }
    }

    #[test]
    fn settings_load_without_a_task_count() {
        let dir = write_manifest("task_count = 0\n\n[gather]\nbootstrap_draws = 25\n");
        let config = GatherConfig::load(dir.path()).unwrap();
        assert_eq!(config.bootstrap_draws, 25);
        assert_eq!(config.fold_count, 40);
        assert!(matches!(
            PipelineManifest::load(dir.path()),
            Err(GatherError::InvalidSetup(_))
        ));

        let dir = write_manifest("[gather]\nfold_count = 8\n");
        assert_eq!(GatherConfig::load(dir.path()).unwrap().fold_count, 8);
    }

    #[test]
    fn settings_default_without_a_manifest() {
        let dir = TempDir::new().unwrap();
        assert_eq!(GatherConfig::load(dir.path()).unwrap(), GatherConfig::default());
    }

    #[test]
    fn settings_are_validated() {
        let dir = write_manifest("[gather]\nfold_count = 10\n");
        assert!(matches!(
            GatherConfig::load(dir.path()),
            Err(GatherError::InvalidSetup(_))
        ));
    }

    #[test]
    fn missing_task_count_is_rejected() {
        let dir = write_manifest("[gather]\nfold_count = 8\n");
        assert!(matches!(
            PipelineManifest::load(dir.path()),
            Err(GatherError::Manifest(_))
        ));
    }
}
