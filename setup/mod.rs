//! # Run Setup and Collaborators
//!
//! The gatherer consumes three collaborators it does not own: the pipeline
//! metadata written at dispatch time, the cohort whose samples were split
//! into folds, and the classifier each job ran. This module defines the
//! narrow interfaces the aggregation core is generic over, plus file-backed
//! implementations reading the `setup/` directory of a run.

pub mod classifier;
pub mod cohort;
pub mod split;

pub use classifier::{Classifier, ClassifierSpec, TunePrior};
pub use cohort::{Cohort, CohortData, SplitRequest};

use crate::config::PipelineManifest;
use crate::io::read_json;
use crate::types::{GatherError, MutationType};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const MUTATION_LIST_FILE: &str = "muts-list.json";
pub const FEATURE_LIST_FILE: &str = "feat-list.json";
pub const COHORT_FILE: &str = "cohort-data.json";
pub const SC_SAMPLES_FILE: &str = "sc-samples.json";

/// Reports how many tasks the pipeline dispatched for a run.
pub trait PipelineMetadata {
    fn task_count(&self, run_dir: &Path) -> Result<usize, GatherError>;
}

/// Reads the task count from `setup/pipeline.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestMetadata;

impl PipelineMetadata for ManifestMetadata {
    fn task_count(&self, run_dir: &Path) -> Result<usize, GatherError> {
        Ok(PipelineManifest::load(run_dir)?.task_count)
    }
}

/// Everything the dispatch step left in `setup/` that the gatherer needs.
#[derive(Debug, Clone)]
pub struct RunSetup<K> {
    /// Mutation types in enumeration order, before the assignment shuffle.
    pub mutation_types: Vec<MutationType>,
    pub features: BTreeSet<String>,
    pub cohort: K,
    /// Index of the external single-cell expression matrix.
    pub sc_samples: Vec<String>,
}

pub fn setup_dir(run_dir: &Path) -> PathBuf {
    run_dir.join("setup")
}

impl RunSetup<CohortData> {
    pub fn load(run_dir: &Path) -> Result<Self, GatherError> {
        let dir = setup_dir(run_dir);
        let mutation_types: Vec<MutationType> = read_json(&dir.join(MUTATION_LIST_FILE))?;
        let features: BTreeSet<String> = read_json(&dir.join(FEATURE_LIST_FILE))?;
        let cohort: CohortData = read_json(&dir.join(COHORT_FILE))?;
        let sc_samples: Vec<String> = read_json(&dir.join(SC_SAMPLES_FILE))?;

        let distinct: BTreeSet<&MutationType> = mutation_types.iter().collect();
        if distinct.len() != mutation_types.len() {
            return Err(GatherError::InvalidSetup(
                "the enumerated mutation list contains duplicates".to_string(),
            ));
        }
        if cohort.is_empty() {
            return Err(GatherError::InvalidSetup("the cohort has no samples".to_string()));
        }

        log::info!(
            "Loaded setup: {} mutation types, {} features, {} cohort samples, {} single-cell samples",
            mutation_types.len(),
            features.len(),
            cohort.len(),
            sc_samples.len()
        );

        Ok(Self {
            mutation_types,
            features,
            cohort,
            sc_samples,
        })
    }
}
