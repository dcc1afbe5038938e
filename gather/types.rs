use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ========================================================================================
//                                  Core identifiers
// ========================================================================================

/// An opaque mutation-type identifier, e.g. a gene-level or subtype-level label.
///
/// The aggregation core never looks inside these; it only sorts, hashes and
/// compares them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationType(String);

impl MutationType {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MutationType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A column label of a merged matrix. Every column remembers which fold it
/// came from; `key` is a sample id, feature name, parameter name or field name
/// depending on the table kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnLabel {
    pub fold: usize,
    pub key: String,
}

impl ColumnLabel {
    pub fn new(fold: usize, key: impl Into<String>) -> Self {
        Self {
            fold,
            key: key.into(),
        }
    }
}

// ========================================================================================
//                                 Task output records
// ========================================================================================

/// The output of one (task, fold) unit of work, as written by a classifier job.
///
/// `C` is the classifier description the job serialized alongside its results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutputRecord<C> {
    pub classifier: C,
    /// One score per held-out sample, in the cohort's sorted test-sample order.
    pub predictions: BTreeMap<MutationType, Vec<f64>>,
    /// Tuned hyper-parameter values keyed by parameter name.
    pub tuned_params: BTreeMap<MutationType, BTreeMap<String, f64>>,
    /// Fit timings per field, one entry per tested hyper-parameter value.
    pub fit_times: BTreeMap<MutationType, BTreeMap<String, Vec<f64>>>,
    /// Tuning accuracy traces per field, one entry per tested hyper-parameter value.
    pub tune_accuracies: BTreeMap<MutationType, BTreeMap<String, Vec<f64>>>,
    /// Model coefficients keyed by feature. Classifiers may use a feature subset.
    pub coefficients: BTreeMap<MutationType, BTreeMap<String, f64>>,
    /// Scores over the external single-cell sample index. Omitted by runs
    /// whose setup lists no single-cell samples.
    #[serde(default)]
    pub sc_scores: BTreeMap<MutationType, Vec<f64>>,
}

// ========================================================================================
//                                   Tabular results
// ========================================================================================

/// A mutation-type × column matrix with labelled axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTable<T> {
    pub rows: Vec<MutationType>,
    pub columns: Vec<ColumnLabel>,
    pub values: Array2<T>,
}

impl<T> LabeledTable<T> {
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }
}

/// Per-sample score arrays: `values[[type, sample, repeat]]`.
///
/// Each sample holds exactly one score per repeat, in fold order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreArrays {
    pub rows: Vec<MutationType>,
    pub samples: Vec<String>,
    pub values: Array3<f64>,
}

impl ScoreArrays {
    pub fn repeats(&self) -> usize {
        self.values.shape()[2]
    }
}

/// Ground-truth mutation status for each type over the training samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeTable {
    pub rows: Vec<MutationType>,
    pub samples: Vec<String>,
    pub values: Array2<bool>,
}

// ========================================================================================
//                                     Error type
// ========================================================================================

/// Every way an aggregation run can fail. All variants are fatal to the run.
#[derive(Error, Debug)]
pub enum GatherError {
    #[error("Missing output files detected: {0}")]
    IncompleteOutput(String),

    #[error(
        "Each experiment must be run with the same classifier: fold {fold} used <{found}> but the run started with <{expected}>"
    )]
    InconsistentClassifier {
        fold: usize,
        expected: String,
        found: String,
    },

    #[error(
        "Each experiment must be run with exactly one set of tuning priors: a record in fold {fold} used a different set"
    )]
    InconsistentTuning { fold: usize },

    #[error("Mutations with results for {context} don't match those enumerated during setup: {detail}")]
    MutationSetMismatch { context: String, detail: String },

    #[error("Shape invariant violated: {0}")]
    ShapeMismatch(String),

    #[error("Invalid run setup: {0}")]
    InvalidSetup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse '{path}': {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize merged output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse pipeline manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("Failed to write summary table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
