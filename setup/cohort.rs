use crate::setup::split::seeded_shuffle;
use crate::types::{GatherError, MutationType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How a cohort should draw its next train/test split.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitRequest {
    /// Hold out exactly these samples. The seed is recorded for provenance.
    Explicit { seed: u64, test_samples: Vec<String> },
    /// Hold out a random proportion of the cohort.
    Proportion { seed: u64, test_prop: f64 },
}

/// The cohort operations the gatherer relies on.
pub trait Cohort {
    /// Every sample in the cohort, sorted.
    fn samples(&self) -> Vec<String>;

    fn update_split(&mut self, request: SplitRequest) -> Result<(), GatherError>;

    /// Held-out samples of the current split, sorted.
    fn test_samples(&self) -> Vec<String>;

    /// Training samples of the current split, sorted.
    fn train_samples(&self) -> Vec<String>;

    /// Mutation status of each training sample for `mtype`.
    fn train_pheno(&self, mtype: &MutationType) -> Result<Vec<bool>, GatherError>;
}

/// A cohort described by `setup/cohort-data.json`: the sample list and, for
/// each mutation type, the samples carrying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortData {
    samples: BTreeSet<String>,
    mutated: BTreeMap<MutationType, BTreeSet<String>>,
    #[serde(skip)]
    test: BTreeSet<String>,
}

impl CohortData {
    pub fn new(
        samples: impl IntoIterator<Item = String>,
        mutated: BTreeMap<MutationType, BTreeSet<String>>,
    ) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            mutated,
            test: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Cohort for CohortData {
    fn samples(&self) -> Vec<String> {
        self.samples.iter().cloned().collect()
    }

    fn update_split(&mut self, request: SplitRequest) -> Result<(), GatherError> {
        self.test = match request {
            SplitRequest::Explicit { test_samples, .. } => {
                if let Some(unknown) = test_samples.iter().find(|s| !self.samples.contains(*s)) {
                    return Err(GatherError::InvalidSetup(format!(
                        "test sample '{unknown}' is not part of the cohort"
                    )));
                }
                test_samples.into_iter().collect()
            }
            SplitRequest::Proportion { seed, test_prop } => {
                if !(0.0..=1.0).contains(&test_prop) {
                    return Err(GatherError::InvalidSetup(format!(
                        "test proportion {test_prop} is outside [0, 1]"
                    )));
                }
                let n_test = (self.samples.len() as f64 * test_prop).round() as usize;
                let ordered: Vec<String> = self.samples.iter().cloned().collect();
                seeded_shuffle(&ordered, seed).into_iter().take(n_test).collect()
            }
        };
        Ok(())
    }

    fn test_samples(&self) -> Vec<String> {
        self.test.iter().cloned().collect()
    }

    fn train_samples(&self) -> Vec<String> {
        self.samples.difference(&self.test).cloned().collect()
    }

    fn train_pheno(&self, mtype: &MutationType) -> Result<Vec<bool>, GatherError> {
        let carriers = self.mutated.get(mtype).ok_or_else(|| {
            GatherError::InvalidSetup(format!("no mutation data for type '{mtype}'"))
        })?;
        Ok(self
            .samples
            .difference(&self.test)
            .map(|sample| carriers.contains(sample))
            .collect())
    }
}
