//! Seeded shuffles that the dispatch side and the gatherer must agree on.
//!
//! The classifier jobs drew their cross-validation splits and task
//! assignments from these exact sequences. Any change to the generator, the
//! seed formulas or the shuffle algorithm silently breaks the correspondence
//! between stored predictions and sample identities, so the functions here
//! are pure and their contracts are pinned by the tests below.

use crate::config::GatherConfig;
use crate::types::MutationType;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

/// The generator behind every seeded draw in the pipeline.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Returns a copy of `items` shuffled by a fresh generator seeded with `seed`.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut shuffled = items.to_vec();
    shuffled.shuffle(&mut seeded_rng(seed));
    shuffled
}

/// Seed of the sample shuffle shared by every fold in `fold`'s group.
pub fn fold_group_seed(fold: usize, config: &GatherConfig) -> u64 {
    config.group_seed_base + config.group_seed_step * (fold / config.folds_per_group) as u64
}

/// Seed the cohort was given when the fold's split was drawn.
pub fn fold_split_seed(fold: usize, config: &GatherConfig) -> u64 {
    config.split_seed_base + config.split_seed_step * fold as u64
}

/// The train/test partition a classifier job used for one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub fold: usize,
    pub split_seed: u64,
    /// Held-out samples, sorted.
    pub test_samples: Vec<String>,
    /// Remaining samples, sorted.
    pub train_samples: Vec<String>,
}

/// Reproduces the split of `fold`.
///
/// The sorted cohort is shuffled with the fold's group seed and the fold
/// holds out every `folds_per_group`-th sample starting at offset
/// `fold % folds_per_group`. The folds of one group therefore partition
/// the cohort, and each sample is held out once per group.
pub fn reproduce_fold_split(samples: &[String], fold: usize, config: &GatherConfig) -> FoldSplit {
    let mut sorted = samples.to_vec();
    sorted.sort();
    sorted.dedup();

    let shuffled = seeded_shuffle(&sorted, fold_group_seed(fold, config));
    let test: BTreeSet<String> = shuffled
        .into_iter()
        .skip(fold % config.folds_per_group)
        .step_by(config.folds_per_group)
        .collect();

    let train_samples = sorted
        .into_iter()
        .filter(|sample| !test.contains(sample))
        .collect();

    FoldSplit {
        fold,
        split_seed: fold_split_seed(fold, config),
        test_samples: test.into_iter().collect(),
        train_samples,
    }
}

/// Deals the enumerated mutation types to `task_count` tasks.
///
/// The list is shuffled with `seed` and the type at shuffled position `i`
/// goes to task `i % task_count`. Each inner vector keeps shuffled order.
pub fn assign_mutation_types(
    mutation_types: &[MutationType],
    task_count: usize,
    seed: u64,
) -> Vec<Vec<MutationType>> {
    let mut assignment = vec![Vec::new(); task_count];
    if task_count == 0 {
        return assignment;
    }
    for (i, mtype) in seeded_shuffle(mutation_types, seed).into_iter().enumerate() {
        assignment[i % task_count].push(mtype);
    }
    assignment
}

/// The mutation types a subset of tasks is responsible for, in shuffled order.
pub fn expected_mutation_types(
    mutation_types: &[MutationType],
    task_count: usize,
    tasks: &BTreeSet<usize>,
    seed: u64,
) -> Vec<MutationType> {
    if task_count == 0 {
        return Vec::new();
    }
    seeded_shuffle(mutation_types, seed)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| tasks.contains(&(i % task_count)))
        .map(|(_, mtype)| mtype)
        .collect()
}
