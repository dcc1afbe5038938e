//! # Consistency Validation
//!
//! Checks that stop a run before anything is persisted:
//!
//! - every task output record was produced by the same classifier with the
//!   same tuning priors,
//! - the mutation types recovered from each fold, and from every merged
//!   table, are exactly the types assigned to the requested tasks,
//! - the merged tables have the column multiplicities and cell lengths a
//!   complete run must have.

use crate::config::GatherConfig;
use crate::merge::MergedTables;
use crate::setup::Classifier;
use crate::types::{GatherError, LabeledTable, MutationType};
use itertools::Itertools;
use std::collections::HashMap;

/// Remembers the first classifier seen in a run and rejects any record that
/// disagrees with it.
#[derive(Debug)]
pub struct ClassifierGuard<C> {
    reference: Option<C>,
}

impl<C> Default for ClassifierGuard<C> {
    fn default() -> Self {
        Self { reference: None }
    }
}

impl<C: Classifier> ClassifierGuard<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, fold: usize, classifier: &C) -> Result<(), GatherError> {
        let Some(reference) = &self.reference else {
            self.reference = Some(classifier.clone());
            return Ok(());
        };
        if !reference.same_classifier(classifier) {
            return Err(GatherError::InconsistentClassifier {
                fold,
                expected: reference.name().to_string(),
                found: classifier.name().to_string(),
            });
        }
        if reference.tune_priors() != classifier.tune_priors() {
            return Err(GatherError::InconsistentTuning { fold });
        }
        Ok(())
    }

    pub fn reference(&self) -> Option<&C> {
        self.reference.as_ref()
    }

    pub fn into_reference(self) -> Option<C> {
        self.reference
    }
}

/// Whether two mutation-type lists hold the same types, ignoring order.
/// Duplicates count: a type recovered twice never matches a type enumerated once.
pub fn compare_mutation_sets(recovered: &[MutationType], expected: &[MutationType]) -> bool {
    recovered.len() == expected.len() && recovered.iter().sorted().eq(expected.iter().sorted())
}

/// Fails with a description of the difference unless the two lists match.
pub fn check_mutation_set(
    context: &str,
    recovered: &[MutationType],
    expected: &[MutationType],
) -> Result<(), GatherError> {
    if compare_mutation_sets(recovered, expected) {
        return Ok(());
    }

    let recovered_counts = recovered.iter().counts();
    let expected_counts = expected.iter().counts();
    let duplicated: Vec<&MutationType> = recovered_counts
        .iter()
        .filter(|&(_, &count)| count > 1)
        .map(|(mtype, _)| *mtype)
        .sorted()
        .collect();
    let unexpected: Vec<&MutationType> = recovered_counts
        .keys()
        .filter(|mtype| !expected_counts.contains_key(*mtype))
        .copied()
        .sorted()
        .collect();
    let missing: Vec<&MutationType> = expected_counts
        .keys()
        .filter(|mtype| !recovered_counts.contains_key(*mtype))
        .copied()
        .sorted()
        .collect();

    Err(GatherError::MutationSetMismatch {
        context: context.to_string(),
        detail: format!(
            "{} recovered vs {} expected; duplicated [{}], unexpected [{}], missing [{}]",
            recovered.len(),
            expected.len(),
            duplicated.iter().join(", "),
            unexpected.iter().join(", "),
            missing.iter().join(", ")
        ),
    })
}

fn check_key_multiplicity<T>(
    table: &LabeledTable<T>,
    required: Option<&[String]>,
    multiplicity: usize,
    invariant: &str,
) -> Result<(), GatherError> {
    let counts: HashMap<&str, usize> = table.columns.iter().map(|col| col.key.as_str()).counts();
    if let Some(required) = required {
        if let Some(absent) = required.iter().find(|key| !counts.contains_key(key.as_str())) {
            return Err(GatherError::ShapeMismatch(format!(
                "{invariant}: no columns at all for '{absent}'"
            )));
        }
    }
    if let Some((key, count)) = counts
        .iter()
        .sorted()
        .find(|&(_, &count)| count != multiplicity)
    {
        return Err(GatherError::ShapeMismatch(format!(
            "{invariant}: '{key}' appears in {count} columns, expected {multiplicity}"
        )));
    }
    Ok(())
}

fn check_column_count<T>(
    table: &LabeledTable<T>,
    expected: usize,
    invariant: &str,
) -> Result<(), GatherError> {
    if table.ncols() != expected {
        return Err(GatherError::ShapeMismatch(format!(
            "{invariant}: found {} columns, expected {expected}",
            table.ncols()
        )));
    }
    Ok(())
}

fn check_trace_lengths(
    table: &LabeledTable<Vec<f64>>,
    test_count: usize,
    invariant: &str,
) -> Result<(), GatherError> {
    for ((row, col), cell) in table.values.indexed_iter() {
        if cell.len() != test_count {
            return Err(GatherError::ShapeMismatch(format!(
                "{invariant}: {} in fold {} field '{}' has {} values, expected {test_count}",
                table.rows[row],
                table.columns[col].fold,
                table.columns[col].key,
                cell.len()
            )));
        }
    }
    Ok(())
}

/// Verifies the shape invariants of a complete merged run.
///
/// `cohort_samples` is the full cohort and `sc_samples` the single-cell index.
pub fn check_merged_shapes<C: Classifier>(
    merged: &MergedTables,
    classifier: &C,
    cohort_samples: &[String],
    sc_samples: &[String],
    config: &GatherConfig,
) -> Result<(), GatherError> {
    check_key_multiplicity(
        &merged.predictions,
        Some(cohort_samples),
        config.repeats(),
        "Inconsistent number of CV scores across cohort samples",
    )?;
    check_key_multiplicity(
        &merged.sc_scores,
        Some(sc_samples),
        config.fold_count,
        "Inconsistent number of CV scores across single-cell samples",
    )?;
    check_key_multiplicity(
        &merged.coefficients,
        None,
        config.fold_count,
        "Inconsistent number of model coefficients across cv-folds",
    )?;

    check_column_count(
        &merged.tuned_params,
        config.fold_count * classifier.tunable_params().len(),
        "Tuned parameter values missing for some CVs",
    )?;
    check_column_count(
        &merged.fit_times,
        config.fold_count * config.timing_fields,
        "Algorithm fitting times missing for some CVs",
    )?;
    check_trace_lengths(
        &merged.fit_times,
        classifier.test_count(),
        "Algorithm fitting times missing for some hyper-parameter values",
    )?;
    check_column_count(
        &merged.tune_accuracies,
        config.fold_count * config.accuracy_fields,
        "Algorithm tuning accuracies missing for some CVs",
    )?;
    check_trace_lengths(
        &merged.tune_accuracies,
        classifier.test_count(),
        "Algorithm tuning stats missing for some hyper-parameter values",
    )?;
    Ok(())
}

/// Verifies that every merged table covers exactly the expected mutation types.
pub fn check_merged_rows(merged: &MergedTables, expected: &[MutationType]) -> Result<(), GatherError> {
    let tables: [(&str, &[MutationType]); 6] = [
        ("merged predictions", &merged.predictions.rows),
        ("merged tuned parameters", &merged.tuned_params.rows),
        ("merged fit times", &merged.fit_times.rows),
        ("merged tuning accuracies", &merged.tune_accuracies.rows),
        ("merged coefficients", &merged.coefficients.rows),
        ("merged single-cell scores", &merged.sc_scores.rows),
    ];
    for (context, rows) in tables {
        check_mutation_set(context, rows, expected)?;
    }
    Ok(())
}
