//! # Fold Reassembly
//!
//! Task output records only store scores in fold-local draw order; they do
//! not carry sample identities. For each fold this module replays the split
//! the jobs used, merges every task's per-mutation-type values into one table
//! per data kind and labels the columns with the identities they belong to.

use crate::config::GatherConfig;
use crate::setup::split::reproduce_fold_split;
use crate::setup::{Classifier, Cohort, SplitRequest};
use crate::types::{ColumnLabel, GatherError, LabeledTable, MutationType, TaskOutputRecord};
use crate::validate::check_mutation_set;
use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeMap, BTreeSet};

/// Run-wide inputs shared by every fold.
#[derive(Debug, Clone, Copy)]
pub struct FoldContext<'a> {
    pub config: &'a GatherConfig,
    /// Mutation types assigned to the requested tasks.
    pub expected: &'a [MutationType],
    /// Features every coefficient table must carry.
    pub features: &'a BTreeSet<String>,
    /// Column labels of single-cell score tables.
    pub sc_samples: &'a [String],
}

/// All tables of one fold. Rows are sorted by mutation type.
#[derive(Debug, Clone)]
pub struct FoldTables {
    pub fold: usize,
    pub test_samples: Vec<String>,
    pub predictions: LabeledTable<f64>,
    pub sc_scores: LabeledTable<f64>,
    pub coefficients: LabeledTable<f64>,
    pub tuned_params: LabeledTable<f64>,
    pub fit_times: LabeledTable<Vec<f64>>,
    pub tune_accuracies: LabeledTable<Vec<f64>>,
}

/// Puts `cohort` back into the split `fold` was evaluated on and returns the
/// held-out samples in the order the classifier scored them.
pub fn recover_test_samples<K: Cohort>(
    cohort: &mut K,
    fold: usize,
    config: &GatherConfig,
) -> Result<Vec<String>, GatherError> {
    let split = reproduce_fold_split(&cohort.samples(), fold, config);
    cohort.update_split(SplitRequest::Explicit {
        seed: split.split_seed,
        test_samples: split.test_samples,
    })?;
    Ok(cohort.test_samples())
}

fn fold_context(fold: usize) -> String {
    format!("c-v fold <{fold}>")
}

/// Collects one data kind across all records of a fold, sorted by type.
fn gather_rows<'r, V: 'r>(
    fold: usize,
    kind: &str,
    entries: impl Iterator<Item = (&'r MutationType, &'r V)>,
    expected: &[MutationType],
) -> Result<Vec<(&'r MutationType, &'r V)>, GatherError> {
    let mut rows: Vec<(&MutationType, &V)> = entries.collect();
    let recovered: Vec<MutationType> = rows.iter().map(|(mtype, _)| (*mtype).clone()).collect();
    check_mutation_set(&format!("{kind} of {}", fold_context(fold)), &recovered, expected)?;
    rows.sort_by(|a, b| a.0.cmp(b.0));
    Ok(rows)
}

fn row_labels<V>(rows: &[(&MutationType, V)]) -> Vec<MutationType> {
    rows.iter().map(|(mtype, _)| (*mtype).clone()).collect()
}

fn labelled_columns<'k>(fold: usize, keys: impl IntoIterator<Item = &'k str>) -> Vec<ColumnLabel> {
    keys.into_iter().map(|key| ColumnLabel::new(fold, key)).collect()
}

fn score_table(
    fold: usize,
    kind: &str,
    rows: &[(&MutationType, &Vec<f64>)],
    labels: &[String],
) -> Result<LabeledTable<f64>, GatherError> {
    let mut values = Array2::zeros((rows.len(), labels.len()));
    for (i, (mtype, scores)) in rows.iter().enumerate() {
        if scores.len() != labels.len() {
            return Err(GatherError::ShapeMismatch(format!(
                "{kind} for {mtype} in {} hold {} values, but {} samples are labelled",
                fold_context(fold),
                scores.len(),
                labels.len()
            )));
        }
        values.row_mut(i).assign(&ArrayView1::from(scores.as_slice()));
    }
    Ok(LabeledTable {
        rows: row_labels(rows),
        columns: labelled_columns(fold, labels.iter().map(String::as_str)),
        values,
    })
}

/// Coefficients over the union of the setup features and every feature a
/// task used, with absent coefficients filled with zero.
fn coefficient_table(
    fold: usize,
    rows: &[(&MutationType, &BTreeMap<String, f64>)],
    features: &BTreeSet<String>,
) -> LabeledTable<f64> {
    let mut union: BTreeSet<&str> = features.iter().map(String::as_str).collect();
    for (_, coefs) in rows {
        union.extend(coefs.keys().map(String::as_str));
    }
    let keys: Vec<&str> = union.into_iter().collect();

    let values = Array2::from_shape_fn((rows.len(), keys.len()), |(i, j)| {
        rows[i]
            .1
            .get(keys[j])
            .copied()
            .filter(|value| !value.is_nan())
            .unwrap_or(0.0)
    });

    LabeledTable {
        rows: row_labels(rows),
        columns: labelled_columns(fold, keys.iter().copied()),
        values,
    }
}

fn tuned_param_table(
    fold: usize,
    rows: &[(&MutationType, &BTreeMap<String, f64>)],
    params: &[&str],
) -> Result<LabeledTable<f64>, GatherError> {
    let mut values = Array2::zeros((rows.len(), params.len()));
    for (i, (mtype, tuned)) in rows.iter().enumerate() {
        if let Some(extra) = tuned.keys().find(|key| !params.contains(&key.as_str())) {
            return Err(GatherError::ShapeMismatch(format!(
                "{mtype} in {} reports parameter '{extra}' that the classifier does not tune",
                fold_context(fold)
            )));
        }
        for (j, param) in params.iter().enumerate() {
            values[[i, j]] = *tuned.get(*param).ok_or_else(|| {
                GatherError::ShapeMismatch(format!(
                    "Tuned parameter values missing for some CVs: {mtype} in {} has no '{param}'",
                    fold_context(fold)
                ))
            })?;
        }
    }
    Ok(LabeledTable {
        rows: row_labels(rows),
        columns: labelled_columns(fold, params.iter().copied()),
        values,
    })
}

/// Per-field traces (fit times, tuning accuracies). Every type must report
/// every field any type in the fold reports.
fn trace_table(
    fold: usize,
    kind: &str,
    rows: &[(&MutationType, &BTreeMap<String, Vec<f64>>)],
) -> Result<LabeledTable<Vec<f64>>, GatherError> {
    let fields: BTreeSet<&str> = rows
        .iter()
        .flat_map(|(_, traces)| traces.keys().map(String::as_str))
        .collect();

    let mut cells = Vec::with_capacity(rows.len() * fields.len());
    for (mtype, traces) in rows {
        for field in &fields {
            let trace = traces.get(*field).ok_or_else(|| {
                GatherError::ShapeMismatch(format!(
                    "{kind} missing for some CVs: {mtype} in {} has no '{field}' field",
                    fold_context(fold)
                ))
            })?;
            cells.push(trace.clone());
        }
    }

    let values = Array2::from_shape_vec((rows.len(), fields.len()), cells)
        .map_err(|err| GatherError::ShapeMismatch(format!("{kind} in {}: {err}", fold_context(fold))))?;

    Ok(LabeledTable {
        rows: row_labels(rows),
        columns: labelled_columns(fold, fields.iter().copied()),
        values,
    })
}

/// Single-cell scores over the run's single-cell index. A run without
/// single-cell samples gets a table with no columns, and its records must
/// not report any scores.
fn single_cell_table<C>(
    fold: usize,
    records: &[TaskOutputRecord<C>],
    predictions: &[(&MutationType, &Vec<f64>)],
    context: &FoldContext<'_>,
) -> Result<LabeledTable<f64>, GatherError> {
    if context.sc_samples.is_empty() {
        let reported = records
            .iter()
            .flat_map(|record| record.sc_scores.iter())
            .find(|(_, scores)| !scores.is_empty());
        if let Some((mtype, scores)) = reported {
            return Err(GatherError::ShapeMismatch(format!(
                "Single-cell scores for {mtype} in {} hold {} values, but the run has no single-cell samples",
                fold_context(fold),
                scores.len()
            )));
        }
        return Ok(LabeledTable {
            rows: row_labels(predictions),
            columns: Vec::new(),
            values: Array2::<f64>::zeros((predictions.len(), 0)),
        });
    }

    let rows = gather_rows(
        fold,
        "single-cell scores",
        records.iter().flat_map(|record| record.sc_scores.iter()),
        context.expected,
    )?;
    score_table(fold, "Single-cell scores", &rows, context.sc_samples)
}

/// Merges the records of one fold into labelled tables.
///
/// `records` must all come from `fold` and must already have passed the
/// classifier consistency check.
pub fn reassemble_fold<C: Classifier, K: Cohort>(
    fold: usize,
    records: &[TaskOutputRecord<C>],
    classifier: &C,
    cohort: &mut K,
    context: &FoldContext<'_>,
) -> Result<FoldTables, GatherError> {
    let expected = context.expected;

    let predictions = gather_rows(
        fold,
        "predictions",
        records.iter().flat_map(|record| record.predictions.iter()),
        expected,
    )?;
    let tuned = gather_rows(
        fold,
        "tuned parameters",
        records.iter().flat_map(|record| record.tuned_params.iter()),
        expected,
    )?;
    let times = gather_rows(
        fold,
        "fit times",
        records.iter().flat_map(|record| record.fit_times.iter()),
        expected,
    )?;
    let accuracies = gather_rows(
        fold,
        "tuning accuracies",
        records.iter().flat_map(|record| record.tune_accuracies.iter()),
        expected,
    )?;
    let coefficients = gather_rows(
        fold,
        "coefficients",
        records.iter().flat_map(|record| record.coefficients.iter()),
        expected,
    )?;
    let sc_scores = single_cell_table(fold, records, &predictions, context)?;

    let test_samples = recover_test_samples(cohort, fold, context.config)?;
    log::debug!(
        "Recovered {} held-out samples for {}",
        test_samples.len(),
        fold_context(fold)
    );

    Ok(FoldTables {
        fold,
        predictions: score_table(fold, "Predictions", &predictions, &test_samples)?,
        sc_scores,
        coefficients: coefficient_table(fold, &coefficients, context.features),
        tuned_params: tuned_param_table(fold, &tuned, &classifier.tunable_params())?,
        fit_times: trace_table(fold, "Algorithm fitting times", &times)?,
        tune_accuracies: trace_table(fold, "Algorithm tuning accuracies", &accuracies)?,
        test_samples,
    })
}
