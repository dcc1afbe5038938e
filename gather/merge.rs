//! # Cross-Fold Merging
//!
//! Fold tables are concatenated column-wise into run-wide matrices whose
//! column labels keep their fold of origin. Prediction and single-cell score
//! matrices are then collapsed from "one column per (fold, sample)" into one
//! array of scores per sample.

use crate::reassemble::FoldTables;
use crate::types::{ColumnLabel, GatherError, LabeledTable, MutationType, ScoreArrays};
use ndarray::{Array3, Axis, concatenate};
use std::collections::HashMap;

/// Run-wide matrices built from every fold.
#[derive(Debug, Clone)]
pub struct MergedTables {
    pub predictions: LabeledTable<f64>,
    pub sc_scores: LabeledTable<f64>,
    pub coefficients: LabeledTable<f64>,
    pub tuned_params: LabeledTable<f64>,
    pub fit_times: LabeledTable<Vec<f64>>,
    pub tune_accuracies: LabeledTable<Vec<f64>>,
}

/// Concatenates tables of the same kind along the column axis.
///
/// All tables must share the same row order.
pub fn concat_columns<T: Clone>(
    kind: &str,
    tables: &[&LabeledTable<T>],
) -> Result<LabeledTable<T>, GatherError> {
    let Some(first) = tables.first() else {
        return Err(GatherError::IncompleteOutput(format!("no folds to merge for {kind}")));
    };
    if let Some(odd) = tables.iter().find(|table| table.rows != first.rows) {
        let fold = odd.columns.first().map(|col| col.fold);
        return Err(GatherError::MutationSetMismatch {
            context: format!("merged {kind}"),
            detail: format!(
                "fold {fold:?} has rows [{}] but the first fold has [{}]",
                odd.rows.iter().map(MutationType::as_str).collect::<Vec<_>>().join(", "),
                first.rows.iter().map(MutationType::as_str).collect::<Vec<_>>().join(", ")
            ),
        });
    }

    let views: Vec<_> = tables.iter().map(|table| table.values.view()).collect();
    let values = concatenate(Axis(1), &views)
        .map_err(|err| GatherError::ShapeMismatch(format!("merging {kind}: {err}")))?;
    let columns: Vec<ColumnLabel> = tables
        .iter()
        .flat_map(|table| table.columns.iter().cloned())
        .collect();

    Ok(LabeledTable {
        rows: first.rows.clone(),
        columns,
        values,
    })
}

fn merge_kind<T: Clone>(
    folds: &[FoldTables],
    kind: &str,
    pick: impl Fn(&FoldTables) -> &LabeledTable<T>,
) -> Result<LabeledTable<T>, GatherError> {
    let tables: Vec<&LabeledTable<T>> = folds.iter().map(pick).collect();
    concat_columns(kind, &tables)
}

/// Merges per-fold tables in fold order.
pub fn merge_folds(mut folds: Vec<FoldTables>) -> Result<MergedTables, GatherError> {
    folds.sort_by_key(|tables| tables.fold);

    Ok(MergedTables {
        predictions: merge_kind(&folds, "predictions", |t| &t.predictions)?,
        sc_scores: merge_kind(&folds, "single-cell scores", |t| &t.sc_scores)?,
        coefficients: merge_kind(&folds, "coefficients", |t| &t.coefficients)?,
        tuned_params: merge_kind(&folds, "tuned parameters", |t| &t.tuned_params)?,
        fit_times: merge_kind(&folds, "fit times", |t| &t.fit_times)?,
        tune_accuracies: merge_kind(&folds, "tuning accuracies", |t| &t.tune_accuracies)?,
    })
}

/// Collapses repeated sample columns into one array of scores per sample.
///
/// `samples` fixes the sample axis of the result; every one of them must
/// appear in exactly `repeats` columns, which are taken in column (fold)
/// order. Columns naming samples outside `samples` are rejected.
pub fn collapse_by_sample(
    table: &LabeledTable<f64>,
    samples: &[String],
    repeats: usize,
) -> Result<ScoreArrays, GatherError> {
    let position: HashMap<&str, usize> = samples
        .iter()
        .enumerate()
        .map(|(i, sample)| (sample.as_str(), i))
        .collect();

    let mut filled = vec![0usize; samples.len()];
    let mut values = Array3::from_elem((table.nrows(), samples.len(), repeats), f64::NAN);

    for (j, column) in table.columns.iter().enumerate() {
        let Some(&s) = position.get(column.key.as_str()) else {
            return Err(GatherError::ShapeMismatch(format!(
                "scores for '{}' in fold {} belong to no known sample",
                column.key, column.fold
            )));
        };
        let r = filled[s];
        if r >= repeats {
            return Err(GatherError::ShapeMismatch(format!(
                "Incorrect number of testing CV scores: '{}' has more than {repeats}",
                column.key
            )));
        }
        values
            .slice_mut(ndarray::s![.., s, r])
            .assign(&table.values.column(j));
        filled[s] += 1;
    }

    if let Some((s, &count)) = filled.iter().enumerate().find(|&(_, &count)| count != repeats) {
        return Err(GatherError::ShapeMismatch(format!(
            "Incorrect number of testing CV scores: '{}' has {count}, expected {repeats}",
            samples[s]
        )));
    }

    Ok(ScoreArrays {
        rows: table.rows.clone(),
        samples: samples.to_vec(),
        values,
    })
}
