//! The three AUC views over merged predictions, plus pooled average precision.

use crate::metrics::auc::{auc, average_precision, split_by_label};
use crate::types::{GatherError, MutationType, PhenotypeTable, ScoreArrays};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-type AUCs of a run, keyed by mutation type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AucViews {
    /// Every held-out score of every repeat pooled together.
    pub all: BTreeMap<MutationType, Option<f64>>,
    /// One AUC per repeat.
    #[serde(rename = "CV")]
    pub cv: BTreeMap<MutationType, Vec<Option<f64>>>,
    /// Scores averaged per sample before ranking.
    pub mean: BTreeMap<MutationType, Option<f64>>,
    /// Average precision of the pooled scores.
    pub aupr: BTreeMap<MutationType, Option<f64>>,
}

struct TypeAucs {
    all: Option<f64>,
    cv: Vec<Option<f64>>,
    mean: Option<f64>,
    aupr: Option<f64>,
}

/// Fails unless `pheno` labels the same types and samples as `scores`, in
/// the same order.
pub fn check_alignment(scores: &ScoreArrays, pheno: &PhenotypeTable) -> Result<(), GatherError> {
    if scores.rows != pheno.rows {
        return Err(GatherError::MutationSetMismatch {
            context: "phenotype labels".to_string(),
            detail: format!(
                "{} scored types vs {} labelled types",
                scores.rows.len(),
                pheno.rows.len()
            ),
        });
    }
    if scores.samples != pheno.samples {
        return Err(GatherError::ShapeMismatch(format!(
            "predictions cover {} samples but phenotypes cover {}",
            scores.samples.len(),
            pheno.samples.len()
        )));
    }
    Ok(())
}

/// Per-sample mean score across repeats, `[type, sample]`.
pub fn mean_scores(scores: &ScoreArrays) -> Result<Array2<f64>, GatherError> {
    scores
        .values
        .mean_axis(Axis(2))
        .ok_or_else(|| GatherError::ShapeMismatch("no repeats to average predictions over".to_string()))
}

fn type_aucs(
    labels: ArrayView1<'_, bool>,
    scores: ArrayView2<'_, f64>,
    means: ArrayView1<'_, f64>,
) -> TypeAucs {
    let repeats = scores.ncols();
    let pooled_labels: Vec<bool> = labels
        .iter()
        .flat_map(|&label| std::iter::repeat_n(label, repeats))
        .collect();
    let pooled_scores: Vec<f64> = scores.iter().copied().collect();

    let (neg, pos) = split_by_label(&pooled_labels, &pooled_scores);
    let cv = scores
        .axis_iter(Axis(1))
        .map(|repeat| {
            let (neg, pos) = split_by_label(labels.iter(), repeat.iter());
            auc(&neg, &pos)
        })
        .collect();
    let (mean_neg, mean_pos) = split_by_label(labels.iter(), means.iter());

    TypeAucs {
        all: auc(&neg, &pos),
        cv,
        mean: auc(&mean_neg, &mean_pos),
        aupr: average_precision(&pooled_labels, &pooled_scores),
    }
}

/// Computes the `all`, `CV` and `mean` views for every type on `pool`.
pub fn compute_auc_views(
    pool: &ThreadPool,
    scores: &ScoreArrays,
    pheno: &PhenotypeTable,
) -> Result<AucViews, GatherError> {
    check_alignment(scores, pheno)?;
    let means = mean_scores(scores)?;

    let per_type: Vec<TypeAucs> = pool.install(|| {
        (0..scores.rows.len())
            .into_par_iter()
            .map(|i| {
                type_aucs(
                    pheno.values.row(i),
                    scores.values.index_axis(Axis(0), i),
                    means.row(i),
                )
            })
            .collect()
    });

    let mut views = AucViews::default();
    for (mtype, aucs) in scores.rows.iter().zip(per_type) {
        views.all.insert(mtype.clone(), aucs.all);
        views.cv.insert(mtype.clone(), aucs.cv);
        views.mean.insert(mtype.clone(), aucs.mean);
        views.aupr.insert(mtype.clone(), aucs.aupr);
    }
    log::info!("Computed AUC views for {} mutation types", scores.rows.len());
    Ok(views)
}
