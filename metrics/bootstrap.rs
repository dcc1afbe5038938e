//! Bootstrap confidence for the `mean` AUC view.
//!
//! Masks are drawn up front on one seeded generator, then every type is
//! scored against the same masks in parallel, so the resulting
//! distributions do not depend on how work is scheduled.

use crate::metrics::auc::auc;
use crate::setup::split::seeded_rng;
use crate::types::{GatherError, MutationType, PhenotypeTable};
use indicatif::ProgressBar;
use ndarray::{Array2, ArrayView1};
use rand::Rng;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Draws `draws` boolean masks over `samples` samples, each element kept
/// with probability one half. Row `d` is mask `d`.
pub fn draw_bootstrap_masks(samples: usize, draws: usize, seed: u64) -> Array2<bool> {
    let mut rng = seeded_rng(seed);
    let mut masks = Array2::from_elem((draws, samples), false);
    for mut mask in masks.rows_mut() {
        for keep in mask.iter_mut() {
            *keep = rng.gen_bool(0.5);
        }
    }
    masks
}

fn masked_auc(
    labels: ArrayView1<'_, bool>,
    scores: ArrayView1<'_, f64>,
    mask: ArrayView1<'_, bool>,
) -> Option<f64> {
    let mut negatives = Vec::new();
    let mut positives = Vec::new();
    for ((&label, &score), _) in labels
        .iter()
        .zip(scores.iter())
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
    {
        if label {
            positives.push(score);
        } else {
            negatives.push(score);
        }
    }
    auc(&negatives, &positives)
}

/// AUC of each type's mean scores restricted to every mask in turn.
///
/// `means` is `[type, sample]` in the row and sample order of `pheno`.
pub fn bootstrap_mean_auc(
    pool: &ThreadPool,
    means: &Array2<f64>,
    pheno: &PhenotypeTable,
    masks: &Array2<bool>,
    progress: &ProgressBar,
) -> Result<BTreeMap<MutationType, Vec<Option<f64>>>, GatherError> {
    if means.dim() != pheno.values.dim() || masks.ncols() != pheno.samples.len() {
        return Err(GatherError::ShapeMismatch(format!(
            "bootstrap over {:?} mean scores, {:?} labels and masks of length {}",
            means.dim(),
            pheno.values.dim(),
            masks.ncols()
        )));
    }

    let per_type: Vec<Vec<Option<f64>>> = pool.install(|| {
        (0..pheno.rows.len())
            .into_par_iter()
            .map(|i| {
                let labels = pheno.values.row(i);
                let scores = means.row(i);
                let draws = masks
                    .rows()
                    .into_iter()
                    .map(|mask| masked_auc(labels, scores, mask))
                    .collect();
                progress.inc(1);
                draws
            })
            .collect()
    });

    Ok(pheno.rows.iter().cloned().zip(per_type).collect())
}

/// Percentile interval of the defined values in `draws`, interpolating
/// linearly between order statistics. Quantiles are given in percent.
pub fn percentile_interval(draws: &[Option<f64>], lower: f64, upper: f64) -> Option<(f64, f64)> {
    let mut values: Vec<f64> = draws.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some((percentile(&values, lower), percentile(&values, upper)))
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    sorted[below] + (sorted[above] - sorted[below]) * (rank - below as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::worker_pool;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn fixture() -> (Array2<f64>, PhenotypeTable) {
        let means = array![[0.25, 0.5, 0.625, 0.25], [0.1, 0.2, 0.3, 0.4]];
        let pheno = PhenotypeTable {
            rows: vec![MutationType::new("KRAS"), MutationType::new("TP53")],
            samples: (0..4).map(|i| format!("s{i}")).collect(),
            values: array![[false, false, true, true], [false, true, false, true]],
        };
        (means, pheno)
    }

    #[test]
    fn masks_are_reproducible() {
        let first = draw_bootstrap_masks(57, 1000, 7609);
        let second = draw_bootstrap_masks(57, 1000, 7609);
        assert_eq!(first.dim(), (1000, 57));
        assert_eq!(first, second);
        assert_ne!(first, draw_bootstrap_masks(57, 1000, 7610));
    }

    fn mask_bits(mask: ArrayView1<'_, bool>) -> String {
        mask.iter().map(|&keep| if keep { '1' } else { '0' }).collect()
    }

    #[test]
    fn masks_match_recorded_values() {
        let masks = draw_bootstrap_masks(12, 1000, 7609);
        assert_eq!(mask_bits(masks.row(0)), "000010000101");
        assert_eq!(mask_bits(masks.row(1)), "100010101011");
        assert_eq!(mask_bits(masks.row(2)), "111011101010");
        assert_eq!(mask_bits(masks.row(999)), "110110100110");

        // Kept count and sum of flat positions over every draw.
        let kept = masks.iter().filter(|&&keep| keep).count();
        let position_sum: usize = masks
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(position, _)| position)
            .sum();
        assert_eq!(kept, 5973);
        assert_eq!(position_sum, 35_766_517);
    }

    #[test]
    fn masks_keep_about_half_the_samples() {
        let masks = draw_bootstrap_masks(100, 1000, 7609);
        let kept = masks.iter().filter(|&&keep| keep).count() as f64;
        let fraction = kept / masks.len() as f64;
        assert!((0.45..0.55).contains(&fraction), "kept fraction {fraction}");
    }

    #[test]
    fn full_mask_reproduces_the_mean_view() {
        let (means, pheno) = fixture();
        let masks = Array2::from_elem((3, 4), true);
        let pool = worker_pool(2).unwrap();
        let dist = bootstrap_mean_auc(&pool, &means, &pheno, &masks, &ProgressBar::hidden()).unwrap();
        assert_eq!(dist[&MutationType::new("KRAS")], vec![Some(0.5); 3]);
        assert_eq!(dist[&MutationType::new("TP53")], vec![Some(0.75); 3]);
    }

    #[test]
    fn masks_without_a_class_yield_no_value() {
        let (means, pheno) = fixture();
        let masks = array![[true, true, false, false], [false, true, true, false]];
        let pool = worker_pool(1).unwrap();
        let dist = bootstrap_mean_auc(&pool, &means, &pheno, &masks, &ProgressBar::hidden()).unwrap();
        // KRAS: only wild-type kept, then 0.5 against 0.625.
        assert_eq!(dist[&MutationType::new("KRAS")], vec![None, Some(1.0)]);
    }

    #[test]
    fn mismatched_mask_length_is_rejected() {
        let (means, pheno) = fixture();
        let masks = Array2::from_elem((2, 5), true);
        let pool = worker_pool(1).unwrap();
        assert!(matches!(
            bootstrap_mean_auc(&pool, &means, &pheno, &masks, &ProgressBar::hidden()),
            Err(GatherError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn percentile_interval_interpolates() {
        let draws: Vec<Option<f64>> = vec![Some(3.0), None, Some(1.0), Some(5.0), Some(2.0), Some(4.0)];
        let (lo, hi) = percentile_interval(&draws, 2.5, 97.5).unwrap();
        assert_abs_diff_eq!(lo, 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(hi, 4.9, epsilon = 1e-12);
        assert_eq!(percentile_interval(&[None, None], 2.5, 97.5), None);
    }
}
