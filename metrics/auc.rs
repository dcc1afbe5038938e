//! Rank statistics over held-out classifier scores.

use std::cmp::Ordering;

/// Fraction of (negative, positive) score pairs in which the negative score is
/// strictly lower than the positive one.
///
/// Tied pairs count as zero, unlike the textbook ROC AUC which credits them
/// with one half, so `auc(&[0.5], &[0.5]) == Some(0.0)`. NaN scores compare
/// as never lower and never higher but still count towards the number of
/// pairs. Returns `None` when either class is empty.
pub fn auc(negatives: &[f64], positives: &[f64]) -> Option<f64> {
    if negatives.is_empty() || positives.is_empty() {
        return None;
    }

    let mut sorted: Vec<f64> = positives.iter().copied().filter(|p| !p.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut lower = 0usize;
    for &neg in negatives.iter().filter(|n| !n.is_nan()) {
        let not_above = sorted.partition_point(|&pos| pos <= neg);
        lower += sorted.len() - not_above;
    }

    Some(lower as f64 / (negatives.len() * positives.len()) as f64)
}

/// Splits `scores` into (negative, positive) vectors by `labels`.
pub fn split_by_label<'a>(
    labels: impl IntoIterator<Item = &'a bool>,
    scores: impl IntoIterator<Item = &'a f64>,
) -> (Vec<f64>, Vec<f64>) {
    let mut negatives = Vec::new();
    let mut positives = Vec::new();
    for (&label, &score) in labels.into_iter().zip(scores) {
        if label {
            positives.push(score);
        } else {
            negatives.push(score);
        }
    }
    (negatives, positives)
}

/// Average precision of `scores` ranked against `labels`.
///
/// Samples with equal scores share one threshold. Pairs whose score is NaN
/// are dropped first. Returns `None` when no positive sample remains.
pub fn average_precision(labels: &[bool], scores: &[f64]) -> Option<f64> {
    let mut ranked: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels)
        .filter(|(score, _)| !score.is_nan())
        .map(|(&score, &label)| (score, label))
        .collect();
    let total_pos = ranked.iter().filter(|(_, label)| *label).count();
    if total_pos == 0 {
        return None;
    }
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let mut precision_sum = 0.0;
    let mut last_recall = 0.0;
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < ranked.len() {
        let threshold = ranked[i].0;
        while i < ranked.len() && ranked[i].0 == threshold {
            if ranked[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let recall = tp as f64 / total_pos as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        precision_sum += (recall - last_recall) * precision;
        last_recall = recall;
    }

    Some(precision_sum)
}
