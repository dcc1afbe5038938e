//! # Metric Estimation
//!
//! AUC views over the merged held-out predictions and bootstrap confidence
//! for the per-sample mean view. All fan-out runs on a dedicated rayon pool.

pub mod auc;
pub mod bootstrap;
pub mod views;

use crate::types::{GatherError, MutationType};
use bootstrap::percentile_interval;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use views::AucViews;

pub const CI_LOWER_PERCENTILE: f64 = 2.5;
pub const CI_UPPER_PERCENTILE: f64 = 97.5;

/// Builds the AUC worker pool, capped at `max_workers` and the host's cores.
pub fn worker_pool(max_workers: usize) -> Result<ThreadPool, GatherError> {
    let threads = max_workers.min(num_cpus::get()).max(1);
    log::debug!("Building AUC worker pool with {threads} threads");
    Ok(ThreadPoolBuilder::new().num_threads(threads).build()?)
}

/// One line of the tab-separated AUC summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AucSummaryRow {
    pub mutation_type: String,
    pub auc_all: Option<f64>,
    pub auc_mean: Option<f64>,
    /// Mean of the per-repeat AUCs that are defined.
    pub auc_cv_mean: Option<f64>,
    pub aupr: Option<f64>,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

/// Tabulates the views and bootstrap intervals per type, in type order.
pub fn summarize(
    views: &AucViews,
    bootstrap: &BTreeMap<MutationType, Vec<Option<f64>>>,
) -> Vec<AucSummaryRow> {
    views
        .all
        .iter()
        .map(|(mtype, &auc_all)| {
            let auc_cv_mean = views.cv.get(mtype).and_then(|repeats| {
                let defined: Vec<f64> = repeats.iter().flatten().copied().collect();
                (!defined.is_empty()).then(|| defined.iter().sum::<f64>() / defined.len() as f64)
            });
            let interval = bootstrap
                .get(mtype)
                .and_then(|draws| percentile_interval(draws, CI_LOWER_PERCENTILE, CI_UPPER_PERCENTILE));
            AucSummaryRow {
                mutation_type: mtype.to_string(),
                auc_all,
                auc_mean: views.mean.get(mtype).copied().flatten(),
                auc_cv_mean,
                aupr: views.aupr.get(mtype).copied().flatten(),
                ci_lower: interval.map(|(lo, _)| lo),
                ci_upper: interval.map(|(_, hi)| hi),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pool_never_exceeds_the_cap() {
        let pool = worker_pool(1).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
        let pool = worker_pool(12).unwrap();
        assert!(pool.current_num_threads() <= 12);
    }

    #[test]
    fn summary_rows_follow_type_order() {
        let kras = MutationType::new("KRAS");
        let tp53 = MutationType::new("TP53");
        let mut views = AucViews::default();
        for (mtype, value) in [(&tp53, 0.75), (&kras, 0.5)] {
            views.all.insert(mtype.clone(), Some(value));
            views.mean.insert(mtype.clone(), Some(value));
            views.aupr.insert(mtype.clone(), Some(value));
        }
        views.cv.insert(kras.clone(), vec![Some(0.25), None, Some(0.75)]);
        views.cv.insert(tp53.clone(), vec![None, None]);
        let mut bootstrap = BTreeMap::new();
        bootstrap.insert(kras.clone(), vec![Some(0.5); 10]);

        let rows = summarize(&views, &bootstrap);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mutation_type, "KRAS");
        assert_abs_diff_eq!(rows[0].auc_cv_mean.unwrap(), 0.5);
        assert_eq!(rows[0].ci_lower, Some(0.5));
        assert_eq!(rows[1].mutation_type, "TP53");
        assert_eq!(rows[1].auc_cv_mean, None);
        assert_eq!(rows[1].ci_upper, None);
    }
}
