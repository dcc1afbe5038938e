//! # Aggregation Pipeline
//!
//! One gather run, start to finish:
//!
//! 1. resolve the task output files and confirm every fold is complete,
//! 2. load each fold's records, check classifier consistency and reassemble
//!    the fold into labelled tables,
//! 3. merge the folds and verify every shape and mutation-set invariant,
//! 4. collapse predictions per sample and compute the AUC views and the
//!    bootstrap distribution,
//! 5. write the merged artifacts.
//!
//! Nothing is written to `merge/` until steps 1 through 4 have succeeded.

use crate::config::GatherConfig;
use crate::io::{
    ArtifactKind, load_task_record, merge_dir, output_tag, summary_path, write_artifact,
    write_auc_summary,
};
use crate::merge::{MergedTables, collapse_by_sample, merge_folds};
use crate::metrics::bootstrap::{bootstrap_mean_auc, draw_bootstrap_masks};
use crate::metrics::views::{compute_auc_views, mean_scores};
use crate::metrics::{summarize, worker_pool};
use crate::reassemble::{FoldContext, reassemble_fold};
use crate::resolve::resolve_task_files;
use crate::setup::split::expected_mutation_types;
use crate::setup::{
    Classifier, ClassifierSpec, Cohort, CohortData, ManifestMetadata, PipelineMetadata, RunSetup,
    SplitRequest,
};
use crate::types::{GatherError, LabeledTable, MutationType, PhenotypeTable, TaskOutputRecord};
use crate::validate::{ClassifierGuard, check_merged_rows, check_merged_shapes};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ndarray::Array2;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

// ========================================================================================
//                                  Progress reporting
// ========================================================================================

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    let style = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_message(message.to_string());

    pb
}

// ========================================================================================
//                                   Public API
// ========================================================================================

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct GatherOutcome {
    /// Suffix shared by every artifact of this run.
    pub tag: String,
    pub artifacts: Vec<PathBuf>,
    pub summary: PathBuf,
    pub tasks: BTreeSet<usize>,
    pub mutation_types: usize,
    pub folds: usize,
}

/// Everything tuning-related, persisted as the `tune` artifact.
#[derive(Serialize)]
struct TuneArtifact<'a, C> {
    classifier: &'a C,
    tuned_params: &'a LabeledTable<f64>,
    fit_times: &'a LabeledTable<Vec<f64>>,
    tune_accuracies: &'a LabeledTable<Vec<f64>>,
}

/// Gathers the run in `run_dir` from its `setup/` files, using the
/// manifest's task count.
pub fn run(run_dir: &Path, requested: Option<&BTreeSet<usize>>) -> Result<GatherOutcome, GatherError> {
    run_with(run_dir, requested, &ManifestMetadata)
}

/// Gathers the run in `run_dir`, asking `metadata` for the task count.
///
/// Run settings come from the manifest's `[gather]` table when there is one.
pub fn run_with<M: PipelineMetadata>(
    run_dir: &Path,
    requested: Option<&BTreeSet<usize>>,
    metadata: &M,
) -> Result<GatherOutcome, GatherError> {
    let task_count = metadata.task_count(run_dir)?;
    let config = GatherConfig::load(run_dir)?;
    let setup = RunSetup::<CohortData>::load(run_dir)?;
    gather::<ClassifierSpec, _>(run_dir, requested, task_count, setup, &config)
}

/// Runs the aggregation for classifier records of type `C` over the cohort in `setup`.
pub fn gather<C, K>(
    run_dir: &Path,
    requested: Option<&BTreeSet<usize>>,
    task_count: usize,
    setup: RunSetup<K>,
    config: &GatherConfig,
) -> Result<GatherOutcome, GatherError>
where
    C: Classifier + Serialize + DeserializeOwned,
    K: Cohort,
{
    config.validate()?;
    let RunSetup {
        mutation_types,
        features,
        mut cohort,
        sc_samples,
    } = setup;

    let resolved = resolve_task_files(&run_dir.join("output"), requested, task_count, config)?;
    let expected = expected_mutation_types(
        &mutation_types,
        task_count,
        &resolved.tasks,
        config.assignment_seed,
    );
    log::info!(
        "Tasks {:?} are responsible for {} mutation types",
        resolved.tasks,
        expected.len()
    );

    // --- Per-fold reassembly ---
    let context = FoldContext {
        config,
        expected: &expected,
        features: &features,
        sc_samples: &sc_samples,
    };
    let mut guard = ClassifierGuard::<C>::new();
    let mut folds = Vec::with_capacity(config.fold_count);
    let pb = create_progress_bar(config.fold_count as u64, "Reassembling cross-validation folds");
    for (fold, paths) in resolved.by_fold.iter().enumerate() {
        let records = paths
            .iter()
            .map(|path| load_task_record::<C>(path))
            .collect::<Result<Vec<TaskOutputRecord<C>>, GatherError>>()?;
        for record in &records {
            guard.check(fold, &record.classifier)?;
        }
        let classifier = guard.reference().ok_or_else(|| {
            GatherError::IncompleteOutput(format!("c-v fold <{fold}> has no task output records"))
        })?;
        folds.push(reassemble_fold(fold, &records, classifier, &mut cohort, &context)?);
        log::debug!("Loaded {} records for fold {fold}", records.len());
        pb.inc(1);
    }
    pb.finish_and_clear();

    // --- Cross-fold merge and validation ---
    let merged = merge_folds(folds)?;
    let classifier = guard
        .into_reference()
        .ok_or_else(|| GatherError::IncompleteOutput("no task output records".to_string()))?;
    let cohort_samples = cohort.samples();
    check_merged_shapes(&merged, &classifier, &cohort_samples, &sc_samples, config)?;
    check_merged_rows(&merged, &expected)?;
    log::info!(
        "Merged {} folds: {} mutation types, {} prediction columns",
        config.fold_count,
        merged.predictions.nrows(),
        merged.predictions.ncols()
    );

    // --- Labels, collapsed scores and metrics ---
    let pheno = training_phenotypes(&mut cohort, &merged.predictions.rows, config)?;
    let predictions = collapse_by_sample(&merged.predictions, &pheno.samples, config.repeats())?;
    let sc_scores = collapse_by_sample(&merged.sc_scores, &sc_samples, config.fold_count)?;

    let pool = worker_pool(config.max_workers)?;
    let views = compute_auc_views(&pool, &predictions, &pheno)?;
    let masks = draw_bootstrap_masks(pheno.samples.len(), config.bootstrap_draws, config.bootstrap_seed);
    let pb = create_progress_bar(pheno.rows.len() as u64, "Bootstrapping mean-score AUCs");
    let conf = bootstrap_mean_auc(&pool, &mean_scores(&predictions)?, &pheno, &masks, &pb)?;
    pb.finish_and_clear();
    let summary_rows = summarize(&views, &conf);

    // --- Persist ---
    let tag = output_tag(requested);
    let out_dir = merge_dir(run_dir);
    let MergedTables {
        coefficients,
        tuned_params,
        fit_times,
        tune_accuracies,
        ..
    } = &merged;
    let tune = TuneArtifact {
        classifier: &classifier,
        tuned_params,
        fit_times,
        tune_accuracies,
    };
    let artifacts = vec![
        write_artifact(&out_dir, ArtifactKind::Coef, &tag, coefficients)?,
        write_artifact(&out_dir, ArtifactKind::Pred, &tag, &predictions)?,
        write_artifact(&out_dir, ArtifactKind::Sc, &tag, &sc_scores)?,
        write_artifact(&out_dir, ArtifactKind::Tune, &tag, &tune)?,
        write_artifact(&out_dir, ArtifactKind::Pheno, &tag, &pheno)?,
        write_artifact(&out_dir, ArtifactKind::Aucs, &tag, &views)?,
        write_artifact(&out_dir, ArtifactKind::Conf, &tag, &conf)?,
    ];
    let summary = summary_path(&out_dir, &tag);
    write_auc_summary(&summary, &summary_rows)?;
    log::info!("Wrote AUC summary to {}", summary.display());

    Ok(GatherOutcome {
        tag,
        artifacts,
        summary,
        tasks: resolved.tasks,
        mutation_types: expected.len(),
        folds: config.fold_count,
    })
}

/// Ground-truth labels over the whole cohort, taken as the training set of a
/// split that holds nothing out.
fn training_phenotypes<K: Cohort>(
    cohort: &mut K,
    rows: &[MutationType],
    config: &GatherConfig,
) -> Result<PhenotypeTable, GatherError> {
    cohort.update_split(SplitRequest::Proportion {
        seed: config.split_seed_base,
        test_prop: 0.0,
    })?;
    let samples = cohort.train_samples();

    let mut values = Array2::from_elem((rows.len(), samples.len()), false);
    for (i, mtype) in rows.iter().enumerate() {
        let labels = cohort.train_pheno(mtype)?;
        if labels.len() != samples.len() {
            return Err(GatherError::ShapeMismatch(format!(
                "phenotype of {mtype} covers {} samples, expected {}",
                labels.len(),
                samples.len()
            )));
        }
        for (cell, label) in values.row_mut(i).iter_mut().zip(labels) {
            *cell = label;
        }
    }

    Ok(PhenotypeTable {
        rows: rows.to_vec(),
        samples,
        values,
    })
}
