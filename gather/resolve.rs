//! # Task File Resolution
//!
//! Each classifier job writes one file per (task, fold) into `output/`, named
//! `out__cv-<fold>_task-<task>.json` (optionally `.gz`-compressed). This
//! module finds those files, recovers the two ids from each name, restricts
//! them to the requested task subset and groups them by fold. A run is only
//! accepted when every fold has exactly one file for every requested task.

use crate::config::GatherConfig;
use crate::types::GatherError;
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "out__cv-";
const TASK_TOKEN: &str = "_task-";

/// Parses `(task, fold)` from a task output file name.
///
/// Returns `None` for names that do not follow the
/// `out__cv-<fold>_task-<task>.<ext>` pattern.
pub fn parse_task_file_name(name: &str) -> Option<(usize, usize)> {
    let (stem, extension) = name.split_once('.')?;
    if extension.is_empty() {
        return None;
    }
    let ids = stem.strip_prefix(FILE_PREFIX)?;
    let (fold, task) = ids.split_once(TASK_TOKEN)?;
    Some((task.parse().ok()?, fold.parse().ok()?))
}

/// Task output files of one run, filtered to the requested tasks.
#[derive(Debug, Clone)]
pub struct ResolvedOutputs {
    /// Every accepted file with its `(task, fold)` ids.
    pub files: AHashMap<PathBuf, (usize, usize)>,
    /// Accepted files grouped by fold, each group ordered by task id.
    pub by_fold: Vec<Vec<PathBuf>>,
    /// Tasks whose outputs are being merged.
    pub tasks: BTreeSet<usize>,
    /// Total number of tasks dispatched for the run.
    pub task_count: usize,
}

/// Scans `output_dir` and validates that the requested tasks are complete.
///
/// `requested` restricts the merge to a task subset; `None` merges all
/// `task_count` tasks.
pub fn resolve_task_files(
    output_dir: &Path,
    requested: Option<&BTreeSet<usize>>,
    task_count: usize,
    config: &GatherConfig,
) -> Result<ResolvedOutputs, GatherError> {
    let tasks: BTreeSet<usize> = match requested {
        Some(tasks) => {
            if let Some(bad) = tasks.iter().find(|&&task| task >= task_count) {
                return Err(GatherError::InvalidSetup(format!(
                    "task {bad} was requested but the run only dispatched {task_count} tasks"
                )));
            }
            tasks.clone()
        }
        None => (0..task_count).collect(),
    };

    let mut files = AHashMap::new();
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some((task, fold)) = parse_task_file_name(name) else {
            log::debug!("Ignoring non-output file {}", path.display());
            continue;
        };
        if task >= task_count || fold >= config.fold_count {
            log::warn!(
                "Ignoring {}: task {task} / fold {fold} is outside the run's {task_count} tasks and {} folds",
                path.display(),
                config.fold_count
            );
            continue;
        }
        if requested.is_none() || tasks.contains(&task) {
            files.insert(path, (task, fold));
        }
    }

    if files.len() % config.fold_count != 0 {
        return Err(GatherError::IncompleteOutput(format!(
            "found {} output files for {} tasks, which is not a multiple of the {} cross-validation folds",
            files.len(),
            tasks.len(),
            config.fold_count
        )));
    }

    let mut by_fold: Vec<Vec<(usize, PathBuf)>> = vec![Vec::new(); config.fold_count];
    for (path, &(task, fold)) in &files {
        by_fold[fold].push((task, path.clone()));
    }

    let by_fold = by_fold
        .into_iter()
        .enumerate()
        .map(|(fold, mut entries)| {
            entries.sort_by(|a, b| {
                a.0.cmp(&b.0).then_with(|| {
                    natord::compare(&a.1.to_string_lossy(), &b.1.to_string_lossy())
                })
            });
            let found: Vec<usize> = entries.iter().map(|(task, _)| *task).collect();
            let found_set: BTreeSet<usize> = found.iter().copied().collect();
            if found.len() != found_set.len() {
                return Err(GatherError::IncompleteOutput(format!(
                    "c-v fold <{fold}> has more than one output file for the same task"
                )));
            }
            if found_set != tasks {
                let missing: Vec<String> = tasks
                    .difference(&found_set)
                    .map(|task| task.to_string())
                    .collect();
                return Err(GatherError::IncompleteOutput(format!(
                    "c-v fold <{fold}> is missing output for task(s) {}",
                    missing.join(", ")
                )));
            }
            Ok(entries.into_iter().map(|(_, path)| path).collect())
        })
        .collect::<Result<Vec<Vec<PathBuf>>, GatherError>>()?;

    log::info!(
        "Resolved {} output files for {} of {} tasks across {} folds",
        files.len(),
        tasks.len(),
        task_count,
        config.fold_count
    );

    Ok(ResolvedOutputs {
        files,
        by_fold,
        tasks,
        task_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_config() -> GatherConfig {
        GatherConfig {
            fold_count: 8,
            ..GatherConfig::default()
        }
    }

    fn populate(dir: &Path, tasks: &[usize], folds: usize) {
        for fold in 0..folds {
            for &task in tasks {
                fs::write(dir.join(format!("out__cv-{fold}_task-{task}.json")), "{}").unwrap();
            }
        }
    }

    #[test]
    fn parses_ids_from_file_names() {
        assert_eq!(parse_task_file_name("out__cv-12_task-3.json"), Some((3, 12)));
        assert_eq!(parse_task_file_name("out__cv-0_task-0.json.gz"), Some((0, 0)));
        assert_eq!(parse_task_file_name("out__cv-4_task-x.json"), None);
        assert_eq!(parse_task_file_name("out__task-4.json"), None);
        assert_eq!(parse_task_file_name("out__cv-4_task-2"), None);
        assert_eq!(parse_task_file_name("notes.txt"), None);
    }

    #[test]
    fn groups_complete_outputs_by_fold() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[0, 1, 2], 8);
        fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let resolved = resolve_task_files(dir.path(), None, 3, &small_config()).unwrap();
        assert_eq!(resolved.files.len(), 24);
        assert_eq!(resolved.by_fold.len(), 8);
        for (fold, paths) in resolved.by_fold.iter().enumerate() {
            let tasks: Vec<usize> = paths.iter().map(|p| resolved.files[p].0).collect();
            assert_eq!(tasks, vec![0, 1, 2]);
            assert!(paths.iter().all(|p| resolved.files[p].1 == fold));
        }
    }

    #[test]
    fn filters_to_requested_tasks() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[0, 1, 2], 8);
        let requested: BTreeSet<usize> = [2, 0].into_iter().collect();

        let resolved = resolve_task_files(dir.path(), Some(&requested), 3, &small_config()).unwrap();
        assert_eq!(resolved.files.len(), 16);
        assert_eq!(resolved.tasks, requested);
        assert!(resolved.files.values().all(|(task, _)| *task != 1));
    }

    #[test]
    fn missing_file_is_incomplete_output() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[0, 1], 8);
        fs::remove_file(dir.path().join("out__cv-5_task-1.json")).unwrap();

        let err = resolve_task_files(dir.path(), None, 2, &small_config()).unwrap_err();
        assert!(matches!(err, GatherError::IncompleteOutput(_)), "got {err:?}");
    }

    #[test]
    fn balanced_but_misplaced_files_name_the_fold() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[0, 1], 8);
        // Swap one fold's task-1 output for a second copy elsewhere, keeping the count.
        fs::remove_file(dir.path().join("out__cv-3_task-1.json")).unwrap();
        fs::write(dir.path().join("out__cv-3_task-1.json.gz"), "").unwrap();
        fs::remove_file(dir.path().join("out__cv-6_task-0.json")).unwrap();
        fs::write(dir.path().join("out__cv-6_task-1.json.gz"), "").unwrap();

        match resolve_task_files(dir.path(), None, 2, &small_config()) {
            Err(GatherError::IncompleteOutput(msg)) => assert!(msg.contains("<6>"), "{msg}"),
            other => panic!("Expected IncompleteOutput, got {other:?}"),
        }
    }

    #[test]
    fn requesting_unknown_task_is_invalid() {
        let dir = TempDir::new().unwrap();
        let requested: BTreeSet<usize> = [4].into_iter().collect();
        assert!(matches!(
            resolve_task_files(dir.path(), Some(&requested), 3, &small_config()),
            Err(GatherError::InvalidSetup(_))
        ));
    }
}
