//! Reading task output records and setup files, and persisting merged artifacts.
//!
//! Everything on disk is JSON. Files whose name ends in `.gz` are transparently
//! gzip-decoded on read; merged artifacts are always written gzip-compressed.

use crate::metrics::AucSummaryRow;
use crate::types::{GatherError, TaskOutputRecord};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// The kinds of merged artifact a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Coef,
    Pred,
    Sc,
    Tune,
    Pheno,
    Aucs,
    Conf,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coef => "coef",
            Self::Pred => "pred",
            Self::Sc => "sc",
            Self::Tune => "tune",
            Self::Pheno => "pheno",
            Self::Aucs => "aucs",
            Self::Conf => "conf",
        }
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Deserializes a JSON document, gunzipping it first if the name ends in `.gz`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, GatherError> {
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = if is_gzipped(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    serde_json::from_reader(reader).map_err(|source| GatherError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_task_record<C: DeserializeOwned>(path: &Path) -> Result<TaskOutputRecord<C>, GatherError> {
    log::debug!("Reading task output {}", path.display());
    read_json(path)
}

/// Suffix distinguishing artifacts merged from a task subset: empty for a
/// full run, otherwise `_` followed by the sorted task ids joined by hyphens.
pub fn output_tag(requested: Option<&BTreeSet<usize>>) -> String {
    match requested {
        None => String::new(),
        Some(tasks) => format!(
            "_{}",
            tasks
                .iter()
                .map(|task| task.to_string())
                .collect::<Vec<_>>()
                .join("-")
        ),
    }
}

pub fn merge_dir(run_dir: &Path) -> PathBuf {
    run_dir.join("merge")
}

pub fn artifact_path(merge_dir: &Path, kind: ArtifactKind, tag: &str) -> PathBuf {
    merge_dir.join(format!("out-{}{}.json.gz", kind.as_str(), tag))
}

pub fn summary_path(merge_dir: &Path, tag: &str) -> PathBuf {
    merge_dir.join(format!("out-aucs{tag}.tsv"))
}

/// Writes `value` as gzip-compressed JSON to its deterministic artifact path.
pub fn write_artifact<T: Serialize>(
    merge_dir: &Path,
    kind: ArtifactKind,
    tag: &str,
    value: &T,
) -> Result<PathBuf, GatherError> {
    fs::create_dir_all(merge_dir)?;
    let path = artifact_path(merge_dir, kind, tag);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&path)?), Compression::default());
    serde_json::to_writer(&mut encoder, value)?;
    encoder.finish()?.flush()?;
    log::info!("Wrote {} artifact to {}", kind.as_str(), path.display());
    Ok(path)
}

/// Writes the per-type AUC summary as a tab-separated table.
pub fn write_auc_summary(path: &Path, rows: &[AucSummaryRow]) -> Result<(), GatherError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn output_tag_sorts_task_ids() {
        assert_eq!(output_tag(None), "");
        let tasks: BTreeSet<usize> = [7, 2, 11].into_iter().collect();
        assert_eq!(output_tag(Some(&tasks)), "_2-7-11");
    }

    #[test]
    fn artifact_paths_are_deterministic() {
        let dir = Path::new("/runs/x/merge");
        assert_eq!(
            artifact_path(dir, ArtifactKind::Pred, ""),
            PathBuf::from("/runs/x/merge/out-pred.json.gz")
        );
        assert_eq!(
            artifact_path(dir, ArtifactKind::Conf, "_0-3"),
            PathBuf::from("/runs/x/merge/out-conf_0-3.json.gz")
        );
    }

    #[test]
    fn written_artifacts_read_back() {
        let dir = TempDir::new().unwrap();
        let mut value = BTreeMap::new();
        value.insert("TP53".to_string(), vec![0.25, 0.75]);

        let path = write_artifact(dir.path(), ArtifactKind::Aucs, "_1", &value).unwrap();
        assert!(path.ends_with("out-aucs_1.json.gz"));
        let restored: BTreeMap<String, Vec<f64>> = read_json(&path).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn plain_and_gzipped_json_both_parse() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("list.json");
        fs::write(&plain, r#"["a", "b"]"#).unwrap();
        let parsed: Vec<String> = read_json(&plain).unwrap();
        assert_eq!(parsed, vec!["a", "b"]);

        let zipped = dir.path().join("list.json.gz");
        let mut encoder = GzEncoder::new(File::create(&zipped).unwrap(), Compression::fast());
        encoder.write_all(br#"["c"]"#).unwrap();
        encoder.finish().unwrap();
        let parsed: Vec<String> = read_json(&zipped).unwrap();
        assert_eq!(parsed, vec!["c"]);
    }

    #[test]
    fn malformed_json_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        match read_json::<Vec<String>>(&path) {
            Err(GatherError::Malformed { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("Expected Malformed error, got {other:?}"),
        }
    }
}
