//! Re-shipping saved result artifacts.
//!
//! Walks a results tree as produced by the execution engine and delivers
//! every `*.json` artifact to the configured archival endpoints, using the
//! parent directory name as the category. Useful after runs that executed
//! without endpoints configured, or after an archiver outage.

use std::fs;
use std::path::Path;

use color_eyre::Result;
use log::{info, warn};
use walkdir::WalkDir;

use crate::archive::ArchiveClient;
use crate::catalog::TestCategory;
use crate::hostspec::{parse_host_spec, NodeRef};
use crate::matrix::Direction;
use crate::record::MeasurementRecord;

/// Counts for one push pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub files: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub skipped: usize,
}

/// Recover the destination identity and direction from an artifact file
/// name of the form `<identity>_<tool>_<UTCts>_<direction>.json`. Files
/// named differently fall back to the stem as identity, forward direction.
fn identity_from_filename(stem: &str) -> (NodeRef, Direction) {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() >= 4 {
        let direction = match *parts.last().unwrap() {
            "reverse" => Direction::Reverse,
            _ => Direction::Forward,
        };
        let identity = parts[..parts.len() - 3].join("_");
        let (_, node) = parse_host_spec(&identity);
        return (node, direction);
    }
    let (_, node) = parse_host_spec(stem);
    (node, Direction::Forward)
}

/// Walk `source_dir` and re-deliver every readable JSON artifact. Files in
/// directories that are not a known category are skipped with a warning;
/// unreadable or unparsable files are skipped too. The walk never fails on
/// a per-file problem.
pub fn push_all(
    source_dir: &Path,
    src: &NodeRef,
    archive: &ArchiveClient,
) -> Result<PushSummary> {
    let mut summary = PushSummary::default();

    for entry in WalkDir::new(source_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        summary.files += 1;

        let category = match path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(TestCategory::from_str_opt)
        {
            Some(category) => category,
            None => {
                warn!(
                    "Skipping {}: parent directory is not a test category",
                    path.display()
                );
                summary.skipped += 1;
                continue;
            }
        };

        let raw = match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                summary.skipped += 1;
                continue;
            }
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let (dst, direction) = identity_from_filename(stem);

        let record = MeasurementRecord::new(category, src.clone(), dst, direction, raw);
        let outcomes = archive.deliver(&record);
        let failures = outcomes.iter().filter(|o| !o.is_success()).count();
        summary.delivered += outcomes.len() - failures;
        summary.delivery_failures += failures;
        info!("Pushed {} [{}]", path.display(), category);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_identity_from_filename() {
        let (node, direction) =
            identity_from_filename("10.0.0.2_iperf3_20260823-101500Z_reverse");
        assert_eq!(node.ip, "10.0.0.2");
        assert_eq!(direction, Direction::Reverse);

        let (node, direction) = identity_from_filename("fd00__2_auto_20260823-101500Z_forward");
        // Sanitization is lossy; the recovered identity keeps the underscores.
        assert_eq!(node.ip, "fd00__2");
        assert_eq!(direction, Direction::Forward);

        let (node, direction) = identity_from_filename("adhoc");
        assert_eq!(node.ip, "adhoc");
        assert_eq!(direction, Direction::Forward);
    }

    #[test]
    fn test_push_skips_unknown_categories_and_bad_json() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("rtt")).unwrap();
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(
            dir.path().join("rtt/host_ping_20260823-101500Z_forward.json"),
            "{not json",
        )
        .unwrap();
        fs::write(dir.path().join("logs/run.json"), "{}").unwrap();
        fs::write(dir.path().join("rtt/notes.txt"), "ignored").unwrap();

        // No endpoints: nothing is delivered, but the walk must complete.
        let archive = ArchiveClient::new(Vec::new(), Duration::from_secs(1)).unwrap();
        let src = NodeRef::new("10.0.0.1", "src");
        let summary = push_all(dir.path(), &src, &archive).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.delivery_failures, 0);
    }
}
