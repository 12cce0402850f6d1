//! JSON audit files written at the end of every run.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::pipeline::{RowNote, StageReport};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn start(command: &str, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            command: command.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            committed: false,
            error: None,
            stages: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[derive(Serialize)]
struct RowNotes<'a> {
    stage: &'a str,
    skipped: &'a [RowNote],
    failed: &'a [RowNote],
}

/// Write `<run_id>-summary.json` plus, per stage, the skipped/failed rows
/// and the legacy-to-new ID mapping when there is anything to record.
/// Returns the paths written.
pub fn write_reports(dir: &Path, report: &RunReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();

    let summary = dir.join(format!("{}-summary.json", report.run_id));
    write_json(&summary, report)?;
    written.push(summary);

    for stage in &report.stages {
        if !stage.skipped_rows.is_empty() || !stage.failed_rows.is_empty() {
            let path = dir.join(format!("{}-{}-skipped.json", report.run_id, stage.name));
            let notes = RowNotes {
                stage: &stage.name,
                skipped: &stage.skipped_rows,
                failed: &stage.failed_rows,
            };
            write_json(&path, &notes)?;
            written.push(path);
        }
        if !stage.id_map.is_empty() {
            let path = dir.join(format!("{}-{}-id-map.json", report.run_id, stage.name));
            write_json(&path, &stage.id_map)?;
            written.push(path);
        }
    }

    info!(dir = %dir.display(), files = written.len(), "wrote run reports");
    Ok(written)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stage() -> StageReport {
        let mut s = StageReport::new("diamonds");
        s.read = 3;
        s.inserted = 1;
        s.skipped = 2;
        s.skipped_rows.push(RowNote {
            key: "line 3".into(),
            reason: "missing certificate number".into(),
            detail: Some(serde_json::json!({"Shape": "Round"})),
        });
        s.id_map.insert(
            "GIA1".into(),
            serde_json::json!({"sku": "880001", "id": 1}),
        );
        s
    }

    #[test]
    fn writes_summary_and_side_files() {
        let td = tempdir().unwrap();
        let mut report = RunReport::start("diamonds", false);
        report.stages.push(stage());
        report.stages.push(StageReport::new("empty"));
        report.finish();

        let files = write_reports(td.path(), &report).unwrap();
        assert_eq!(files.len(), 3);

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(summary["command"], "diamonds");
        assert_eq!(summary["stages"][0]["skipped"], 2);
        // row lists live in the side files, not the summary
        assert!(summary["stages"][0].get("skipped_rows").is_none());

        let skipped: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files[1]).unwrap()).unwrap();
        assert_eq!(skipped["skipped"][0]["reason"], "missing certificate number");
        assert_eq!(skipped["skipped"][0]["detail"]["Shape"], "Round");

        let ids: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files[2]).unwrap()).unwrap();
        assert_eq!(ids["GIA1"]["sku"], "880001");
    }
}
