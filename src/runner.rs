use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError};
use crate::db::{self, MySqlSource, PgTarget};
use crate::migrate::{run_job, Job, StageOptions};
use crate::report::{write_reports, RunReport};

/// Connect, run `job` inside one target transaction, write the audit files.
///
/// The transaction commits only when every stage returns `Ok` and the run is
/// not a dry run. The audit files are written either way, and hold every
/// stage that started, including the one that aborted the run.
pub async fn execute(cfg: &Config, job: &Job, apply_schema: bool) -> Result<RunReport> {
    cfg.ensure_dirs()?;
    let dry_run = cfg.run.dry_run;
    let opts = StageOptions {
        policy: cfg.run.on_row_error,
        sku_base: cfg.run.sku_base,
    };

    let pg = db::init_postgres(&cfg.postgres, cfg.run.max_connections).await?;
    if apply_schema {
        db::run_migrations(&pg).await?;
        info!("target schema applied");
    }
    let source = if job.needs_legacy_source() {
        let legacy = cfg.mysql.as_ref().ok_or(ConfigError::Missing("MYSQL_HOST"))?;
        let mysql = db::init_mysql(legacy, cfg.run.max_connections).await?;
        Some(MySqlSource::new(mysql))
    } else {
        None
    };

    let mut report = RunReport::start(job.name(), dry_run);
    info!(run_id = %report.run_id, job = job.name(), dry_run, policy = ?opts.policy, "migration started");

    let mut target = PgTarget::begin(&pg).await?;
    let outcome = run_job(job, source.as_ref(), &mut target, opts, &mut report.stages).await;

    let result = match outcome {
        Ok(()) if dry_run => {
            let rolled_back = target.rollback().await;
            if rolled_back.is_ok() {
                info!("dry run; all writes rolled back");
            }
            rolled_back
        }
        Ok(()) => {
            let committed = target.commit().await;
            report.committed = committed.is_ok();
            committed
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "migration aborted; rolling back");
            if let Err(rb) = target.rollback().await {
                warn!(error = %format!("{rb:#}"), "rollback failed");
            }
            Err(err)
        }
    };

    finalize(&mut report, Path::new(&cfg.run.report_dir), result)?;
    Ok(report)
}

/// Stamp the report, write it to `dir` and hand back the run's own result.
/// A report that cannot be written only fails a run that otherwise
/// succeeded; a failed run keeps its original error.
fn finalize(report: &mut RunReport, dir: &Path, result: Result<()>) -> Result<()> {
    if let Err(err) = &result {
        report.error = Some(format!("{err:#}"));
    }
    report.finish();
    let written = write_reports(dir, report);
    match (result, written) {
        (Ok(()), written) => written.map(|_| ()),
        (Err(err), Ok(_)) => Err(err),
        (Err(err), Err(write_err)) => {
            warn!(error = %format!("{write_err:#}"), "could not write run reports");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageReport;
    use anyhow::anyhow;
    use std::fs;
    use tempfile::tempdir;

    fn blocked_dir(root: &Path) -> std::path::PathBuf {
        let file = root.join("not-a-dir");
        fs::write(&file, "x").unwrap();
        file.join("reports")
    }

    #[test]
    fn failed_run_keeps_its_error_when_reports_cannot_be_written() {
        let root = tempdir().unwrap();
        let mut report = RunReport::start("orders", false);

        let err = finalize(
            &mut report,
            &blocked_dir(root.path()),
            Err(anyhow!("stage users aborted at row 100")),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "stage users aborted at row 100");
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn successful_run_surfaces_a_report_write_failure() {
        let root = tempdir().unwrap();
        let mut report = RunReport::start("orders", false);

        let err = finalize(&mut report, &blocked_dir(root.path()), Ok(())).unwrap_err();
        assert!(format!("{err:#}").contains("failed to create"), "{err:#}");
    }

    #[test]
    fn aborted_run_writes_the_stages_it_reached() {
        let root = tempdir().unwrap();
        let mut report = RunReport::start("all", false);
        let mut users = StageReport::new("users");
        users.failed = 1;
        report.stages = vec![StageReport::new("tenants"), users];

        finalize(&mut report, root.path(), Err(anyhow!("boom"))).unwrap_err();
        assert_eq!(report.error.as_deref(), Some("boom"));

        let summary = root.path().join(format!("{}-summary.json", report.run_id));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(summary).unwrap()).unwrap();
        assert_eq!(json["stages"][1]["name"], "users");
        assert_eq!(json["stages"][1]["failed"], 1);
        assert_eq!(json["error"], "boom");
    }
}
