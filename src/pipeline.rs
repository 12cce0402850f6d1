//! Row isolation for migration stages.
//!
//! Every row runs between a `SAVEPOINT` and either a `RELEASE` or a
//! `ROLLBACK TO SAVEPOINT`, so one bad row never poisons the surrounding
//! transaction. What happens after a row error is decided by [`RowPolicy`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::store::Savepoints;

const ROW_SAVEPOINT: &str = "migrate_row";

/// What a stage does after a row fails to write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Roll the row back to its savepoint, record it, keep going.
    #[default]
    Skip,
    /// Abort the run; the caller rolls back the outer transaction.
    Abort,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("stage {stage}: row {key} failed: {message}")]
    RowAborted {
        stage: String,
        key: String,
        message: String,
    },
}

/// Result of writing one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Inserted(i64),
    /// Written, but the row has no ID of its own (link tables).
    Linked,
    Skipped(String),
}

impl RowOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        RowOutcome::Skipped(reason.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowNote {
    pub key: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Tallies for one stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageReport {
    pub name: String,
    pub read: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub failed: u64,
    #[serde(skip)]
    pub skipped_rows: Vec<RowNote>,
    #[serde(skip)]
    pub failed_rows: Vec<RowNote>,
    #[serde(skip)]
    pub id_map: BTreeMap<String, serde_json::Value>,
}

impl StageReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn skipped_keys(&self) -> Vec<&str> {
        self.skipped_rows.iter().map(|n| n.key.as_str()).collect()
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.failed_rows.iter().map(|n| n.key.as_str()).collect()
    }
}

pub struct Stage {
    policy: RowPolicy,
    report: StageReport,
}

impl Stage {
    pub fn new(name: impl Into<String>, policy: RowPolicy) -> Self {
        let report = StageReport::new(name);
        info!(stage = %report.name, ?policy, "stage started");
        Self { policy, report }
    }

    pub fn name(&self) -> &str {
        &self.report.name
    }

    /// Record a row rejected before touching the target.
    pub fn skip(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.skip_with(key, reason, None);
    }

    pub fn skip_with(
        &mut self,
        key: impl Into<String>,
        reason: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) {
        self.report.read += 1;
        self.note_skip(key.into(), reason.into(), detail);
    }

    fn note_skip(&mut self, key: String, reason: String, detail: Option<serde_json::Value>) {
        info!(stage = %self.report.name, key = %key, reason = %reason, "row skipped");
        self.report.skipped += 1;
        self.report.skipped_rows.push(RowNote {
            key,
            reason,
            detail,
        });
    }

    pub async fn begin_row<T>(&mut self, target: &mut T) -> Result<()>
    where
        T: Savepoints + ?Sized,
    {
        self.report.read += 1;
        target.savepoint(ROW_SAVEPOINT).await
    }

    /// Close the row opened by [`Stage::begin_row`]. Returns the new ID for
    /// inserted rows. Under [`RowPolicy::Abort`] a row error becomes fatal.
    pub async fn finish_row<T>(
        &mut self,
        target: &mut T,
        key: impl Into<String>,
        result: Result<RowOutcome>,
    ) -> Result<Option<i64>>
    where
        T: Savepoints + ?Sized,
    {
        let key = key.into();
        match result {
            Ok(RowOutcome::Inserted(id)) => {
                target.release(ROW_SAVEPOINT).await?;
                self.report.inserted += 1;
                Ok(Some(id))
            }
            Ok(RowOutcome::Linked) => {
                target.release(ROW_SAVEPOINT).await?;
                self.report.inserted += 1;
                Ok(None)
            }
            Ok(RowOutcome::Skipped(reason)) => {
                target.release(ROW_SAVEPOINT).await?;
                self.note_skip(key, reason, None);
                Ok(None)
            }
            Err(err) => {
                target.rollback_to(ROW_SAVEPOINT).await?;
                let message = format!("{err:#}");
                warn!(stage = %self.report.name, key = %key, error = %message, "row failed; rolled back to savepoint");
                self.report.failed += 1;
                self.report.failed_rows.push(RowNote {
                    key: key.clone(),
                    reason: message.clone(),
                    detail: None,
                });
                match self.policy {
                    RowPolicy::Skip => Ok(None),
                    RowPolicy::Abort => Err(MigrationError::RowAborted {
                        stage: self.report.name.clone(),
                        key,
                        message,
                    }
                    .into()),
                }
            }
        }
    }

    pub fn map_id(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.report.id_map.insert(key.into(), value.into());
    }

    /// Push this stage's report onto `reports`, also when `outcome` is the
    /// error that stopped it, and hand `outcome` back.
    pub fn close(self, reports: &mut Vec<StageReport>, outcome: Result<()>) -> Result<()> {
        if let Err(err) = &outcome {
            warn!(stage = %self.report.name, error = %format!("{err:#}"), "stage stopped");
        }
        reports.push(self.finish());
        outcome
    }

    pub fn finish(self) -> StageReport {
        let r = &self.report;
        info!(
            stage = %r.name,
            read = r.read,
            inserted = r.inserted,
            skipped = r.skipped,
            failed = r.failed,
            "stage finished"
        );
        self.report
    }
}
