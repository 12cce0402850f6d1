//! Migration stages and the job runner that sequences them.
//!
//! Stages only see the `LegacySource` and store traits, so the same code runs
//! against MySQL/PostgreSQL in production and in-memory fakes in tests.

pub mod accounts;
pub mod diamonds;
pub mod orders;
pub mod services;

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::info;

use crate::db::LegacySource;
use crate::pipeline::{RowPolicy, StageReport};
use crate::store::{AccountStore, DiamondStore, OrderStore, ServiceStore};

pub use accounts::migrate_accounts;
pub use diamonds::{import_diamonds, DiamondSheet};
pub use orders::migrate_orders;
pub use services::migrate_services;

/// What a run migrates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Accounts,
    Orders,
    Services,
    Diamonds(PathBuf),
    All { diamonds: Option<PathBuf> },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Accounts => "accounts",
            Job::Orders => "orders",
            Job::Services => "services",
            Job::Diamonds(_) => "diamonds",
            Job::All { .. } => "all",
        }
    }

    /// Whether the job reads the legacy MySQL database.
    pub fn needs_legacy_source(&self) -> bool {
        !matches!(self, Job::Diamonds(_))
    }

    fn diamond_csv(&self) -> Option<&PathBuf> {
        match self {
            Job::Diamonds(path) => Some(path),
            Job::All { diamonds } => diamonds.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    pub policy: RowPolicy,
    pub sku_base: u32,
}

/// Run every stage `job` names, in dependency order, pushing one report per
/// started stage into `reports`. The caller owns the transaction and commits
/// only if this returns `Ok`; on `Err` the reports gathered so far, including
/// the stage that stopped, stay in `reports`.
pub async fn run_job<S, T>(
    job: &Job,
    source: Option<&S>,
    target: &mut T,
    opts: StageOptions,
    reports: &mut Vec<StageReport>,
) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: AccountStore + OrderStore + ServiceStore + DiamondStore + ?Sized,
{
    // read the CSV up front so a bad file fails before any row is written
    let sheet = match job.diamond_csv() {
        Some(path) => Some(DiamondSheet::from_path(path)?),
        None => None,
    };

    if job.needs_legacy_source() {
        let source = source.ok_or_else(|| anyhow!("job {} needs the legacy database", job.name()))?;
        let (accounts, orders, services) = match job {
            Job::Accounts => (true, false, false),
            Job::Orders => (false, true, false),
            Job::Services => (false, false, true),
            _ => (true, true, true),
        };
        if accounts {
            migrate_accounts(source, target, opts.policy, reports).await?;
        }
        if orders {
            migrate_orders(source, target, opts.policy, reports).await?;
        }
        if services {
            migrate_services(source, target, opts.policy, reports).await?;
        }
    }
    if let Some(sheet) = &sheet {
        import_diamonds(sheet, target, opts.policy, opts.sku_base, reports).await?;
    }

    let (inserted, skipped, failed) = reports.iter().fold((0, 0, 0), |acc, r| {
        (acc.0 + r.inserted, acc.1 + r.skipped, acc.2 + r.failed)
    });
    info!(job = job.name(), inserted, skipped, failed, "job finished");
    Ok(())
}
