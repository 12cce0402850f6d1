use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use erp_migrate::config;
use erp_migrate::logging;
use erp_migrate::migrate::Job;
use erp_migrate::runner;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Import diamond inventory from a supplier CSV into PostgreSQL"
)]
struct Args {
    /// Path to the CSV export
    csv: PathBuf,

    /// Path to YAML run-options file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse and insert everything, then roll back
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(None);

    let args = Args::parse();
    let mut cfg = config::load(args.config.as_deref())?;
    cfg.run.dry_run |= args.dry_run;

    let report = runner::execute(&cfg, &Job::Diamonds(args.csv), false).await?;
    if let Some(stage) = report.stages.first() {
        info!(
            inserted = stage.inserted,
            skipped = stage.skipped,
            failed = stage.failed,
            "diamond import finished"
        );
    }
    Ok(())
}
