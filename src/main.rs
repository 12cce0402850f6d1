use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use erp_migrate::config;
use erp_migrate::logging;
use erp_migrate::migrate::Job;
use erp_migrate::pipeline::RowPolicy;
use erp_migrate::runner;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Migrate legacy ERP data from MySQL into PostgreSQL and exit"
)]
struct Args {
    /// Path to YAML run-options file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Apply the bundled target schema before migrating
    #[arg(long, global = true)]
    apply_schema: bool,

    /// Run every stage, then roll the transaction back
    #[arg(long, global = true)]
    dry_run: bool,

    /// What to do when a row fails to write (overrides the config file)
    #[arg(long, value_enum, global = true)]
    on_row_error: Option<RowPolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tenants, roles, users and role assignments
    Accounts,
    /// Orders, line items, payments and refunds
    Orders,
    /// After-sales, pre-order and customization records
    Services,
    /// Import diamond inventory from a supplier CSV export
    Diamonds {
        /// Path to the CSV file
        csv: PathBuf,
    },
    /// Every legacy stage in dependency order
    All {
        /// Also import this diamond CSV
        #[arg(long)]
        diamonds: Option<PathBuf>,
    },
}

impl From<Command> for Job {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Accounts => Job::Accounts,
            Command::Orders => Job::Orders,
            Command::Services => Job::Services,
            Command::Diamonds { csv } => Job::Diamonds(csv),
            Command::All { diamonds } => Job::All { diamonds },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(None);

    let args = Args::parse();
    let mut cfg = config::load(args.config.as_deref())?;
    if args.dry_run {
        cfg.run.dry_run = true;
    }
    if let Some(policy) = args.on_row_error {
        cfg.run.on_row_error = policy;
    }

    let job = Job::from(args.command);
    let report = runner::execute(&cfg, &job, args.apply_schema).await?;
    info!(
        run_id = %report.run_id,
        committed = report.committed,
        report_dir = %cfg.run.report_dir,
        "migration completed"
    );
    Ok(())
}
