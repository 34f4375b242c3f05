//! Periodic Analytics CLI
//!
//! Computes the indicators of a batch configuration for the previous
//! completed period.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use periodic_analytics::{
    core::timeframe::midnight, AnalyzerState, BatchConfig, BlockingWarehouseClient,
    ComputationRegistry, ConfigResolver, EventSource, JsonlEventSource, Period, RunSummary,
    Runner, RunnerError, RunnerOptions, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "periodic-analytics")]
#[command(version = VERSION)]
#[command(about = "Computes periodic building indicators from sensor events", long_about = None)]
struct Cli {
    /// Analyzed period
    #[arg(short, long, default_value = "day")]
    period: Period,

    /// Batch configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// JSON-lines event store export (overrides the configuration)
    #[arg(long)]
    events: Option<PathBuf>,

    /// Warehouse API root (overrides the configuration)
    #[arg(long)]
    warehouse_url: Option<String>,

    /// Log warehouse uploads instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Number of jobs run in parallel
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Resolve the configuration and list the jobs, without running them
    #[arg(long)]
    check: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Computation date (YYYY-MM-DD), defaults to now
    date: Option<NaiveDate>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(cli) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let path = BatchConfig::locate(&cli.config)
        .with_context(|| format!("configuration file not found: {}", cli.config.display()))?;
    let mut config = BatchConfig::load(&path)?;
    if let Some(url) = cli.warehouse_url {
        config.warehouse.base_url = url;
    }

    let registry = ComputationRegistry::builtin();
    let jobs = ConfigResolver::new(&registry).resolve(&config)?;

    if cli.check {
        println!("Configuration: {}", path.display());
        println!("{} job(s):", jobs.len());
        for job in &jobs {
            println!(
                "  {:<12} {:<36} site {}  inputs: {}",
                job.indicator.name(),
                job.kind,
                job.params.site_id,
                job.indicator.input_variable_names().join(", ")
            );
        }
        return Ok(());
    }

    let Some(events_path) = cli.events.or_else(|| config.event_store_path()) else {
        bail!("no event store configured (use --events or event_store.path)");
    };
    let source: Arc<dyn EventSource> = Arc::new(JsonlEventSource::open(&events_path)?);
    let sink = BlockingWarehouseClient::new(config.warehouse.to_client_config(cli.dry_run))?;
    if cli.dry_run {
        tracing::info!("dry run: warehouse uploads are logged, not sent");
    }

    let runner = Runner::new(source, Arc::new(sink)).with_options(RunnerOptions {
        workers: cli.workers,
    });
    let computation_date = cli.date.map(midnight);
    match runner.run(jobs, cli.period, computation_date) {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(RunnerError::Aggregate {
            executed,
            failed,
            summary,
        }) => {
            print_summary(&summary);
            bail!("{executed} indicator(s) computation completed with {failed} error(s)")
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Batch {}", summary.batch_id);
    for outcome in &summary.outcomes {
        let detail = match (&outcome.state, &outcome.error) {
            (AnalyzerState::Failed, Some(error)) => error.clone(),
            _ => outcome
                .outputs
                .iter()
                .map(|(name, value)| format!("{name}={value:?}"))
                .collect::<Vec<_>>()
                .join(" "),
        };
        println!("  {:<12} {:<8} {}", outcome.indicator, outcome.state, detail);
    }
    println!(
        "{} executed: {} done, {} skipped, {} failed",
        summary.executed, summary.done, summary.skipped, summary.failed
    );
}
