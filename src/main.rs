//! recwalk - Walk-Forward Recommender Harness
//!
//! Command-line entry point: runs a walk-forward simulation over JSON Lines
//! data, answers single-client recommendation queries against the stored
//! checkpoint chain and lists the chain.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use recwalk_core::{
    data::files, CheckpointStore, ClientId, FsCheckpointStore, HarnessConfig,
    InMemoryEventStore, InMemoryProfiles, NoProfiles, ProfileSource, RunReport,
    WalkForwardHarness,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::{self, EnvFilter};

/// Default checkpoint directory under the XDG data dir
fn default_checkpoint_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recwalk")
        .join("checkpoints")
}

#[derive(Parser)]
#[command(name = "recwalk")]
#[command(about = "Walk-forward training and evaluation harness for recommenders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Harness configuration file (TOML)
    #[arg(short, long, env = "RECWALK_CONFIG")]
    config: Option<PathBuf>,

    /// Checkpoint directory
    #[arg(long, env = "RECWALK_CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,
}

#[derive(Args)]
struct DataArgs {
    /// Interaction events (JSON Lines)
    #[arg(long)]
    events: PathBuf,

    /// Product catalog (JSON Lines)
    #[arg(long)]
    products: PathBuf,

    /// Client profiles used for clients without history (JSON Lines)
    #[arg(long)]
    profiles: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the walk-forward simulation
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Continue after the latest stored checkpoint
        #[arg(long)]
        resume: bool,

        /// Write the JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Recommend products for one client on one day
    Recommend {
        #[command(flatten)]
        data: DataArgs,

        /// Client identifier
        #[arg(long)]
        client: String,

        /// Scoring day (YYYY-MM-DD)
        #[arg(long)]
        day: NaiveDate,
    },

    /// List the stored checkpoint chain
    Checkpoints,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!(
        "recwalk={level},recwalk_core={level}",
        level = level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("recwalk v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    let checkpoint_dir = cli.checkpoint_dir.unwrap_or_else(default_checkpoint_dir);
    let store = FsCheckpointStore::open(&checkpoint_dir)
        .await
        .with_context(|| format!("opening checkpoint dir {}", checkpoint_dir.display()))?;

    match cli.command {
        Commands::Run {
            data,
            resume,
            report,
        } => {
            config.resume |= resume;
            let harness = build_harness(config, &data, store).await?;
            let run = harness.run().await?;
            print_summary(&run);

            if let Some(path) = report {
                write_report(&run, &path)?;
                info!("Report written to {}", path.display());
            }
            Ok(())
        }
        Commands::Recommend { data, client, day } => {
            let harness = build_harness(config, &data, store).await?;
            let recs = harness.recommend(&ClientId::new(client), day).await?;

            println!(
                "Client {} on {} (checkpoint {}, {:?} snapshot, country {})",
                recs.client_id, recs.day, recs.checkpoint, recs.source, recs.country
            );
            if recs.recommendations.is_empty() {
                println!("  no candidates");
            }
            for (rank, rec) in recs.recommendations.iter().enumerate() {
                println!("  {}. {} ({:.4})", rank + 1, rec.product_id, rec.score);
            }
            Ok(())
        }
        Commands::Checkpoints => {
            let keys = store.list().await?;
            if keys.is_empty() {
                println!("No checkpoints in {}", checkpoint_dir.display());
            }
            for key in keys {
                if let Some(cp) = store.read(key).await? {
                    println!(
                        "{}  parent={}  scorer={}  examples={}  created={}",
                        cp.window_end,
                        cp.parent.map_or("-".to_string(), |p| p.to_string()),
                        cp.scorer,
                        cp.examples,
                        cp.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            Ok(())
        }
    }
}

async fn build_harness(
    config: HarnessConfig,
    data: &DataArgs,
    store: FsCheckpointStore,
) -> anyhow::Result<WalkForwardHarness> {
    let events = files::load_events(&data.events)
        .with_context(|| format!("loading events {}", data.events.display()))?;
    let catalog = files::load_products(&data.products)
        .with_context(|| format!("loading products {}", data.products.display()))?;
    let profiles: Arc<dyn ProfileSource> = match &data.profiles {
        Some(path) => Arc::new(InMemoryProfiles::new(
            files::load_profiles(path)
                .with_context(|| format!("loading profiles {}", path.display()))?,
        )),
        None => Arc::new(NoProfiles),
    };

    let factory = Arc::new(config.scorer.clone());
    let harness = WalkForwardHarness::new(
        config,
        Arc::new(InMemoryEventStore::new(events)),
        profiles,
        catalog,
        factory,
        Arc::new(store),
    )
    .await?;
    Ok(harness)
}

fn print_summary(report: &RunReport) {
    println!("Run {}", report.run_id);
    if let Some(day) = report.resumed_from {
        println!("  resumed after {}", day);
    }
    println!(
        "  windows: {}  checkpoints: {}",
        report.steps.len(),
        report.checkpoints_written()
    );
    for result in &report.results {
        println!(
            "  {}  {}/{}  skipped={}  defaulted={}",
            result.day,
            result.correct_count,
            result.total_clients,
            result.skipped_clients,
            result.defaulted_clients
        );
    }
    match report.overall_accuracy {
        Some(accuracy) => println!(
            "  accuracy: {:.4} ({}/{})",
            accuracy, report.correct_count, report.total_clients
        ),
        None => println!("  accuracy: undefined (no client evaluated)"),
    }
}

fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}
