//! Command-line interface for datastore-ycsb
//!
//! # Usage Examples
//!
//! ## Emptying the database
//! ```bash
//! # Delete every usertable entity with the default batch tiers
//! datastore-ycsb empty --project-id my-project --keyfile key.json
//!
//! # Dry run against an in-memory store seeded with 50000 entities
//! datastore-ycsb empty --project-id demo --in-memory --in-memory-seed 50000 \
//!   --output-json
//! ```
//!
//! ## Loading and running
//! ```bash
//! # Empty, then ramp the load up to 2000 QPS from 2 clients
//! datastore-ycsb prepare --project-id my-project --keyfile key.json \
//!   --repopulate --target-load-qps 2000 --client-count 2 --record-count 1000000
//!
//! # Run the workload
//! datastore-ycsb run --project-id my-project --keyfile key.json \
//!   --workload workloads/workloada --operation-count 100000
//!
//! # Show the ramp stages without running anything
//! datastore-ycsb plan-ramp --target-load-qps 2000 --client-count 2
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;

use datastore_ycsb::{benchmark, CleanupOpts, DatastoreOpts, RampOpts, YcsbOpts};

#[derive(Parser)]
#[command(name = "datastore-ycsb")]
#[command(about = "Run YCSB benchmarks against Google Cloud Datastore")]
#[command(long_about = None)]
struct Cli {
    /// Print the phase report as JSON on stdout
    #[arg(long, global = true)]
    output_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete every entity of the YCSB kinds
    Empty {
        #[command(flatten)]
        datastore: DatastoreOpts,

        #[command(flatten)]
        cleanup: CleanupOpts,
    },

    /// Load the database with a ramped target QPS
    Load {
        #[command(flatten)]
        datastore: DatastoreOpts,

        #[command(flatten)]
        ycsb: YcsbOpts,
    },

    /// Optionally empty the database (--repopulate), then load it
    Prepare {
        #[command(flatten)]
        datastore: DatastoreOpts,

        #[command(flatten)]
        cleanup: CleanupOpts,

        #[command(flatten)]
        ycsb: YcsbOpts,
    },

    /// Run the workload and collect measurements
    Run {
        #[command(flatten)]
        datastore: DatastoreOpts,

        #[command(flatten)]
        ycsb: YcsbOpts,
    },

    /// Print the load ramp stages for a target QPS
    PlanRamp {
        #[command(flatten)]
        ramp: RampOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Empty { datastore, cleanup } => {
            let Some(report) = benchmark::empty_database(&datastore, &cleanup).await? else {
                return Ok(());
            };
            emit(cli.output_json, &report)?;
            for kind in &report.kinds {
                tracing::info!(
                    "{}: read {}, deleted {} ({} tasks, {} reconciliation passes)",
                    kind.kind,
                    kind.total_read,
                    kind.total_deleted,
                    kind.tasks_dispatched,
                    kind.reconciliation_passes
                );
            }
            if report.has_errors() {
                anyhow::bail!(
                    "Deleting data in {} finished with errors",
                    report.dataset
                );
            }
        }
        Commands::Load { datastore, ycsb } => {
            let report = benchmark::load(&datastore, &ycsb).await?;
            emit(cli.output_json, &report)?;
        }
        Commands::Prepare {
            datastore,
            cleanup,
            ycsb,
        } => {
            let report = benchmark::prepare(&datastore, &cleanup, &ycsb).await?;
            emit(cli.output_json, &report)?;
        }
        Commands::Run { datastore, ycsb } => {
            if let Some(report) = benchmark::run(&datastore, &ycsb).await? {
                emit(cli.output_json, &report)?;
            }
        }
        Commands::PlanRamp { ramp } => {
            let controller = benchmark::ramp_controller(&ramp)?;
            let stages = controller.plan(ramp.target_load_qps, ramp.client_count)?;
            if cli.output_json {
                emit(true, &stages)?;
            } else {
                for stage in &stages {
                    println!("{stage}");
                }
            }
        }
    }

    Ok(())
}

fn emit<T: Serialize>(enabled: bool, report: &T) -> anyhow::Result<()> {
    if enabled {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}
