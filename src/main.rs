//! Command-line interface for journal-sync
//!
//! # Usage Examples
//!
//! ## Queries
//! ```bash
//! # Print the load, journal and row-lookup queries of a job
//! journal-sync queries \
//!   --settings realtime.json \
//!   --shape orders.yaml \
//!   --after-sequence 1042
//! ```
//!
//! ## Job state
//! ```bash
//! # Newest persisted state
//! journal-sync state --job-id job-1 --checkpoint-dir .journal-sync-checkpoints
//!
//! # Would the next start reload everything?
//! journal-sync needs-reload --job-id job-1 --job-version 3 --shape-version 1 \
//!   --settings realtime.json
//!
//! # Local snapshot store of a job
//! journal-sync snapshot --store-dir /var/lib/journal-sync --job-id job-1 \
//!   --id APPLIB_ORDERS_17
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use journal_sync::as400::{JobState, QueryRewriter, RealTimeSettings, DEFAULT_ROW_IDENTITY_FN};
use journal_sync::config::duration::parse_duration;
use journal_sync::inspect::{inspect_snapshot, plan_queries, read_job_state, reload_decision};
use journal_sync::JobOpts;
use sync_core::Shape;

#[derive(Parser)]
#[command(name = "journal-sync")]
#[command(about = "Inspect AS400/DB2 journal real-time read jobs")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the queries a job issues against the source
    Queries {
        /// Real-time settings JSON file
        #[arg(long, value_name = "PATH")]
        settings: PathBuf,

        /// Shape file (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        shape: PathBuf,

        /// Row identity function of the source dialect
        #[arg(long, default_value = DEFAULT_ROW_IDENTITY_FN)]
        row_identity_fn: String,

        /// Sequence the journal queries start after
        #[arg(long, default_value_t = 0)]
        after_sequence: u64,

        /// Row identity used for the sample row-lookup queries
        #[arg(long, default_value = "1")]
        row_identity: String,
    },

    /// Validate settings and shape and print the effective settings
    Validate {
        /// Real-time settings JSON file
        #[arg(long, value_name = "PATH")]
        settings: PathBuf,

        /// Shape file (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        shape: PathBuf,

        /// Polling interval overriding the settings (e.g. "30s", "5m")
        #[arg(long, value_parser = parse_duration)]
        polling_interval: Option<Duration>,

        /// Row identity function of the source dialect
        #[arg(long, default_value = DEFAULT_ROW_IDENTITY_FN)]
        row_identity_fn: String,
    },

    /// Print the newest persisted state of a job
    State {
        #[command(flatten)]
        job: JobOpts,
    },

    /// Print whether the next start of a job performs a full load
    NeedsReload {
        #[command(flatten)]
        job: JobOpts,

        /// Job data version of the next run
        #[arg(long, allow_hyphen_values = true)]
        job_version: i64,

        /// Shape data version of the next run
        #[arg(long, allow_hyphen_values = true)]
        shape_version: i64,

        /// Settings of the next run, to detect journals without a sequence
        #[arg(long, value_name = "PATH")]
        settings: Option<PathBuf>,
    },

    /// Inspect the local snapshot store of a job
    Snapshot {
        /// Root directory of the job-scoped stores
        #[arg(long, value_name = "DIR")]
        store_dir: PathBuf,

        /// Job id
        #[arg(long)]
        job_id: String,

        /// Print the key columns of this record instead of a summary
        #[arg(long = "id", value_name = "RECORD_ID")]
        record_id: Option<String>,
    },

    /// Print the JSON Schema of the real-time settings
    SettingsSchema,
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
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Queries {
            settings,
            shape,
            row_identity_fn,
            after_sequence,
            row_identity,
        } => {
            let settings = RealTimeSettings::from_file(&settings)?;
            let shape = load_shape(&shape)?;
            let rewriter = QueryRewriter::new(row_identity_fn);
            let plan = plan_queries(&settings, &shape, &rewriter, after_sequence, &row_identity)?;
            print!("{plan}");
        }
        Commands::Validate {
            settings,
            shape,
            polling_interval,
            row_identity_fn,
        } => {
            let mut settings = RealTimeSettings::from_file(&settings)?;
            if let Some(interval) = polling_interval {
                settings.polling_interval_seconds = interval.as_secs();
            }
            let shape = load_shape(&shape)?;
            settings.validate()?;
            QueryRewriter::new(row_identity_fn).validate(&shape.query)?;
            tracing::info!(
                "Shape '{}' with {} properties monitors {} tables",
                shape.id,
                shape.properties.len(),
                settings.table_information.len()
            );
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Commands::State { job } => {
            match read_job_state(&job.checkpoint_dir, &job.job_id).await? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => {
                    tracing::info!("No checkpoint for job '{}'", job.job_id);
                    println!("{}", serde_json::to_string_pretty(&JobState::default())?);
                }
            }
        }
        Commands::NeedsReload {
            job,
            job_version,
            shape_version,
            settings,
        } => {
            let state = read_job_state(&job.checkpoint_dir, &job.job_id)
                .await?
                .unwrap_or_default();
            let settings = settings
                .map(|path| RealTimeSettings::from_file(&path))
                .transpose()?;
            let decision = reload_decision(&state, job_version, shape_version, settings.as_ref());
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Snapshot {
            store_dir,
            job_id,
            record_id,
        } => {
            let value = inspect_snapshot(&store_dir, &job_id, record_id.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::SettingsSchema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&RealTimeSettings::json_schema())?
            );
        }
    }

    Ok(())
}

fn load_shape(path: &Path) -> anyhow::Result<Shape> {
    Shape::from_file(path).with_context(|| format!("Failed to load shape {}", path.display()))
}
