//! datastore-ycsb library
//!
//! Drives YCSB benchmarks against Google Cloud Datastore: emptying the YCSB
//! kinds with a bounded-concurrency bulk deleter, loading data with an
//! incremental QPS ramp, and running the measured workload.
//!
//! # Phases
//!
//! - `empty`: delete every entity of the YCSB kinds (`usertable`)
//! - `load`: ramp the YCSB load phase up to `--target-load-qps`
//! - `prepare`: optional `empty` (with `--repopulate`) followed by `load`
//! - `run`: run the workload on every client and collect measurements
//!
//! # CLI Usage
//!
//! ```bash
//! # Empty the database then load it at 2000 QPS from 2 clients
//! datastore-ycsb prepare --project-id my-project --keyfile key.json \
//!   --repopulate --target-load-qps 2000 --client-count 2
//!
//! # Run workload A
//! datastore-ycsb run --project-id my-project --keyfile key.json \
//!   --workload workloads/workloada
//! ```

use clap::Parser;
use std::path::PathBuf;

use bulk_delete::BatchConfig;
use datastore_client::DatasetId;

pub mod benchmark;
pub mod config;
pub mod credentials;

/// Kinds written by the YCSB Datastore binding.
pub const YCSB_COLLECTIONS: &[&str] = &["usertable"];

#[derive(Parser, Clone)]
pub struct DatastoreOpts {
    /// Project that hosts the Datastore database
    #[arg(long, env = "GOOGLE_DATASTORE_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Database id inside the project (uses the (default) database if unset)
    #[arg(long, env = "GOOGLE_DATASTORE_DATASET_ID")]
    pub dataset_id: Option<String>,

    /// Path to a service account JSON key file
    #[arg(long, env = "GOOGLE_DATASTORE_KEYFILE")]
    pub keyfile: Option<String>,

    /// OAuth2 access token used instead of a key file
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Datastore REST endpoint (defaults to DATASTORE_EMULATOR_HOST or the public endpoint)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// gcloud binary used to mint access tokens from the key file
    #[arg(long, default_value = "gcloud")]
    pub gcloud_binary: PathBuf,

    /// Enable debug logging in the YCSB Datastore binding
    #[arg(long)]
    pub debug: bool,

    /// Use an in-memory Datastore instead of a real one (dry run)
    #[arg(long)]
    pub in_memory: bool,

    /// Entities created per kind in the in-memory Datastore
    #[arg(long, default_value = "0")]
    pub in_memory_seed: usize,
}

impl DatastoreOpts {
    /// The dataset the bulk deleter works on. Falls back to `fallback_project`
    /// (typically the key file's project) when no project id is given.
    pub fn dataset(&self, fallback_project: Option<&str>) -> anyhow::Result<DatasetId> {
        let project = self
            .project_id
            .as_deref()
            .or(fallback_project)
            .ok_or_else(|| anyhow::anyhow!("--project-id must be set"))?;
        let dataset = DatasetId::new(project);
        Ok(match &self.dataset_id {
            Some(database) => dataset.with_database(database),
            None => dataset,
        })
    }
}

#[derive(Parser, Clone, Debug, Default)]
pub struct CleanupOpts {
    /// YAML file with batch tier settings; flags below override it
    #[arg(long, value_name = "PATH")]
    pub batch_config: Option<PathBuf>,

    /// Kinds to delete
    #[arg(long = "kind", value_name = "KIND")]
    pub kinds: Vec<String>,

    /// Maximum concurrent deletion tasks
    #[arg(long)]
    pub worker_pool_size: Option<usize>,

    /// Keys requested per paged query
    #[arg(long)]
    pub read_page_size: Option<usize>,

    /// Buffered key count that triggers task submission
    #[arg(long)]
    pub delete_submit_threshold: Option<usize>,

    /// Keys handed to one deletion task
    #[arg(long)]
    pub per_task_chunk_size: Option<usize>,

    /// Keys sent in one delete commit (at most 500)
    #[arg(long)]
    pub per_operation_chunk_size: Option<usize>,

    /// Maximum keys fetched by one reconciliation pass
    #[arg(long)]
    pub reconciliation_fetch_limit: Option<usize>,

    /// Reconciliation passes before giving up
    #[arg(long)]
    pub max_reconciliation_passes: Option<usize>,

    /// Fixed wait before awaiting submitted tasks (e.g. "60s")
    #[arg(long)]
    pub completion_grace: Option<String>,

    /// Wait before the reconciliation scan (e.g. "5s")
    #[arg(long)]
    pub settle_delay: Option<String>,
}

impl CleanupOpts {
    /// Kinds to drain, defaulting to the YCSB collections.
    pub fn kinds(&self) -> Vec<String> {
        if self.kinds.is_empty() {
            YCSB_COLLECTIONS.iter().map(|k| k.to_string()).collect()
        } else {
            self.kinds.clone()
        }
    }

    /// Defaults, then the YAML file, then individual flags.
    pub fn batch_config(&self) -> anyhow::Result<BatchConfig> {
        let mut config = match &self.batch_config {
            Some(path) => crate::config::load_batch_config(path)?,
            None => BatchConfig::default(),
        };

        let overrides = [
            (&mut config.worker_pool_size, self.worker_pool_size),
            (&mut config.read_page_size, self.read_page_size),
            (&mut config.delete_submit_threshold, self.delete_submit_threshold),
            (&mut config.per_task_chunk_size, self.per_task_chunk_size),
            (&mut config.per_operation_chunk_size, self.per_operation_chunk_size),
            (&mut config.reconciliation_fetch_limit, self.reconciliation_fetch_limit),
            (&mut config.max_reconciliation_passes, self.max_reconciliation_passes),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(grace) = &self.completion_grace {
            config.completion_grace_secs = crate::config::parse_duration(grace)?.as_secs();
        }
        if let Some(delay) = &self.settle_delay {
            config.settle_delay_secs = crate::config::parse_duration(delay)?.as_secs();
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser, Clone, Debug)]
pub struct RampOpts {
    /// Aggregate QPS the load phase ramps up to
    #[arg(long, default_value = "500", env = "GOOGLE_DATASTORE_TARGET_LOAD_QPS")]
    pub target_load_qps: u64,

    /// Number of concurrent YCSB client processes
    #[arg(long, default_value = "1")]
    pub client_count: usize,

    /// Maximum YCSB threads per client during load
    #[arg(long, default_value = "32")]
    pub preload_threads: u32,

    /// Time limit of each intermediate ramp stage (e.g. "300", "5m")
    #[arg(long, default_value = "5m")]
    pub incremental_time_limit: String,

    /// First intermediate target of the geometric ramp
    #[arg(long, default_value = "500")]
    pub ramp_start_qps: u64,

    /// Growth factor between geometric ramp stages
    #[arg(long, default_value = "1.5")]
    pub ramp_growth_factor: f64,

    /// Use fixed increments of this many QPS instead of a geometric ramp
    #[arg(long)]
    pub ramp_step_qps: Option<u64>,
}

#[derive(Parser, Clone, Debug)]
pub struct YcsbOpts {
    /// YCSB launcher
    #[arg(long, default_value = "ycsb", env = "YCSB_BINARY")]
    pub ycsb_binary: PathBuf,

    /// YCSB workload file
    #[arg(long, default_value = "workloads/workloada")]
    pub workload: PathBuf,

    /// Records in the database
    #[arg(long, default_value = "1000")]
    pub record_count: u64,

    /// Operations per client during the run phase (workload default if unset)
    #[arg(long)]
    pub operation_count: Option<u64>,

    /// YCSB threads per client during the run phase
    #[arg(long, default_value = "32")]
    pub run_threads: u32,

    /// Retries YCSB makes for a failed insert
    #[arg(long, default_value = "100")]
    pub insertion_retry_limit: u32,

    /// Skip the load phase
    #[arg(long)]
    pub skip_load_stage: bool,

    /// Skip the run phase
    #[arg(long)]
    pub skip_run_stage: bool,

    /// Empty the database and load fresh data before running
    #[arg(long)]
    pub repopulate: bool,

    /// Wait after a fresh load before running, so Datastore can compact
    #[arg(long, default_value = "30m")]
    pub post_load_sleep: String,

    #[command(flatten)]
    pub ramp: RampOpts,
}
