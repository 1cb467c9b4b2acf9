//! Benchmark phases: prerequisite checks, emptying, ramped load and run.

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use bulk_delete::{BatchDeleter, DatabaseReport, DeletionCoordinator};
use datastore_client::{ClientFactory, MemoryDatastore, RestClientFactory};
use loadtest_ramp::{
    FixedStepRamp, GeometricRamp, LoadRunner, RampController, RampReport, RampStrategy,
};
use ycsb_executor::{Phase, Sample, YcsbExecutor, YcsbInvocation, YcsbLoadRunner};

use crate::config::parse_duration;
use crate::credentials::{keyfile_path, resolve_credentials, ResolvedCredentials};
use crate::{CleanupOpts, DatastoreOpts, RampOpts, YcsbOpts};

/// Fail fast on option combinations that cannot run.
pub fn check_prerequisites(datastore: &DatastoreOpts, ycsb: &YcsbOpts) -> anyhow::Result<()> {
    if !ycsb.skip_load_stage && ycsb.ramp.target_load_qps == 0 {
        anyhow::bail!("--target-load-qps must be set when loading the database");
    }
    if ycsb.ramp.client_count == 0 {
        anyhow::bail!("--client-count must be at least 1");
    }
    if !ycsb.skip_load_stage && ycsb.record_count < ycsb.ramp.client_count as u64 {
        anyhow::bail!(
            "--record-count ({}) must be at least --client-count ({}) so every client inserts records",
            ycsb.record_count,
            ycsb.ramp.client_count
        );
    }
    if let Some(keyfile) = &datastore.keyfile {
        keyfile_path(keyfile)?;
    }
    parse_duration(&ycsb.ramp.incremental_time_limit)
        .context("Invalid --incremental-time-limit")?;
    parse_duration(&ycsb.post_load_sleep).context("Invalid --post-load-sleep")?;
    Ok(())
}

/// `-p` properties shared by every YCSB invocation.
pub fn common_ycsb_properties(datastore: &DatastoreOpts) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    if let Some(project) = &datastore.project_id {
        properties.insert("googledatastore.projectId".to_string(), project.clone());
    }
    properties.insert(
        "googledatastore.debug".to_string(),
        datastore.debug.to_string(),
    );
    // The binding uses the (default) database when no dataset is given.
    if let Some(dataset) = &datastore.dataset_id {
        properties.insert("googledatastore.datasetId".to_string(), dataset.clone());
    }
    properties
}

/// Executor with the common properties and, when a key file is configured,
/// `GOOGLE_APPLICATION_CREDENTIALS` pointing at it.
pub fn ycsb_executor(datastore: &DatastoreOpts, ycsb: &YcsbOpts) -> anyhow::Result<YcsbExecutor> {
    let mut executor = YcsbExecutor::new(&ycsb.ycsb_binary, &ycsb.workload);
    for (key, value) in common_ycsb_properties(datastore) {
        executor = executor.property(key, value);
    }
    if let Some(keyfile) = &datastore.keyfile {
        executor = executor.with_credentials_file(&keyfile_path(keyfile)?);
    }
    Ok(executor)
}

pub fn ramp_controller(ramp: &RampOpts) -> anyhow::Result<RampController> {
    let strategy: Box<dyn RampStrategy> = match ramp.ramp_step_qps {
        Some(step) => Box::new(FixedStepRamp { step }),
        None => Box::new(GeometricRamp {
            starting_qps: ramp.ramp_start_qps,
            growth_factor: ramp.ramp_growth_factor,
        }),
    };
    let time_limit = parse_duration(&ramp.incremental_time_limit)
        .context("Invalid --incremental-time-limit")?;
    Ok(RampController::new(strategy, ramp.preload_threads, time_limit))
}

/// Store access for the bulk deleter.
pub struct Backend {
    pub factory: Arc<dyn ClientFactory>,
    pub credentials: ResolvedCredentials,
    /// Set when running against the in-memory store.
    pub memory: Option<MemoryDatastore>,
}

/// Build the store backend, or `None` when no credentials are available.
pub async fn connect(datastore: &DatastoreOpts, kinds: &[String]) -> anyhow::Result<Option<Backend>> {
    let Some(credentials) = resolve_credentials(datastore).await? else {
        return Ok(None);
    };

    if datastore.in_memory {
        let memory = MemoryDatastore::new();
        for kind in kinds {
            memory.populate(kind, datastore.in_memory_seed);
        }
        tracing::info!(
            "Using in-memory Datastore with {} entities per kind",
            datastore.in_memory_seed
        );
        return Ok(Some(Backend {
            factory: Arc::new(memory.clone()),
            credentials,
            memory: Some(memory),
        }));
    }

    let factory = match &datastore.endpoint {
        Some(endpoint) => RestClientFactory::new(endpoint.as_str())?,
        None => RestClientFactory::from_env()?,
    };
    tracing::debug!("Datastore endpoint: {}", factory.endpoint());
    Ok(Some(Backend {
        factory: Arc::new(factory),
        credentials,
        memory: None,
    }))
}

/// Delete every entity of the configured kinds.
///
/// Returns `None` (after a warning) when there are no credentials to delete
/// with.
pub async fn empty_database(
    datastore: &DatastoreOpts,
    cleanup: &CleanupOpts,
) -> anyhow::Result<Option<DatabaseReport>> {
    let kinds = cleanup.kinds();
    let config = cleanup.batch_config()?;
    let Some(backend) = connect(datastore, &kinds).await? else {
        tracing::warn!(
            "No Datastore credentials configured; manually delete all the entries via the Cloud console"
        );
        return Ok(None);
    };
    let report = empty_with_backend(datastore, &backend, &kinds, config).await?;
    Ok(Some(report))
}

pub async fn empty_with_backend(
    datastore: &DatastoreOpts,
    backend: &Backend,
    kinds: &[String],
    config: bulk_delete::BatchConfig,
) -> anyhow::Result<DatabaseReport> {
    let dataset = datastore.dataset(backend.credentials.key_project())?;
    let deleter = BatchDeleter::new(
        backend.factory.clone(),
        dataset,
        backend.credentials.credentials.clone(),
        config.per_operation_chunk_size,
    );
    let coordinator = DeletionCoordinator::new(config, deleter)?;
    Ok(coordinator.drain_all(kinds).await)
}

/// Ramp the YCSB load phase up to the target QPS.
pub async fn ramp_up_load(ramp: &RampOpts, runner: &dyn LoadRunner) -> anyhow::Result<RampReport> {
    let controller = ramp_controller(ramp)?;
    let report = controller
        .ramp_up(ramp.target_load_qps, ramp.client_count, runner)
        .await?;
    Ok(report)
}

/// Load phase: ramped `ycsb load` from every client.
pub async fn load(datastore: &DatastoreOpts, ycsb: &YcsbOpts) -> anyhow::Result<RampReport> {
    check_prerequisites(datastore, ycsb)?;
    let executor = Arc::new(ycsb_executor(datastore, ycsb)?);
    let runner = YcsbLoadRunner::new(executor, ycsb.ramp.client_count, ycsb.record_count)
        .with_insertion_retry_limit(ycsb.insertion_retry_limit);
    ramp_up_load(&ycsb.ramp, &runner).await
}

#[derive(Debug, Default, Serialize)]
pub struct PrepareReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<DatabaseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<RampReport>,
}

/// Optional repopulation followed by the ramped load.
pub async fn prepare(
    datastore: &DatastoreOpts,
    cleanup: &CleanupOpts,
    ycsb: &YcsbOpts,
) -> anyhow::Result<PrepareReport> {
    check_prerequisites(datastore, ycsb)?;
    let mut report = PrepareReport::default();

    if ycsb.repopulate {
        let cleaned = empty_database(datastore, cleanup).await?;
        if let Some(cleaned) = &cleaned {
            if cleaned.has_errors() {
                anyhow::bail!(
                    "Failed to empty {} before loading: {:?}",
                    cleaned.dataset,
                    cleaned
                        .kinds
                        .iter()
                        .flat_map(|k| k.errors.iter())
                        .collect::<Vec<_>>()
                );
            }
        }
        report.cleanup = cleaned;
    }

    if ycsb.skip_load_stage {
        tracing::info!("Skipping load stage");
        return Ok(report);
    }
    report.load = Some(load(datastore, ycsb).await?);
    Ok(report)
}

/// Measurements of one client's run phase.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRun {
    pub client: usize,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub clients: Vec<ClientRun>,
    /// Sum of every client's overall throughput.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_ops_sec: Option<f64>,
}

/// Run phase invocation for every client.
pub fn run_invocations(ycsb: &YcsbOpts) -> Vec<YcsbInvocation> {
    (0..ycsb.ramp.client_count)
        .map(|_| {
            let mut invocation = YcsbInvocation::new(Phase::Run, ycsb.run_threads)
                .property("googledatastore.tracingenabled", true)
                .property("readallfields", true)
                .property("writeallfields", true)
                .property("recordcount", ycsb.record_count);
            if let Some(count) = ycsb.operation_count {
                invocation = invocation.property("operationcount", count);
            }
            invocation
        })
        .collect()
}

/// Run the workload from every client and gather the measurements.
///
/// After a repopulating prepare, waits `--post-load-sleep` first so the
/// freshly loaded data can compact.
pub async fn run(datastore: &DatastoreOpts, ycsb: &YcsbOpts) -> anyhow::Result<Option<RunReport>> {
    check_prerequisites(datastore, ycsb)?;
    if ycsb.skip_run_stage {
        tracing::info!("Skipping run stage");
        return Ok(None);
    }

    if ycsb.repopulate {
        let sleep = parse_duration(&ycsb.post_load_sleep)?;
        tracing::info!("Sleeping {}s to allow for compaction", sleep.as_secs());
        tokio::time::sleep(sleep).await;
    }

    let executor = ycsb_executor(datastore, ycsb)?;
    let started_at = Utc::now();
    let invocations = run_invocations(ycsb);
    let outputs = try_join_all(invocations.iter().map(|i| executor.execute(i))).await?;

    let measured: Vec<f64> = outputs.iter().filter_map(|o| o.throughput()).collect();
    let throughput_ops_sec = (!measured.is_empty()).then(|| measured.iter().sum());
    let clients = outputs
        .into_iter()
        .enumerate()
        .map(|(client, output)| ClientRun {
            client,
            samples: output.samples,
        })
        .collect();

    let report = RunReport {
        started_at,
        completed_at: Utc::now(),
        clients,
        throughput_ops_sec,
    };
    tracing::info!(
        "Run phase finished with overall throughput {:?} ops/sec",
        report.throughput_ops_sec
    );
    Ok(Some(report))
}
