//! Ramp stages executed as parallel YCSB load processes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::try_join_all;
use loadtest_ramp::{LoadRunner, RampStage, StageOutcome};

use crate::command::{Phase, YcsbExecutor, YcsbInvocation};

/// Default YCSB `core_workload_insertion_retry_limit` for Datastore loads.
pub const DEFAULT_INSERTION_RETRY_LIMIT: u32 = 100;

/// Runs each ramp stage as `client_count` concurrent `ycsb load` processes,
/// each inserting a disjoint slice of the key space at the stage's
/// per-client target.
pub struct YcsbLoadRunner {
    executor: Arc<YcsbExecutor>,
    client_count: usize,
    record_count: u64,
    insertion_retry_limit: u32,
}

impl YcsbLoadRunner {
    pub fn new(executor: Arc<YcsbExecutor>, client_count: usize, record_count: u64) -> Self {
        Self {
            executor,
            client_count: client_count.max(1),
            record_count,
            insertion_retry_limit: DEFAULT_INSERTION_RETRY_LIMIT,
        }
    }

    pub fn with_insertion_retry_limit(mut self, limit: u32) -> Self {
        self.insertion_retry_limit = limit;
        self
    }

    pub fn client_count(&self) -> usize {
        self.client_count
    }

    /// `(insertstart, insertcount)` for `client`; the last client takes the
    /// remainder.
    pub fn insert_range(&self, client: usize) -> (u64, u64) {
        let clients = self.client_count as u64;
        let per_client = self.record_count / clients;
        let start = per_client * client as u64;
        let count = if client + 1 == self.client_count {
            self.record_count - start
        } else {
            per_client
        };
        (start, count)
    }

    pub fn invocations(&self, stage: &RampStage) -> Vec<YcsbInvocation> {
        (0..self.client_count)
            .map(|client| {
                let (start, count) = self.insert_range(client);
                let mut invocation = YcsbInvocation::new(Phase::Load, stage.threads)
                    .target(stage.target_per_client)
                    .property("recordcount", self.record_count)
                    .property("insertstart", start)
                    .property("insertcount", count)
                    .property(
                        "core_workload_insertion_retry_limit",
                        self.insertion_retry_limit,
                    );
                if let Some(limit) = stage.time_limit {
                    invocation = invocation.property("maxexecutiontime", limit.as_secs());
                }
                invocation
            })
            .collect()
    }
}

#[async_trait]
impl LoadRunner for YcsbLoadRunner {
    async fn run_stage(&self, stage: &RampStage) -> anyhow::Result<StageOutcome> {
        let started = Instant::now();
        let invocations = self.invocations(stage);
        tracing::info!(
            "Starting {} YCSB load clients for {}",
            invocations.len(),
            stage
        );

        let outputs = try_join_all(
            invocations
                .iter()
                .map(|invocation| self.executor.execute(invocation)),
        )
        .await?;

        let measured: Vec<f64> = outputs.iter().filter_map(|o| o.throughput()).collect();
        let throughput_ops_sec = if measured.is_empty() {
            None
        } else {
            Some(measured.iter().sum())
        };

        Ok(StageOutcome {
            throughput_ops_sec,
            elapsed: started.elapsed(),
        })
    }
}
