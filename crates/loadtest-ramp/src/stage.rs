//! Ramp stages and their results.

use serde::Serialize;
use std::time::Duration;

/// One step of a ramp, expressed per load-generating client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RampStage {
    /// Position in the ramp, starting at 0.
    pub index: usize,
    /// Target operations per second for each client.
    pub target_per_client: u64,
    /// Worker threads per client.
    pub threads: u32,
    /// Time limit for the stage; `None` runs until the workload completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<Duration>,
}

impl RampStage {
    pub fn is_final(&self) -> bool {
        self.time_limit.is_none()
    }
}

impl std::fmt::Display for RampStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stage {} (target {}/client, {} threads",
            self.index, self.target_per_client, self.threads
        )?;
        match self.time_limit {
            Some(limit) => write!(f, ", limit {}s)", limit.as_secs()),
            None => write!(f, ", unbounded)"),
        }
    }
}

/// What a load runner observed during one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageOutcome {
    /// Aggregate throughput across clients, when the runner measures it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_ops_sec: Option<f64>,
    pub elapsed: Duration,
}

/// Every stage of a completed ramp, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RampReport {
    pub stages: Vec<(RampStage, StageOutcome)>,
}

impl RampReport {
    pub fn final_stage(&self) -> Option<&(RampStage, StageOutcome)> {
        self.stages.last()
    }
}
