//! Stage planning and sequential execution.

use std::time::{Duration, Instant};

use crate::error::RampError;
use crate::runner::LoadRunner;
use crate::stage::{RampReport, RampStage};
use crate::strategy::{GeometricRamp, RampStrategy};

/// Default time limit for each intermediate stage.
pub const DEFAULT_INCREMENTAL_TIME_LIMIT: Duration = Duration::from_secs(5 * 60);

/// Drives a [`LoadRunner`] through increasing QPS targets.
///
/// Targets are split evenly across clients. Intermediate stages are bounded
/// by `incremental_time_limit`; the final stage runs the true target without
/// a limit.
pub struct RampController {
    strategy: Box<dyn RampStrategy>,
    max_preload_threads: u32,
    incremental_time_limit: Duration,
}

impl Default for RampController {
    fn default() -> Self {
        Self::new(Box::new(GeometricRamp::default()), 32, DEFAULT_INCREMENTAL_TIME_LIMIT)
    }
}

impl RampController {
    pub fn new(
        strategy: Box<dyn RampStrategy>,
        max_preload_threads: u32,
        incremental_time_limit: Duration,
    ) -> Self {
        Self {
            strategy,
            max_preload_threads: max_preload_threads.max(1),
            incremental_time_limit,
        }
    }

    /// Compute every stage for `final_target_qps` split over `client_count`
    /// clients. The last stage is always the final target.
    pub fn plan(
        &self,
        final_target_qps: u64,
        client_count: usize,
    ) -> Result<Vec<RampStage>, RampError> {
        if client_count == 0 {
            return Err(RampError::InvalidConfig(
                "client count must be at least 1".to_string(),
            ));
        }
        if final_target_qps == 0 {
            return Err(RampError::InvalidConfig(
                "final target QPS must be greater than 0".to_string(),
            ));
        }
        self.strategy.validate().map_err(|e| {
            RampError::InvalidConfig(format!("{} ramp: {e}", self.strategy.name()))
        })?;
        let clients = client_count as u64;
        let final_per_client = final_target_qps / clients;
        if final_per_client == 0 {
            return Err(RampError::InvalidConfig(format!(
                "final target of {final_target_qps} QPS is below 1 QPS per client for {client_count} clients"
            )));
        }

        let targets = self.strategy.intermediate_targets(final_target_qps);
        tracing::info!(
            "Incremental load stage target QPS ({}): {:?}",
            self.strategy.name(),
            targets
        );

        let mut stages: Vec<RampStage> = Vec::with_capacity(targets.len() + 1);
        let mut previous = 0;
        for target in targets {
            let per_client = target / clients;
            // Integer division can collapse neighbouring targets.
            if per_client == 0 || per_client <= previous || per_client >= final_per_client {
                tracing::debug!("Skipping ramp target {target} ({per_client}/client)");
                continue;
            }
            previous = per_client;
            stages.push(RampStage {
                index: stages.len(),
                target_per_client: per_client,
                threads: self.threads_for(per_client),
                time_limit: Some(self.incremental_time_limit),
            });
        }

        stages.push(RampStage {
            index: stages.len(),
            target_per_client: final_per_client,
            threads: self.max_preload_threads,
            time_limit: None,
        });
        Ok(stages)
    }

    /// Run every stage in order, waiting for each to finish before starting
    /// the next. The first failing stage aborts the ramp.
    pub async fn ramp_up(
        &self,
        final_target_qps: u64,
        client_count: usize,
        runner: &dyn LoadRunner,
    ) -> Result<RampReport, RampError> {
        let stages = self.plan(final_target_qps, client_count)?;
        let total = stages.len();
        let mut report = RampReport::default();

        for stage in stages {
            tracing::info!("Running ramp {} of {}: {}", stage.index + 1, total, stage);
            let start = Instant::now();
            let mut outcome =
                runner
                    .run_stage(&stage)
                    .await
                    .map_err(|cause| RampError::StageFailed {
                        index: stage.index,
                        target_per_client: stage.target_per_client,
                        cause,
                    })?;
            if outcome.elapsed.is_zero() {
                outcome.elapsed = start.elapsed();
            }
            tracing::info!(
                "Completed {} in {:.1}s (throughput: {:?})",
                stage,
                outcome.elapsed.as_secs_f64(),
                outcome.throughput_ops_sec
            );
            report.stages.push((stage, outcome));
        }
        Ok(report)
    }

    fn threads_for(&self, per_client: u64) -> u32 {
        per_client.clamp(1, u64::from(self.max_preload_threads)) as u32
    }
}
