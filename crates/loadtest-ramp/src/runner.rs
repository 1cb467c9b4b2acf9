//! Load generator seam.

use async_trait::async_trait;

use crate::stage::{RampStage, StageOutcome};

/// Runs one stage of load and returns when it completes or times out.
#[async_trait]
pub trait LoadRunner: Send + Sync {
    async fn run_stage(&self, stage: &RampStage) -> anyhow::Result<StageOutcome>;
}
