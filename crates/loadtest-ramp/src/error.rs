//! Error types for ramp planning and execution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RampError {
    /// Ramp inputs that cannot produce a valid plan.
    #[error("Invalid ramp configuration: {0}")]
    InvalidConfig(String),

    /// A stage failed; later stages were not run.
    #[error("Ramp stage {index} (target {target_per_client}/client) failed: {cause:#}")]
    StageFailed {
        index: usize,
        target_per_client: u64,
        cause: anyhow::Error,
    },
}
