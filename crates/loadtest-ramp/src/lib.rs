//! Incremental QPS ramp-up for load stages.
//!
//! Datastore throttles backends that receive a sudden burst of writes, so the
//! load phase warms up gradually: a [`RampStrategy`] proposes intermediate
//! aggregate targets, [`RampController`] turns them into per-client
//! [`RampStage`]s and runs them one after another through a [`LoadRunner`].
//!
//! ```text
//! final 2000 QPS, 2 clients, GeometricRamp { start: 500, growth: 1.5 }
//!   stage 0: 250/client  (limit 300s)
//!   stage 1: 375/client  (limit 300s)
//!   stage 2: 562/client  (limit 300s)
//!   stage 3: 843/client  (limit 300s)
//!   stage 4: 1000/client (unbounded)
//! ```

mod controller;
mod error;
mod runner;
mod stage;
mod strategy;

pub use controller::{RampController, DEFAULT_INCREMENTAL_TIME_LIMIT};
pub use error::RampError;
pub use runner::LoadRunner;
pub use stage::{RampReport, RampStage, StageOutcome};
pub use strategy::{FixedStepRamp, GeometricRamp, RampStrategy};
