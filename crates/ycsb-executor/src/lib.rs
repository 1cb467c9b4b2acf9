//! YCSB process driver for Cloud Datastore benchmarks.
//!
//! [`YcsbExecutor`] builds and runs single `ycsb load`/`ycsb run`
//! invocations against the `googledatastore` binding. [`YcsbLoadRunner`]
//! plugs the executor into a `loadtest_ramp::RampController`, running every
//! stage as several concurrent load clients over disjoint key ranges.

mod command;
mod error;
mod output;
mod runner;

pub use command::{
    Phase, YcsbExecutor, YcsbInvocation, CREDENTIALS_ENV, DATASTORE_BINDING,
};
pub use error::YcsbError;
pub use output::{parse_ycsb_output, Sample, YcsbOutput};
pub use runner::{YcsbLoadRunner, DEFAULT_INSERTION_RETRY_LIMIT};
