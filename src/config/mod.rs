//! Configuration helpers shared by the CLI and the benchmark phases.

mod batch;
mod duration;

pub use batch::load_batch_config;
pub use duration::parse_duration;
