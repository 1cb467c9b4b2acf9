use std::path::PathBuf;

use thiserror::Error;

use crate::command::Phase;

#[derive(Error, Debug)]
pub enum YcsbError {
    #[error("Failed to start YCSB binary {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YCSB ran but exited unsuccessfully. `stderr` holds the tail of its
    /// error output.
    #[error("YCSB {phase} exited with {status}: {stderr}")]
    Exited {
        phase: Phase,
        status: String,
        stderr: String,
    },

    #[error("I/O error while running YCSB: {0}")]
    Io(#[from] std::io::Error),
}
