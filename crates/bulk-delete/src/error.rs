//! Error types for the bulk-delete pipeline.

use datastore_client::DatastoreError;
use thiserror::Error;

use crate::report::DrainReport;

/// Errors that abort a drain.
///
/// Task-level delete failures do not abort a drain; they are reported through
/// [`DrainReport::has_errors`].
#[derive(Error, Debug)]
pub enum BulkDeleteError {
    /// Invalid batch configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A client for the main or a reconciliation scan could not be created.
    #[error("Failed to create Datastore client for kind '{kind}': {source}")]
    Client {
        kind: String,
        #[source]
        source: DatastoreError,
    },

    /// A page fetch failed. `report` holds what was deleted before the
    /// failure, including errors from tasks that were already in flight.
    #[error("Failed to scan kind '{kind}' after reading {} keys: {source}", report.total_read)]
    Scan {
        kind: String,
        report: Box<DrainReport>,
        #[source]
        source: DatastoreError,
    },
}

impl BulkDeleteError {
    /// Partial report attached to the error, if any.
    pub fn partial_report(&self) -> Option<&DrainReport> {
        match self {
            Self::Scan { report, .. } => Some(report),
            _ => None,
        }
    }
}
