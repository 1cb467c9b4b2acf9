//! Per-task batched deletes.

use std::sync::Arc;

use datastore_client::{ClientFactory, Credentials, DatasetId, DatastoreClient, DatastoreError, Key};

/// Identity of one dispatched unit of delete work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTask {
    pub task_id: u64,
    pub kind: String,
}

impl DeletionTask {
    pub fn new(task_id: u64, kind: impl Into<String>) -> Self {
        Self {
            task_id,
            kind: kind.into(),
        }
    }
}

/// Result of one deletion task, returned to the coordinator by value.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task_id: u64,
    pub kind: String,
    /// Keys covered by successful commits.
    pub deleted: u64,
    /// First non-not-found failure; the task stopped there.
    pub error: Option<DatastoreError>,
}

impl TaskOutcome {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Deletes key lists in commit-sized batches.
///
/// Cloning is cheap: the client factory is shared, but every call to
/// [`BatchDeleter::delete_entities`] builds its own client.
#[derive(Clone)]
pub struct BatchDeleter {
    factory: Arc<dyn ClientFactory>,
    dataset: DatasetId,
    credentials: Credentials,
    operation_chunk_size: usize,
}

impl BatchDeleter {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        dataset: DatasetId,
        credentials: Credentials,
        operation_chunk_size: usize,
    ) -> Self {
        Self {
            factory,
            dataset,
            credentials,
            operation_chunk_size: operation_chunk_size.max(1),
        }
    }

    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    /// Build a client with the deleter's dataset and credentials.
    pub fn create_client(&self) -> Result<Box<dyn DatastoreClient>, DatastoreError> {
        self.factory.create_client(&self.dataset, &self.credentials)
    }

    /// Delete `keys` one commit at a time.
    ///
    /// Not-found responses count as deleted. Any other failure is recorded on
    /// the outcome and stops the task; remaining chunks are left for a later
    /// pass.
    pub async fn delete_entities(&self, task: DeletionTask, keys: Vec<Key>) -> TaskOutcome {
        let mut outcome = TaskOutcome {
            task_id: task.task_id,
            kind: task.kind,
            deleted: 0,
            error: None,
        };

        let client = match self.create_client() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(
                    "Task {} - Failed to create client for {}: {}",
                    outcome.task_id,
                    outcome.kind,
                    e
                );
                outcome.error = Some(e);
                return outcome;
            }
        };

        tracing::info!(
            "Task {} - Started deletion of {} keys for {}",
            outcome.task_id,
            keys.len(),
            outcome.kind
        );

        for chunk in keys.chunks(self.operation_chunk_size) {
            match client.delete_multi(chunk).await {
                Ok(()) => outcome.deleted += chunk.len() as u64,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(
                        "Task {} - Some keys of {} were already deleted: {}",
                        outcome.task_id,
                        outcome.kind,
                        e
                    );
                    outcome.deleted += chunk.len() as u64;
                }
                Err(e) => {
                    tracing::error!(
                        "Task {} - Delete entities for {} failed due to {}",
                        outcome.task_id,
                        outcome.kind,
                        e
                    );
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        if !outcome.is_error() {
            tracing::info!(
                "Task {} - Completed deletion for {} - {}",
                outcome.task_id,
                outcome.kind,
                outcome.deleted
            );
        }
        outcome
    }
}
