//! Drains kinds: scan, buffer, dispatch, barrier, reconcile.

use futures::future::join_all;

use datastore_client::{DatastoreClient, DatastoreError, Key};

use crate::config::BatchConfig;
use crate::deleter::{BatchDeleter, DeletionTask};
use crate::error::BulkDeleteError;
use crate::pool::WorkerPool;
use crate::report::{DatabaseReport, DrainReport};
use crate::scanner::PaginatedKeyScanner;

/// Deletes every entity of a kind.
///
/// The coordinator is the only reader of the scanner and the only writer of
/// the pending buffer. Deletes run on a [`WorkerPool`] per drain; their
/// outcomes are folded into the [`DrainReport`] after the barrier.
pub struct DeletionCoordinator {
    config: BatchConfig,
    deleter: BatchDeleter,
}

impl DeletionCoordinator {
    pub fn new(config: BatchConfig, deleter: BatchDeleter) -> Result<Self, BulkDeleteError> {
        config.validate()?;
        Ok(Self { config, deleter })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Delete every entity of `kind`.
    ///
    /// Returns once all dispatched tasks have finished and a reconciliation
    /// scan found no remaining keys (or reconciliation gave up, which sets
    /// `has_errors`). Task failures never abort the drain; a failed page
    /// fetch does, after in-flight tasks are awaited.
    pub async fn drain_collection(&self, kind: &str) -> Result<DrainReport, BulkDeleteError> {
        let mut report = DrainReport::new(kind);
        let client = self
            .deleter
            .create_client()
            .map_err(|source| BulkDeleteError::Client {
                kind: kind.to_string(),
                source,
            })?;

        let mut pool = WorkerPool::new(self.config.worker_pool_size);
        let mut pending: Vec<Key> = Vec::new();
        let mut next_task_id = 1u64;

        let scanned = self
            .scan_and_dispatch(
                client.as_ref(),
                kind,
                &mut pool,
                &mut pending,
                &mut next_task_id,
                &mut report,
            )
            .await;

        if let Err(e) = &scanned {
            tracing::error!("Scan of {} failed after {} keys: {}", kind, report.total_read, e);
            // Keys already read are still deleted before unwinding.
            self.dispatch(kind, &mut pending, true, &mut pool, &mut next_task_id, &mut report);
        }

        self.await_tasks(kind, &mut pool, &mut report).await;

        if let Err(source) = scanned {
            report.finish();
            return Err(BulkDeleteError::Scan {
                kind: kind.to_string(),
                report: Box::new(report),
                source,
            });
        }

        self.reconcile(kind, next_task_id, &mut report).await?;

        report.finish();
        tracing::info!(
            "Deleted all data for {} - {} - {}",
            self.deleter.dataset(),
            kind,
            report.total_deleted
        );
        Ok(report)
    }

    /// Drain several kinds concurrently and wait for all of them.
    ///
    /// Fatal errors of one kind are folded into that kind's report so the
    /// other kinds still finish.
    pub async fn drain_all(&self, kinds: &[String]) -> DatabaseReport {
        tracing::info!(
            "Attempting to delete all data in {} for kinds {:?}",
            self.deleter.dataset(),
            kinds
        );

        let drains = kinds.iter().map(|kind| async move {
            match self.drain_collection(kind).await {
                Ok(report) => report,
                Err(e) => {
                    let mut report = match e.partial_report() {
                        Some(partial) => partial.clone(),
                        None => DrainReport::new(kind.as_str()),
                    };
                    report.record_error(e.to_string());
                    report.finish();
                    report
                }
            }
        });
        let reports = join_all(drains).await;

        let report = DatabaseReport {
            dataset: self.deleter.dataset().to_string(),
            kinds: reports,
        };
        tracing::info!(
            "Deleted {} entities in {} (errors: {})",
            report.total_deleted(),
            report.dataset,
            report.has_errors()
        );
        report
    }

    async fn scan_and_dispatch(
        &self,
        client: &dyn DatastoreClient,
        kind: &str,
        pool: &mut WorkerPool,
        pending: &mut Vec<Key>,
        next_task_id: &mut u64,
        report: &mut DrainReport,
    ) -> Result<(), DatastoreError> {
        let mut scanner = PaginatedKeyScanner::new(client, kind, self.config.read_page_size);

        while let Some(page) = scanner.next_page().await? {
            report.total_read += page.keys.len() as u64;
            pending.extend(page.keys);

            if pending.len() >= self.config.delete_submit_threshold {
                tracing::info!("Creating tasks...Read {} in total", report.total_read);
                self.dispatch(kind, pending, false, pool, next_task_id, report);
            }
        }

        tracing::info!("Read all existing records for {}", kind);
        if !pending.is_empty() {
            tracing::info!(
                "Entities batch is not empty {}, submitting new tasks",
                pending.len()
            );
            self.dispatch(kind, pending, true, pool, next_task_id, report);
        }
        Ok(())
    }

    /// Slice per-task chunks off the front of `pending` and submit them.
    ///
    /// Without `flush`, a remainder shorter than one chunk stays buffered.
    fn dispatch(
        &self,
        kind: &str,
        pending: &mut Vec<Key>,
        flush: bool,
        pool: &mut WorkerPool,
        next_task_id: &mut u64,
        report: &mut DrainReport,
    ) {
        let chunk_size = self.config.per_task_chunk_size;
        while pending.len() >= chunk_size || (flush && !pending.is_empty()) {
            let take = chunk_size.min(pending.len());
            let chunk: Vec<Key> = pending.drain(..take).collect();
            let task = DeletionTask::new(*next_task_id, kind);
            let deleter = self.deleter.clone();

            tracing::debug!(
                "Creating new Task {} - {} keys for {} kind, read {} in total",
                task.task_id,
                chunk.len(),
                kind,
                report.total_read
            );
            pool.submit(async move { deleter.delete_entities(task, chunk).await });

            *next_task_id += 1;
            report.tasks_dispatched += 1;
        }
    }

    async fn await_tasks(&self, kind: &str, pool: &mut WorkerPool, report: &mut DrainReport) {
        let grace = self.config.completion_grace();
        if !grace.is_zero() {
            tracing::info!("Waiting {:?} before joining tasks for {}", grace, kind);
            tokio::time::sleep(grace).await;
        }

        tracing::info!(
            "Waiting for all tasks - {} to complete...",
            pool.in_flight()
        );
        for result in pool.join_all().await {
            match result {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    tracing::error!("Deletion task for {} did not complete: {}", kind, e);
                    report.failed_tasks += 1;
                    report.record_error(format!("deletion task did not complete: {e}"));
                }
            }
        }
    }

    /// Rescan the kind and delete leftovers on the calling task until a scan
    /// comes back empty.
    async fn reconcile(
        &self,
        kind: &str,
        first_task_id: u64,
        report: &mut DrainReport,
    ) -> Result<(), BulkDeleteError> {
        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let mut task_id = first_task_id;
        for pass in 1..=self.config.max_reconciliation_passes {
            let client = self
                .deleter
                .create_client()
                .map_err(|source| BulkDeleteError::Client {
                    kind: kind.to_string(),
                    source,
                })?;
            let mut scanner =
                PaginatedKeyScanner::new(client.as_ref(), kind, self.config.read_page_size);
            let leftovers = match scanner
                .collect_up_to(self.config.reconciliation_fetch_limit)
                .await
            {
                Ok(keys) => keys,
                Err(source) => {
                    report.finish();
                    return Err(BulkDeleteError::Scan {
                        kind: kind.to_string(),
                        report: Box::new(report.clone()),
                        source,
                    });
                }
            };
            report.reconciliation_passes += 1;

            if leftovers.is_empty() {
                tracing::debug!("Reconciliation pass {} found no keys for {}", pass, kind);
                return Ok(());
            }

            tracing::info!(
                "Deleting leftover {} entities for {}",
                leftovers.len(),
                kind
            );
            let outcome = self
                .deleter
                .delete_entities(DeletionTask::new(task_id, kind), leftovers)
                .await;
            task_id += 1;
            report.leftover_deleted += outcome.deleted;
            report.record(&outcome);

            if outcome.is_error() {
                return Ok(());
            }
        }

        tracing::warn!(
            "Keys of {} still present after {} reconciliation passes",
            kind,
            self.config.max_reconciliation_passes
        );
        report.record_error(format!(
            "reconciliation did not converge after {} passes",
            self.config.max_reconciliation_passes
        ));
        Ok(())
    }
}
