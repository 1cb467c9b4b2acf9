//! Batch tier configuration for the deletion pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use datastore_client::MAX_KEYS_PER_COMMIT;

use crate::error::BulkDeleteError;

/// Size limits and concurrency knobs for draining a kind.
///
/// The four batch tiers nest: a read page feeds the pending buffer, the
/// buffer is split into per-task chunks once it crosses the submit
/// threshold, and each task splits its chunk into per-commit batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of deletion tasks running at once.
    pub worker_pool_size: usize,
    /// Keys requested per paged query.
    pub read_page_size: usize,
    /// Buffered key count that triggers task submission.
    pub delete_submit_threshold: usize,
    /// Keys handed to a single deletion task.
    pub per_task_chunk_size: usize,
    /// Keys sent in a single delete commit.
    pub per_operation_chunk_size: usize,
    /// Maximum keys fetched by one reconciliation pass.
    pub reconciliation_fetch_limit: usize,
    /// Upper bound on reconciliation passes before giving up.
    pub max_reconciliation_passes: usize,
    /// Fixed wait before awaiting submitted tasks.
    pub completion_grace_secs: u64,
    /// Wait between the task barrier and the reconciliation scan.
    pub settle_delay_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 30,
            read_page_size: 12_000,
            delete_submit_threshold: 6_000,
            per_task_chunk_size: 3_000,
            per_operation_chunk_size: MAX_KEYS_PER_COMMIT,
            reconciliation_fetch_limit: 20_000,
            max_reconciliation_passes: 5,
            completion_grace_secs: 0,
            settle_delay_secs: 0,
        }
    }
}

impl BatchConfig {
    pub fn completion_grace(&self) -> Duration {
        Duration::from_secs(self.completion_grace_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Check that every tier is non-zero and the tiers nest:
    /// `read_page_size >= per_task_chunk_size >= per_operation_chunk_size`,
    /// `delete_submit_threshold >= per_task_chunk_size`, and a commit never
    /// exceeds the store limit.
    pub fn validate(&self) -> Result<(), BulkDeleteError> {
        let non_zero = [
            ("worker_pool_size", self.worker_pool_size),
            ("read_page_size", self.read_page_size),
            ("delete_submit_threshold", self.delete_submit_threshold),
            ("per_task_chunk_size", self.per_task_chunk_size),
            ("per_operation_chunk_size", self.per_operation_chunk_size),
            ("reconciliation_fetch_limit", self.reconciliation_fetch_limit),
            ("max_reconciliation_passes", self.max_reconciliation_passes),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(BulkDeleteError::Config(format!("{name} must be at least 1")));
            }
        }

        if self.per_operation_chunk_size > MAX_KEYS_PER_COMMIT {
            return Err(BulkDeleteError::Config(format!(
                "per_operation_chunk_size {} exceeds the per-commit limit of {}",
                self.per_operation_chunk_size, MAX_KEYS_PER_COMMIT
            )));
        }
        if self.per_task_chunk_size < self.per_operation_chunk_size {
            return Err(BulkDeleteError::Config(format!(
                "per_task_chunk_size {} is smaller than per_operation_chunk_size {}",
                self.per_task_chunk_size, self.per_operation_chunk_size
            )));
        }
        if self.read_page_size < self.per_task_chunk_size {
            return Err(BulkDeleteError::Config(format!(
                "read_page_size {} is smaller than per_task_chunk_size {}",
                self.read_page_size, self.per_task_chunk_size
            )));
        }
        if self.delete_submit_threshold < self.per_task_chunk_size {
            return Err(BulkDeleteError::Config(format!(
                "delete_submit_threshold {} is smaller than per_task_chunk_size {}",
                self.delete_submit_threshold, self.per_task_chunk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BatchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.worker_pool_size, 30);
        assert_eq!(config.read_page_size, 12_000);
        assert_eq!(config.delete_submit_threshold, 6_000);
        assert_eq!(config.per_task_chunk_size, 3_000);
        assert_eq!(config.per_operation_chunk_size, 500);
        assert_eq!(config.reconciliation_fetch_limit, 20_000);
    }

    #[test]
    fn test_rejects_zero_pool() {
        let config = BatchConfig {
            worker_pool_size: 0,
            ..BatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker_pool_size"));
    }

    #[test]
    fn test_rejects_inverted_tiers() {
        let config = BatchConfig {
            per_task_chunk_size: 400,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BatchConfig {
            read_page_size: 1_000,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BatchConfig {
            delete_submit_threshold: 2_000,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_commit_above_store_limit() {
        let config = BatchConfig {
            per_operation_chunk_size: 501,
            ..BatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("per-commit limit"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BatchConfig =
            serde_json::from_str(r#"{"worker_pool_size": 4, "settle_delay_secs": 2}"#).unwrap();
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.per_task_chunk_size, 3_000);
    }
}
