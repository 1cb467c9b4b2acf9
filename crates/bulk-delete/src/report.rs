//! Drain results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::deleter::TaskOutcome;

/// Outcome of draining one kind.
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    pub kind: String,
    /// Keys returned by the cursor-driven pass.
    pub total_read: u64,
    /// Keys deleted by pool tasks and reconciliation.
    pub total_deleted: u64,
    pub tasks_dispatched: u64,
    pub failed_tasks: u64,
    pub reconciliation_passes: u64,
    /// Keys found and deleted by reconciliation passes.
    pub leftover_deleted: u64,
    /// OR of every task error flag, plus unfinished reconciliation.
    pub has_errors: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DrainReport {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            total_read: 0,
            total_deleted: 0,
            tasks_dispatched: 0,
            failed_tasks: 0,
            reconciliation_passes: 0,
            leftover_deleted: 0,
            has_errors: false,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Fold one task outcome into the aggregate.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.total_deleted += outcome.deleted;
        if let Some(error) = &outcome.error {
            self.failed_tasks += 1;
            self.has_errors = true;
            self.errors.push(format!("task {}: {error}", outcome.task_id));
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.has_errors = true;
        self.errors.push(message.into());
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Outcome of draining every requested kind of a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseReport {
    pub dataset: String,
    pub kinds: Vec<DrainReport>,
}

impl DatabaseReport {
    pub fn total_deleted(&self) -> u64 {
        self.kinds.iter().map(|k| k.total_deleted).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.kinds.iter().any(|k| k.has_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastore_client::DatastoreError;

    #[test]
    fn test_record_aggregates_outcomes() {
        let mut report = DrainReport::new("usertable");
        report.record(&TaskOutcome {
            task_id: 1,
            kind: "usertable".to_string(),
            deleted: 3000,
            error: None,
        });
        report.record(&TaskOutcome {
            task_id: 2,
            kind: "usertable".to_string(),
            deleted: 500,
            error: Some(DatastoreError::Rejected {
                status: 400,
                message: "bad key".to_string(),
            }),
        });

        assert_eq!(report.total_deleted, 3500);
        assert_eq!(report.failed_tasks, 1);
        assert!(report.has_errors);
        assert!(report.errors[0].starts_with("task 2:"));
    }

    #[test]
    fn test_database_report_totals() {
        let mut a = DrainReport::new("a");
        a.total_deleted = 10;
        let mut b = DrainReport::new("b");
        b.total_deleted = 5;
        b.record_error("reconciliation incomplete");

        let report = DatabaseReport {
            dataset: "proj/(default)".to_string(),
            kinds: vec![a, b],
        };
        assert_eq!(report.total_deleted(), 15);
        assert!(report.has_errors());
    }
}
