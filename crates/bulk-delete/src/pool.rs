//! Bounded pool for deletion tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::deleter::TaskOutcome;

/// Runs submitted tasks on the tokio runtime with at most `size` of them
/// executing at once.
///
/// Submission never blocks: tasks queue on the semaphore. Outcomes come back
/// through [`WorkerPool::join_all`], so the caller stays the only writer of
/// any aggregate built from them.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<TaskOutcome>,
    submitted: u64,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    pub fn submit<F>(&mut self, work: F)
    where
        F: Future<Output = TaskOutcome> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed, so acquisition only fails if the
            // pool itself is gone.
            let _permit = permits.acquire_owned().await.ok();
            work.await
        });
        self.submitted += 1;
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Tasks submitted but not yet joined.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every submitted task. A task that panicked yields its
    /// `JoinError`.
    pub async fn join_all(&mut self) -> Vec<Result<TaskOutcome, JoinError>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn outcome(task_id: u64) -> TaskOutcome {
        TaskOutcome {
            task_id,
            kind: "usertable".to_string(),
            deleted: task_id,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_join_all_collects_every_outcome() {
        let mut pool = WorkerPool::new(3);
        for id in 1..=10 {
            pool.submit(async move { outcome(id) });
        }
        assert_eq!(pool.submitted(), 10);

        let results = pool.join_all().await;
        let mut ids: Vec<u64> = results.into_iter().map(|r| r.unwrap().task_id).collect();
        ids.sort();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(2);

        for id in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                outcome(id)
            });
        }

        pool.join_all().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let mut pool = WorkerPool::new(1);
        let explode = true;
        pool.submit(async move {
            if explode {
                panic!("boom");
            }
            outcome(1)
        });
        pool.submit(async { outcome(2) });

        let results = pool.join_all().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }
}
