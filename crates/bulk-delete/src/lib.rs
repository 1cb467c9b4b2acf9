//! Bulk deletion of Datastore kinds.
//!
//! ```text
//! PaginatedKeyScanner ──pages──▶ pending buffer ──chunks──▶ WorkerPool
//!        ▲                     (DeletionCoordinator)           │
//!        │                                                     ▼
//!   reconciliation scan ◀── barrier ◀── TaskOutcome ◀── BatchDeleter ──▶ delete_multi
//! ```
//!
//! Batch tiers (defaults): read 12000 keys per page, submit once 6000 keys are
//! buffered, 3000 keys per task, 500 keys per commit. See [`BatchConfig`].
//!
//! Deletes are at-least-once: a key may be sent twice (for example when a
//! reconciliation scan sees it before a slow commit lands) and not-found
//! responses count as success.

mod config;
mod coordinator;
mod deleter;
mod error;
mod pool;
mod report;
mod scanner;

pub use config::BatchConfig;
pub use coordinator::DeletionCoordinator;
pub use deleter::{BatchDeleter, DeletionTask, TaskOutcome};
pub use error::BulkDeleteError;
pub use pool::WorkerPool;
pub use report::{DatabaseReport, DrainReport};
pub use scanner::PaginatedKeyScanner;
