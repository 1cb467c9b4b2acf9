//! Cloud Datastore client for datastore-ycsb.
//!
//! Provides the two store operations the cleanup pipeline relies on:
//!
//! - keys-only, cursor-paginated queries over a kind
//! - non-transactional multi-key deletes (at most [`MAX_KEYS_PER_COMMIT`] keys)
//!
//! # Implementations
//!
//! - [`RestClientFactory`] / [`RestDatastoreClient`] - Datastore v1 REST API
//!   (or the emulator via `DATASTORE_EMULATOR_HOST`)
//! - [`MemoryDatastore`] - in-process store used by tests and `--in-memory` runs
//!
//! Callers obtain clients through [`ClientFactory`] so each unit of work can
//! own its own client instance.

mod client;
mod error;
pub mod memory;
pub mod rest;
mod types;

pub use client::{ClientFactory, Credentials, DatasetId, DatastoreClient};
pub use error::DatastoreError;
pub use memory::MemoryDatastore;
pub use rest::{RestClientFactory, RestDatastoreClient};
pub use types::{Cursor, Key, KeyPage, PartitionId, PathElement, MAX_KEYS_PER_COMMIT};
