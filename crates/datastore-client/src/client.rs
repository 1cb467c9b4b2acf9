//! Client traits for the remote store.
//!
//! The bulk-delete pipeline only needs two RPCs: a keys-only paged query and a
//! multi-key delete. Clients are cheap to build, and every deletion task builds
//! its own through a shared [`ClientFactory`].

use async_trait::async_trait;

use crate::error::DatastoreError;
use crate::types::{Cursor, Key, KeyPage};

/// Project and database a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetId {
    pub project_id: String,
    /// Named database; `None` selects the `(default)` database.
    pub database_id: Option<String>,
}

impl DatasetId {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: None,
        }
    }

    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = Some(database_id.into());
        self
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.database_id {
            Some(db) => write!(f, "{}/{}", self.project_id, db),
            None => write!(f, "{}/(default)", self.project_id),
        }
    }
}

/// Credentials handed to every client a factory creates.
#[derive(Clone)]
pub enum Credentials {
    /// OAuth2 bearer token.
    AccessToken(String),
    /// No authentication (Datastore emulator, in-memory store).
    Anonymous,
}

impl Credentials {
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Self::AccessToken(token) => Some(token),
            Self::Anonymous => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(_) => write!(f, "AccessToken(***)"),
            Self::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// Keys-only query and multi-delete operations against one dataset.
#[async_trait]
pub trait DatastoreClient: Send + Sync {
    /// Fetch up to `limit` keys of `kind`, starting at `cursor` (or the
    /// beginning of the kind when `None`).
    async fn fetch_keys(
        &self,
        kind: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<KeyPage, DatastoreError>;

    /// Delete `keys` in one non-transactional commit.
    ///
    /// Implementations reject batches larger than
    /// [`crate::MAX_KEYS_PER_COMMIT`] with [`DatastoreError::BatchTooLarge`].
    async fn delete_multi(&self, keys: &[Key]) -> Result<(), DatastoreError>;
}

/// Builds a fresh client per caller.
pub trait ClientFactory: Send + Sync {
    fn create_client(
        &self,
        dataset: &DatasetId,
        credentials: &Credentials,
    ) -> Result<Box<dyn DatastoreClient>, DatastoreError>;
}
