//! Core Datastore types: keys, cursors and key pages.
//!
//! [`Key`] mirrors the JSON shape used by the Datastore v1 REST API so that a
//! key returned by a query can be sent back verbatim in a delete mutation.

use serde::{Deserialize, Serialize};

/// Maximum number of keys a single non-transactional commit may delete.
pub const MAX_KEYS_PER_COMMIT: usize = 500;

/// Partition (project, database and namespace) a key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
}

/// One `(kind, name | id)` element of a key path.
///
/// Numeric ids are carried as strings, matching the REST encoding of int64.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Identifier of a single entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    #[serde(default)]
    pub partition_id: PartitionId,
    pub path: Vec<PathElement>,
}

impl Key {
    /// Build a root key with a string name.
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            partition_id: PartitionId::default(),
            path: vec![PathElement {
                kind: kind.into(),
                name: Some(name.into()),
                id: None,
            }],
        }
    }

    /// Build a root key with a numeric id.
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            partition_id: PartitionId::default(),
            path: vec![PathElement {
                kind: kind.into(),
                name: None,
                id: Some(id.to_string()),
            }],
        }
    }

    /// Kind of the entity (the kind of the last path element).
    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|e| e.kind.as_str())
    }

    pub fn in_partition(mut self, partition_id: PartitionId) -> Self {
        self.partition_id = partition_id;
        self
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for element in &self.path {
            if !first {
                write!(f, "/")?;
            }
            first = false;
            match (&element.name, &element.id) {
                (Some(name), _) => write!(f, "{}:{name}", element.kind)?,
                (None, Some(id)) => write!(f, "{}:{id}", element.kind)?,
                (None, None) => write!(f, "{}:<incomplete>", element.kind)?,
            }
        }
        Ok(())
    }
}

/// Opaque continuation token returned by a paged read.
///
/// Cursors can only be handed back to the store that produced them. They are
/// intentionally not comparable; end-of-collection is expressed as `None`.
#[derive(Clone)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cursor(<{} bytes>)", self.0.len())
    }
}

/// One page of a keys-only query.
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    pub keys: Vec<Key>,
    /// Continuation token for the next page; `None` once the kind is exhausted.
    pub next_cursor: Option<Cursor>,
}

impl KeyPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}
