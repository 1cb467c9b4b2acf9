//! In-memory Datastore for tests and dry runs.
//!
//! Keys are kept per kind in ordered sets. Cursors encode the last key of a
//! page, so deleting keys while a scan is in progress never shifts later
//! pages (the same property Datastore cursors have).
//!
//! A few fault-injection knobs let tests reproduce store behaviour that is
//! hard to trigger against a real backend:
//! - [`MemoryDatastore::hide_from_first_scans`] keeps keys out of the first
//!   scans of a kind, like a write that is not yet visible to queries
//! - [`MemoryDatastore::fail_deletes_of`] makes any commit touching a key fail
//! - [`MemoryDatastore::with_strict_deletes`] reports not-found for missing keys

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::{ClientFactory, Credentials, DatasetId, DatastoreClient};
use crate::error::DatastoreError;
use crate::types::{Cursor, Key, KeyPage, MAX_KEYS_PER_COMMIT};

#[derive(Default)]
struct Inner {
    kinds: BTreeMap<String, BTreeSet<Key>>,
    strict_deletes: bool,
    max_delete_batch: Option<usize>,
    hidden: BTreeSet<Key>,
    hidden_scans: usize,
    scans_started: BTreeMap<String, usize>,
    failing: BTreeSet<Key>,
    delete_calls: Vec<Vec<Key>>,
    fetch_calls: usize,
    clients_created: usize,
}

/// Shared in-memory store. Clones refer to the same data.
#[derive(Clone)]
pub struct MemoryDatastore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatastore {
    pub fn new() -> Self {
        let inner = Inner {
            max_delete_batch: Some(MAX_KEYS_PER_COMMIT),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain collections behind, which
        // are still consistent enough for a test double.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Report [`DatastoreError::NotFound`] when a delete names a missing key.
    pub fn with_strict_deletes(self) -> Self {
        self.lock().strict_deletes = true;
        self
    }

    /// Override the per-commit key limit (`None` disables the check).
    pub fn with_max_delete_batch(self, limit: Option<usize>) -> Self {
        self.lock().max_delete_batch = limit;
        self
    }

    pub fn insert(&self, key: Key) {
        let kind = key.kind().unwrap_or_default().to_string();
        self.lock().kinds.entry(kind).or_default().insert(key);
    }

    /// Insert `count` named keys (`{kind}{index}`) into `kind`.
    pub fn populate(&self, kind: &str, count: usize) -> Vec<Key> {
        let keys: Vec<Key> = (0..count)
            .map(|i| Key::named(kind, format!("{kind}{i:08}")))
            .collect();
        let mut inner = self.lock();
        let set = inner.kinds.entry(kind.to_string()).or_default();
        set.extend(keys.iter().cloned());
        keys
    }

    /// Keep `keys` out of the first `scans` scans of their kind.
    pub fn hide_from_first_scans(&self, keys: impl IntoIterator<Item = Key>, scans: usize) {
        let mut inner = self.lock();
        inner.hidden.extend(keys);
        inner.hidden_scans = scans;
    }

    /// Fail every commit that includes one of `keys`.
    pub fn fail_deletes_of(&self, keys: impl IntoIterator<Item = Key>) {
        self.lock().failing.extend(keys);
    }

    pub fn count(&self, kind: &str) -> usize {
        self.lock().kinds.get(kind).map(|s| s.len()).unwrap_or(0)
    }

    pub fn keys(&self, kind: &str) -> Vec<Key> {
        self.lock()
            .kinds
            .get(kind)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every key batch passed to `delete_multi`, in call order.
    pub fn delete_calls(&self) -> Vec<Vec<Key>> {
        self.lock().delete_calls.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    pub fn clients_created(&self) -> usize {
        self.lock().clients_created
    }

    fn fetch(
        &self,
        kind: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<KeyPage, DatastoreError> {
        let start = match cursor {
            Some(c) => Some(serde_json::from_str::<Key>(c.as_token())?),
            None => None,
        };

        let mut inner = self.lock();
        inner.fetch_calls += 1;
        if start.is_none() {
            *inner.scans_started.entry(kind.to_string()).or_insert(0) += 1;
        }
        let scan_number = inner.scans_started.get(kind).copied().unwrap_or(0);
        let hide = scan_number <= inner.hidden_scans;

        let Some(set) = inner.kinds.get(kind) else {
            return Ok(KeyPage::default());
        };

        let lower = match &start {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let keys: Vec<Key> = set
            .range((lower, Bound::Unbounded))
            .filter(|k| !(hide && inner.hidden.contains(*k)))
            .take(limit)
            .cloned()
            .collect();

        let next_cursor = match keys.last() {
            Some(last) if keys.len() == limit => Some(Cursor::new(serde_json::to_string(last)?)),
            _ => None,
        };
        Ok(KeyPage { keys, next_cursor })
    }

    fn delete(&self, keys: &[Key]) -> Result<(), DatastoreError> {
        let mut inner = self.lock();
        inner.delete_calls.push(keys.to_vec());

        if let Some(limit) = inner.max_delete_batch {
            if keys.len() > limit {
                return Err(DatastoreError::BatchTooLarge {
                    len: keys.len(),
                    limit,
                });
            }
        }
        if let Some(bad) = keys.iter().find(|k| inner.failing.contains(*k)) {
            return Err(DatastoreError::Rejected {
                status: 500,
                message: format!("injected delete failure for {bad}"),
            });
        }

        let mut missing = Vec::new();
        for key in keys {
            let kind = key.kind().unwrap_or_default();
            let removed = inner
                .kinds
                .get_mut(kind)
                .map(|set| set.remove(key))
                .unwrap_or(false);
            if !removed {
                missing.push(key.to_string());
            }
        }

        if inner.strict_deletes && !missing.is_empty() {
            return Err(DatastoreError::NotFound(missing.join(", ")));
        }
        Ok(())
    }
}

/// Client handle over a [`MemoryDatastore`].
pub struct MemoryClient {
    store: MemoryDatastore,
}

#[async_trait]
impl DatastoreClient for MemoryClient {
    async fn fetch_keys(
        &self,
        kind: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<KeyPage, DatastoreError> {
        self.store.fetch(kind, cursor, limit)
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<(), DatastoreError> {
        self.store.delete(keys)
    }
}

impl ClientFactory for MemoryDatastore {
    fn create_client(
        &self,
        _dataset: &DatasetId,
        _credentials: &Credentials,
    ) -> Result<Box<dyn DatastoreClient>, DatastoreError> {
        self.lock().clients_created += 1;
        Ok(Box::new(MemoryClient {
            store: self.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(store: &MemoryDatastore) -> Box<dyn DatastoreClient> {
        store
            .create_client(&DatasetId::new("test"), &Credentials::Anonymous)
            .unwrap()
    }

    #[tokio::test]
    async fn test_paging_through_kind() {
        let store = MemoryDatastore::new();
        store.populate("usertable", 5);
        let client = client(&store);

        let first = client.fetch_keys("usertable", None, 2).await.unwrap();
        assert_eq!(first.keys.len(), 2);
        let second = client
            .fetch_keys("usertable", first.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(second.keys.len(), 2);
        let third = client
            .fetch_keys("usertable", second.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(third.keys.len(), 1);
        assert!(third.is_last());

        let mut all = first.keys;
        all.extend(second.keys);
        all.extend(third.keys);
        assert_eq!(all, store.keys("usertable"));
    }

    #[tokio::test]
    async fn test_exact_page_yields_trailing_empty_page() {
        let store = MemoryDatastore::new();
        store.populate("usertable", 4);
        let client = client(&store);

        let first = client.fetch_keys("usertable", None, 4).await.unwrap();
        assert!(!first.is_last());
        let second = client
            .fetch_keys("usertable", first.next_cursor.as_ref(), 4)
            .await
            .unwrap();
        assert!(second.keys.is_empty());
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_cursor_survives_concurrent_deletes() {
        let store = MemoryDatastore::new();
        let keys = store.populate("usertable", 6);
        let client = client(&store);

        let first = client.fetch_keys("usertable", None, 3).await.unwrap();
        client.delete_multi(&first.keys).await.unwrap();
        let second = client
            .fetch_keys("usertable", first.next_cursor.as_ref(), 3)
            .await
            .unwrap();
        assert_eq!(second.keys, keys[3..].to_vec());
    }

    #[tokio::test]
    async fn test_hidden_keys_appear_on_later_scan() {
        let store = MemoryDatastore::new();
        let keys = store.populate("usertable", 3);
        store.hide_from_first_scans(vec![keys[1].clone()], 1);
        let client = client(&store);

        let first = client.fetch_keys("usertable", None, 10).await.unwrap();
        assert_eq!(first.keys, vec![keys[0].clone(), keys[2].clone()]);
        let second = client.fetch_keys("usertable", None, 10).await.unwrap();
        assert_eq!(second.keys, keys);
    }

    #[tokio::test]
    async fn test_delete_limits_and_failures() {
        let store = MemoryDatastore::new().with_strict_deletes();
        let keys = store.populate("usertable", 3);
        store.fail_deletes_of(vec![keys[2].clone()]);
        let client = client(&store);

        client.delete_multi(&keys[..1]).await.unwrap();
        let err = client.delete_multi(&keys[..1]).await.unwrap_err();
        assert!(err.is_not_found());

        let err = client.delete_multi(&keys[1..]).await.unwrap_err();
        assert!(matches!(err, DatastoreError::Rejected { status: 500, .. }));
        assert_eq!(store.count("usertable"), 2);

        let many: Vec<Key> = (0..501).map(|i| Key::with_id("usertable", i)).collect();
        let err = client.delete_multi(&many).await.unwrap_err();
        assert!(matches!(err, DatastoreError::BatchTooLarge { len: 501, .. }));
        assert_eq!(store.delete_calls().len(), 4);
    }

    #[test]
    fn test_unknown_kind_is_empty() {
        let store = MemoryDatastore::new();
        let client = client(&store);
        let page = tokio_test::block_on(client.fetch_keys("missing", None, 10)).unwrap();
        assert!(page.keys.is_empty());
        assert!(page.is_last());
        assert_eq!(store.clients_created(), 1);
        assert_eq!(store.fetch_calls(), 1);
    }
}
