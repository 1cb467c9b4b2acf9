//! Cursor-driven keys-only traversal of a kind.

use datastore_client::{Cursor, DatastoreClient, DatastoreError, Key, KeyPage};

/// Walks a kind page by page using opaque cursors.
///
/// The scanner never retries: a failed fetch is returned to the caller, and
/// keys from earlier pages are the caller's to keep.
pub struct PaginatedKeyScanner<'a> {
    client: &'a dyn DatastoreClient,
    kind: String,
    page_size: usize,
    cursor: Option<Cursor>,
    finished: bool,
    pages_read: u64,
}

impl<'a> PaginatedKeyScanner<'a> {
    pub fn new(client: &'a dyn DatastoreClient, kind: impl Into<String>, page_size: usize) -> Self {
        Self {
            client,
            kind: kind.into(),
            page_size,
            cursor: None,
            finished: false,
            pages_read: 0,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// Single stateless page fetch.
    pub async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<KeyPage, DatastoreError> {
        self.client.fetch_keys(&self.kind, cursor, page_size).await
    }

    /// Fetch the next page. Returns `Ok(None)` once the kind is exhausted.
    ///
    /// The returned page may be empty even when more pages follow.
    pub async fn next_page(&mut self) -> Result<Option<KeyPage>, DatastoreError> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .client
            .fetch_keys(&self.kind, self.cursor.as_ref(), self.page_size)
            .await?;
        self.pages_read += 1;
        self.cursor = page.next_cursor.clone();
        self.finished = page.next_cursor.is_none();

        tracing::trace!(
            "Fetched page {} of '{}' with {} keys",
            self.pages_read,
            self.kind,
            page.keys.len()
        );
        Ok(Some(page))
    }

    /// Keep reading until `limit` keys are collected or the kind is exhausted.
    pub async fn collect_up_to(&mut self, limit: usize) -> Result<Vec<Key>, DatastoreError> {
        let mut keys = Vec::new();
        while keys.len() < limit && !self.finished {
            let remaining = limit - keys.len();
            let page = self
                .client
                .fetch_keys(&self.kind, self.cursor.as_ref(), remaining.min(self.page_size))
                .await?;
            self.pages_read += 1;
            self.cursor = page.next_cursor.clone();
            self.finished = page.next_cursor.is_none();
            keys.extend(page.keys);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastore_client::{ClientFactory, Credentials, DatasetId, MemoryDatastore};

    fn client(store: &MemoryDatastore) -> Box<dyn DatastoreClient> {
        store
            .create_client(&DatasetId::new("test"), &Credentials::Anonymous)
            .unwrap()
    }

    #[tokio::test]
    async fn test_next_page_until_exhausted() {
        let store = MemoryDatastore::new();
        store.populate("usertable", 25);
        let client = client(&store);
        let mut scanner = PaginatedKeyScanner::new(client.as_ref(), "usertable", 10);

        let mut total = 0;
        while let Some(page) = scanner.next_page().await.unwrap() {
            total += page.keys.len();
        }
        assert_eq!(total, 25);
        assert_eq!(scanner.pages_read(), 3);
        assert!(scanner.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_kind_yields_single_empty_page() {
        let store = MemoryDatastore::new();
        let client = client(&store);
        let mut scanner = PaginatedKeyScanner::new(client.as_ref(), "usertable", 10);

        let page = scanner.next_page().await.unwrap().unwrap();
        assert!(page.keys.is_empty());
        assert!(scanner.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collect_up_to_respects_limit() {
        let store = MemoryDatastore::new();
        store.populate("usertable", 30);
        let client = client(&store);

        let mut scanner = PaginatedKeyScanner::new(client.as_ref(), "usertable", 8);
        let keys = scanner.collect_up_to(20).await.unwrap();
        assert_eq!(keys.len(), 20);
        assert_eq!(keys, store.keys("usertable")[..20].to_vec());

        let mut scanner = PaginatedKeyScanner::new(client.as_ref(), "usertable", 8);
        let keys = scanner.collect_up_to(100).await.unwrap();
        assert_eq!(keys.len(), 30);
    }

    #[tokio::test]
    async fn test_fetch_page_is_stateless() {
        let store = MemoryDatastore::new();
        store.populate("usertable", 3);
        let client = client(&store);
        let scanner = PaginatedKeyScanner::new(client.as_ref(), "usertable", 10);

        let first = scanner.fetch_page(None, 2).await.unwrap();
        let again = scanner.fetch_page(None, 2).await.unwrap();
        assert_eq!(first.keys, again.keys);
        assert_eq!(scanner.pages_read(), 0);
    }
}
