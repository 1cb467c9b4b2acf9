//! Datastore v1 REST client.
//!
//! Uses two endpoints:
//! - `POST {endpoint}/v1/projects/{project}:runQuery` with a `__key__`
//!   projection for keys-only scans
//! - `POST {endpoint}/v1/projects/{project}:commit` in `NON_TRANSACTIONAL`
//!   mode with `delete` mutations
//!
//! Setting `DATASTORE_EMULATOR_HOST` points the factory at a local emulator.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::client::{ClientFactory, Credentials, DatasetId, DatastoreClient};
use crate::error::DatastoreError;
use crate::types::{Cursor, Key, KeyPage, MAX_KEYS_PER_COMMIT};

/// Public Datastore endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://datastore.googleapis.com";

/// Environment variable honoured by Google client libraries for the emulator.
pub const EMULATOR_HOST_ENV: &str = "DATASTORE_EMULATOR_HOST";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates [`RestDatastoreClient`]s sharing one HTTP connection pool.
#[derive(Clone)]
pub struct RestClientFactory {
    endpoint: String,
    http: Client,
}

impl RestClientFactory {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, DatastoreError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Use the emulator when `DATASTORE_EMULATOR_HOST` is set, otherwise the
    /// public endpoint.
    pub fn from_env() -> Result<Self, DatastoreError> {
        match std::env::var(EMULATOR_HOST_ENV) {
            Ok(host) if !host.trim().is_empty() => {
                tracing::info!("Using Datastore emulator at {host}");
                Self::new(emulator_endpoint(&host))
            }
            _ => Self::new(DEFAULT_ENDPOINT),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn emulator_endpoint(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

impl ClientFactory for RestClientFactory {
    fn create_client(
        &self,
        dataset: &DatasetId,
        credentials: &Credentials,
    ) -> Result<Box<dyn DatastoreClient>, DatastoreError> {
        if dataset.project_id.trim().is_empty() {
            return Err(DatastoreError::Config("project id is empty".to_string()));
        }
        Ok(Box::new(RestDatastoreClient {
            http: self.http.clone(),
            base_url: format!("{}/v1/projects/{}", self.endpoint, dataset.project_id),
            dataset: dataset.clone(),
            bearer: credentials.bearer_token().map(str::to_string),
        }))
    }
}

/// Client bound to one dataset and one set of credentials.
pub struct RestDatastoreClient {
    http: Client,
    base_url: String,
    dataset: DatasetId,
    bearer: Option<String>,
}

impl RestDatastoreClient {
    async fn post(&self, method: &str, body: &Value) -> Result<Value, DatastoreError> {
        let url = format!("{}:{method}", self.base_url);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!("{method} returned {status}: {text}");
            return Err(DatastoreError::from_status(
                status.as_u16(),
                error_message(&text),
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DatastoreClient for RestDatastoreClient {
    async fn fetch_keys(
        &self,
        kind: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<KeyPage, DatastoreError> {
        let body = run_query_body(&self.dataset, kind, cursor, limit);
        let response = self.post("runQuery", &body).await?;
        parse_run_query_response(response)
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<(), DatastoreError> {
        if keys.len() > MAX_KEYS_PER_COMMIT {
            return Err(DatastoreError::BatchTooLarge {
                len: keys.len(),
                limit: MAX_KEYS_PER_COMMIT,
            });
        }
        if keys.is_empty() {
            return Ok(());
        }
        let body = commit_body(&self.dataset, keys);
        self.post("commit", &body).await?;
        Ok(())
    }
}

/// Build a keys-only `runQuery` request body.
pub fn run_query_body(
    dataset: &DatasetId,
    kind: &str,
    cursor: Option<&Cursor>,
    limit: usize,
) -> Value {
    let mut query = json!({
        "kind": [{ "name": kind }],
        "projection": [{ "property": { "name": "__key__" } }],
        "limit": limit,
    });
    if let Some(cursor) = cursor {
        query["startCursor"] = Value::String(cursor.as_token().to_string());
    }

    let mut partition = json!({ "projectId": dataset.project_id });
    let mut body = json!({ "query": query });
    if let Some(db) = &dataset.database_id {
        partition["databaseId"] = Value::String(db.clone());
        body["databaseId"] = Value::String(db.clone());
    }
    body["partitionId"] = partition;
    body
}

/// Build a non-transactional `commit` body deleting `keys`.
pub fn commit_body(dataset: &DatasetId, keys: &[Key]) -> Value {
    let mutations: Vec<Value> = keys.iter().map(|k| json!({ "delete": k })).collect();
    let mut body = json!({
        "mode": "NON_TRANSACTIONAL",
        "mutations": mutations,
    });
    if let Some(db) = &dataset.database_id {
        body["databaseId"] = Value::String(db.clone());
    }
    body
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryResponse {
    batch: QueryResultBatch,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultBatch {
    #[serde(default)]
    entity_results: Vec<EntityResult>,
    #[serde(default)]
    end_cursor: Option<String>,
    #[serde(default)]
    more_results: Option<String>,
}

#[derive(Deserialize)]
struct EntityResult {
    entity: KeyOnlyEntity,
}

#[derive(Deserialize)]
struct KeyOnlyEntity {
    key: Key,
}

/// Decode a `runQuery` response into a [`KeyPage`].
///
/// `moreResults == NO_MORE_RESULTS` (or a missing end cursor) ends the scan;
/// any other value continues from `endCursor`.
pub fn parse_run_query_response(response: Value) -> Result<KeyPage, DatastoreError> {
    let response: RunQueryResponse = serde_json::from_value(response)?;
    let batch = response.batch;

    let keys = batch
        .entity_results
        .into_iter()
        .map(|r| r.entity.key)
        .collect();

    let finished = matches!(batch.more_results.as_deref(), Some("NO_MORE_RESULTS"));
    let next_cursor = if finished {
        None
    } else {
        batch.end_cursor.map(Cursor::new)
    };

    Ok(KeyPage { keys, next_cursor })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_query_body_first_page() {
        let body = run_query_body(&DatasetId::new("proj"), "usertable", None, 12000);
        assert_eq!(body["partitionId"]["projectId"], "proj");
        assert_eq!(body["query"]["kind"][0]["name"], "usertable");
        assert_eq!(body["query"]["projection"][0]["property"]["name"], "__key__");
        assert_eq!(body["query"]["limit"], 12000);
        assert!(body["query"].get("startCursor").is_none());
        assert!(body.get("databaseId").is_none());
    }

    #[test]
    fn test_run_query_body_with_cursor_and_database() {
        let dataset = DatasetId::new("proj").with_database("ycsb");
        let cursor = Cursor::new("CkQSPmo");
        let body = run_query_body(&dataset, "usertable", Some(&cursor), 500);
        assert_eq!(body["query"]["startCursor"], "CkQSPmo");
        assert_eq!(body["databaseId"], "ycsb");
        assert_eq!(body["partitionId"]["databaseId"], "ycsb");
    }

    #[test]
    fn test_commit_body() {
        let keys = vec![Key::named("usertable", "a"), Key::with_id("usertable", 2)];
        let body = commit_body(&DatasetId::new("proj"), &keys);
        assert_eq!(body["mode"], "NON_TRANSACTIONAL");
        let mutations = body["mutations"].as_array().unwrap();
        assert_eq!(mutations.len(), 2);
        assert_eq!(mutations[0]["delete"]["path"][0]["name"], "a");
        assert_eq!(mutations[1]["delete"]["path"][0]["id"], "2");
    }

    #[test]
    fn test_parse_response_with_more_results() {
        let response = json!({
            "batch": {
                "entityResultType": "KEY_ONLY",
                "entityResults": [
                    {"entity": {"key": {"partitionId": {"projectId": "proj"}, "path": [{"kind": "usertable", "name": "user1"}]}}},
                    {"entity": {"key": {"partitionId": {"projectId": "proj"}, "path": [{"kind": "usertable", "name": "user2"}]}}}
                ],
                "endCursor": "CURSOR2",
                "moreResults": "MORE_RESULTS_AFTER_LIMIT"
            }
        });
        let page = parse_run_query_response(response).unwrap();
        assert_eq!(page.keys.len(), 2);
        assert_eq!(page.keys[1].path[0].name.as_deref(), Some("user2"));
        assert_eq!(page.next_cursor.unwrap().as_token(), "CURSOR2");
    }

    #[test]
    fn test_parse_response_last_page() {
        let response = json!({
            "batch": {
                "endCursor": "CURSOR3",
                "moreResults": "NO_MORE_RESULTS"
            }
        });
        let page = parse_run_query_response(response).unwrap();
        assert!(page.keys.is_empty());
        assert!(page.is_last());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":400,"message":"bad projection","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "bad projection");
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }

    #[test]
    fn test_emulator_endpoint() {
        assert_eq!(emulator_endpoint("localhost:8081"), "http://localhost:8081");
        assert_eq!(emulator_endpoint("https://emu:443"), "https://emu:443");
    }

    #[test]
    fn test_factory_rejects_empty_project() {
        let factory = RestClientFactory::new(DEFAULT_ENDPOINT).unwrap();
        let result = factory.create_client(&DatasetId::new(""), &Credentials::Anonymous);
        assert!(matches!(result, Err(DatastoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_multi_rejects_oversized_batch() {
        let factory = RestClientFactory::new("http://127.0.0.1:9").unwrap();
        let client = factory
            .create_client(&DatasetId::new("proj"), &Credentials::Anonymous)
            .unwrap();
        let keys: Vec<Key> = (0..501).map(|i| Key::with_id("usertable", i)).collect();
        let err = client.delete_multi(&keys).await.unwrap_err();
        assert!(matches!(
            err,
            DatastoreError::BatchTooLarge {
                len: 501,
                limit: 500
            }
        ));
    }
}
