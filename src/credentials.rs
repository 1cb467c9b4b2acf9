//! Credential resolution for Datastore access.
//!
//! Resolution order:
//! 1. `--access-token` / `GOOGLE_OAUTH_ACCESS_TOKEN`
//! 2. `--keyfile`: the service account key is validated and an access token
//!    is minted with `gcloud auth application-default print-access-token`
//! 3. no authentication for the in-memory store, an explicit endpoint or
//!    `DATASTORE_EMULATOR_HOST`
//!
//! Otherwise there are no credentials and bulk deletion is skipped.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use datastore_client::Credentials;

use crate::DatastoreOpts;

/// The fields of a service account JSON key this tool reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: Option<String>,
    pub client_email: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read key file")?;
        let key: ServiceAccountKey =
            serde_json::from_str(&content).context("Key file is not a service account JSON key")?;
        if key.key_type != "service_account" {
            anyhow::bail!(
                "Key file has type '{}', expected 'service_account'",
                key.key_type
            );
        }
        Ok(key)
    }
}

/// Credentials plus the key they were minted from, if any.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub credentials: Credentials,
    pub key: Option<ServiceAccountKey>,
}

impl ResolvedCredentials {
    pub fn key_project(&self) -> Option<&str> {
        self.key.as_ref().and_then(|k| k.project_id.as_deref())
    }
}

/// Local path of the configured key file. Remote (`gs://`) key files are
/// not supported.
pub fn keyfile_path(keyfile: &str) -> anyhow::Result<PathBuf> {
    if keyfile.starts_with("gs://") {
        anyhow::bail!("Key files in Cloud Storage are not supported; copy the key file locally");
    }
    if keyfile.trim().is_empty() {
        anyhow::bail!("--keyfile is empty");
    }
    Ok(PathBuf::from(keyfile))
}

/// Short, log-safe form of a token.
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    if token.chars().count() <= 8 {
        "***".to_string()
    } else {
        format!("{prefix}***")
    }
}

pub async fn resolve_credentials(
    opts: &DatastoreOpts,
) -> anyhow::Result<Option<ResolvedCredentials>> {
    if let Some(token) = opts.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
        tracing::info!("Using access token {}", mask_token(token));
        return Ok(Some(ResolvedCredentials {
            credentials: Credentials::AccessToken(token.trim().to_string()),
            key: None,
        }));
    }

    if let Some(keyfile) = &opts.keyfile {
        let path = keyfile_path(keyfile)?;
        let key = ServiceAccountKey::from_file(&path)?;
        tracing::info!("Using service account {}", key.client_email);
        let token = mint_access_token(&opts.gcloud_binary, &path).await?;
        tracing::debug!("Minted access token {}", mask_token(&token));
        return Ok(Some(ResolvedCredentials {
            credentials: Credentials::AccessToken(token),
            key: Some(key),
        }));
    }

    let emulator = std::env::var(datastore_client::rest::EMULATOR_HOST_ENV)
        .map(|host| !host.trim().is_empty())
        .unwrap_or(false);
    if opts.in_memory || opts.endpoint.is_some() || emulator {
        return Ok(Some(ResolvedCredentials {
            credentials: Credentials::Anonymous,
            key: None,
        }));
    }

    Ok(None)
}

/// Ask gcloud for an access token on behalf of the key file.
pub async fn mint_access_token(gcloud: &Path, keyfile: &Path) -> anyhow::Result<String> {
    let output = Command::new(gcloud)
        .args(["auth", "application-default", "print-access-token"])
        .env(ycsb_executor::CREDENTIALS_ENV, keyfile)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to run {gcloud:?}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "{gcloud:?} failed to mint an access token ({}): {}",
            output.status,
            stderr.trim()
        );
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        anyhow::bail!("{gcloud:?} returned an empty access token");
    }
    Ok(token)
}
