// Client role: one-shot pull-then-push session against a remote peer.

use super::DB_PATH;
use crate::error::SyncError;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Step of a session, reported when it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStage {
    Fetch,
    LocalReplace,
    LocalRead,
    Push,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Fetch => "fetch",
            SyncStage::LocalReplace => "local replace",
            SyncStage::LocalRead => "local read",
            SyncStage::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    Completed {
        pulled_bytes: usize,
        pushed_bytes: usize,
        fingerprint: String,
    },
    /// Steps before `stage` already ran and are not rolled back
    Failed { stage: SyncStage, reason: String },
}

/// What a session did; failures are data here, not errors
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub session_id: Uuid,
    pub remote: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Completed { .. })
    }

    pub fn summary(&self) -> String {
        match &self.outcome {
            SyncOutcome::Completed {
                pulled_bytes,
                pushed_bytes,
                fingerprint,
            } => format!(
                "Sync with {} completed: pulled {} bytes, pushed {} bytes, store {}",
                self.remote,
                pulled_bytes,
                pushed_bytes,
                &fingerprint[..fingerprint.len().min(12)]
            ),
            SyncOutcome::Failed { stage, reason } => format!(
                "Sync with {} failed during {}: {}",
                self.remote, stage, reason
            ),
        }
    }
}

/// HTTP client for a remote peer's `/db` resource
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    remote: String,
    db_url: String,
}

impl SyncClient {
    /// `remote` is a base URL (`http://host:port`) or a bare `host:port`
    pub fn new(remote: &str, timeout: Duration) -> Result<Self, SyncError> {
        let remote = normalize_remote(remote);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(SyncClient {
            http,
            db_url: format!("{}{}", remote, DB_PATH),
            remote,
        })
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// FETCH: download the remote store, insisting on an exact length match
    pub async fn fetch(&self) -> Result<Snapshot, SyncError> {
        let response = self.http.get(&self.db_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transfer(format!("FETCH returned {}", status)));
        }

        let declared = response.content_length().ok_or_else(|| {
            SyncError::Transfer("FETCH response carried no Content-Length".to_string())
        })?;
        let body = response.bytes().await?;
        if body.len() as u64 != declared {
            return Err(SyncError::length_mismatch(declared, body.len()));
        }

        Ok(Snapshot::from_bytes(body.to_vec()))
    }

    /// REPLACE: overwrite the remote store with `snapshot`
    pub async fn push(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        let response = self
            .http
            .post(&self.db_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(snapshot.as_bytes().to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transfer(format!("REPLACE returned {}", status)));
        }
        Ok(())
    }

    /// Pull the remote store over `store_path`, then push it back.
    ///
    /// Whatever the local store held before the pull is discarded. A failure
    /// at any step ends the session; earlier steps are not undone.
    pub async fn run_session(&self, store_path: &Path) -> SyncReport {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("sync_session", %session_id, remote = %self.remote);

        let outcome = async {
            tracing::info!(store = ?store_path, "sync session started");
            match self.exchange(store_path).await {
                Ok(outcome) => {
                    tracing::info!(?outcome, "sync session completed");
                    outcome
                }
                Err((stage, e)) => {
                    tracing::warn!(%stage, error = %e, "sync session failed");
                    SyncOutcome::Failed {
                        stage,
                        reason: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await;

        SyncReport {
            session_id,
            remote: self.remote.clone(),
            started_at,
            finished_at: Utc::now(),
            outcome,
        }
    }

    async fn exchange(&self, store_path: &Path) -> Result<SyncOutcome, (SyncStage, SyncError)> {
        let pulled = self.fetch().await.map_err(|e| (SyncStage::Fetch, e))?;
        tracing::debug!(bytes = pulled.len(), fingerprint = %pulled.short_fingerprint(), "fetched remote store");

        pulled
            .replace_into(store_path)
            .await
            .map_err(|e| (SyncStage::LocalReplace, SyncError::from(e)))?;

        let local = Snapshot::load(store_path)
            .await
            .map_err(|e| (SyncStage::LocalRead, SyncError::from(e)))?;

        self.push(&local).await.map_err(|e| (SyncStage::Push, e))?;
        tracing::debug!(bytes = local.len(), "pushed local store");

        Ok(SyncOutcome::Completed {
            pulled_bytes: pulled.len(),
            pushed_bytes: local.len(),
            fingerprint: local.fingerprint(),
        })
    }
}

fn normalize_remote(remote: &str) -> String {
    let trimmed = remote.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}
