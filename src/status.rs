//! Job status records.
//!
//! Every ingestion job moves through `queued → running → completed | error`.
//! [`FileStatusStore`] persists each transition as JSON in two places:
//!
//! ```text
//! <status_dir>/jobs/<job_id>.status.json     one file per job
//! <status_dir>/users/<user_id>.status.json   latest job for that user
//! ```
//!
//! Writes go to a temporary file that is then renamed over the target, so a
//! reader never sees a half-written record.
//!
//! A completed record looks like:
//!
//! ```json
//! {
//!   "status": "completed",
//!   "details": {
//!     "collection_name": "user_alice",
//!     "chunks_embedded": 4,
//!     "file_processed": "lease.pdf",
//!     "operation": "created"
//!   },
//!   "job_id": "…",
//!   "user_id": "alice",
//!   "updated_at": "2026-01-01T00:00:00Z"
//! }
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use lexctx_core::collection::validate_user_id;

use crate::config::Config;
use crate::error::{IngestFailure, PartialProgress};
use crate::ingest::JobResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Queued,
    Running,
    Completed,
    Error,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialProgress>,
    pub job_id: String,
    pub user_id: String,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    fn new(phase: JobPhase, job_id: &str, user_id: &str) -> Self {
        Self {
            status: phase,
            details: None,
            error: None,
            traceback: None,
            partial: None,
            job_id: job_id.to_string(),
            user_id: user_id.to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn queued(job_id: &str, user_id: &str) -> Self {
        Self::new(JobPhase::Queued, job_id, user_id)
    }

    pub fn running(job_id: &str, user_id: &str) -> Self {
        Self::new(JobPhase::Running, job_id, user_id)
    }

    pub fn completed(job_id: &str, user_id: &str, result: JobResult) -> Self {
        Self {
            details: Some(result),
            ..Self::new(JobPhase::Completed, job_id, user_id)
        }
    }

    pub fn failed(job_id: &str, user_id: &str, failure: &IngestFailure) -> Self {
        Self {
            error: Some(failure.to_string()),
            traceback: Some(failure.traceback()),
            partial: failure.partial,
            ..Self::new(JobPhase::Error, job_id, user_id)
        }
    }
}

/// Where job status records live.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Record `status` as the current state of its job and as the latest
    /// job of its user.
    async fn put(&self, status: &JobStatus) -> Result<()>;

    async fn get(&self, job_id: &str) -> Result<Option<JobStatus>>;

    async fn latest_for_user(&self, user_id: &str) -> Result<Option<JobStatus>>;
}

pub struct FileStatusStore {
    dir: PathBuf,
}

impl FileStatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn job_path(&self, job_id: &str) -> Result<PathBuf> {
        Uuid::parse_str(job_id).with_context(|| format!("invalid job id '{}'", job_id))?;
        Ok(self
            .dir
            .join("jobs")
            .join(format!("{}.status.json", job_id)))
    }

    fn user_path(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self
            .dir
            .join("users")
            .join(format!("{}.status.json", user_id)))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) => p,
        None => bail!("status path has no parent: {}", path.display()),
    };
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("failed to replace {}", path.display()));
    }
    Ok(())
}

async fn read_status(path: &Path) -> Result<Option<JobStatus>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let status = serde_json::from_slice(&bytes)
                .with_context(|| format!("malformed status file {}", path.display()))?;
            Ok(Some(status))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn put(&self, status: &JobStatus) -> Result<()> {
        let job_path = self.job_path(&status.job_id)?;
        let user_path = self.user_path(&status.user_id)?;
        let bytes = serde_json::to_vec_pretty(status)?;

        write_atomic(&job_path, &bytes).await?;
        write_atomic(&user_path, &bytes).await?;
        tracing::debug!(
            job_id = %status.job_id,
            user_id = %status.user_id,
            status = ?status.status,
            "status recorded"
        );
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobStatus>> {
        read_status(&self.job_path(job_id)?).await
    }

    async fn latest_for_user(&self, user_id: &str) -> Result<Option<JobStatus>> {
        read_status(&self.user_path(user_id)?).await
    }
}

/// `lexctx status`: print a job's status record as JSON.
pub async fn run_status(config: &Config, user: Option<&str>, job: Option<&str>) -> Result<()> {
    let store = FileStatusStore::new(&config.jobs.status_dir);
    let status = match (job, user) {
        (Some(job_id), _) => store.get(job_id).await?,
        (None, Some(user_id)) => store.latest_for_user(user_id).await?,
        (None, None) => bail!("either --user or --job is required"),
    };

    match status {
        Some(s) => println!("{}", serde_json::to_string_pretty(&s)?),
        None => bail!("no status recorded"),
    }
    Ok(())
}
