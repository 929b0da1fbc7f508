//! Asynchronous ingestion jobs.
//!
//! [`JobQueue`] is the seam between callers that accept uploads and the
//! workers that ingest them. [`LocalJobQueue`] implements it in-process with
//! a bounded channel and a fixed pool of tokio workers; a broker-backed queue
//! can implement the same trait.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use lexctx_core::collection::validate_user_id;

use crate::config::{Config, JobsConfig};
use crate::ingest::{IngestSettings, Ingestor, JobResult};
use crate::services::Services;
use crate::status::{FileStatusStore, JobPhase, JobStatus, StatusStore};

pub type JobId = String;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub path: PathBuf,
    pub user_id: String,
}

/// A job's state as seen by a poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobState {
    pub state: JobPhase,
    /// True once the job reached a terminal state.
    pub ready: bool,
    /// `None` until ready.
    pub successful: Option<bool>,
    pub result: Option<JobResult>,
    /// Why the job failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobStatus> for JobState {
    fn from(status: JobStatus) -> Self {
        let ready = status.status.is_terminal();
        Self {
            state: status.status,
            ready,
            successful: ready.then_some(status.status == JobPhase::Completed),
            result: status.details,
            error: status.error,
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn submit(&self, request: IngestRequest) -> Result<JobId>;

    async fn get_status(&self, job_id: &str) -> Result<Option<JobState>>;
}

struct Job {
    id: JobId,
    request: IngestRequest,
}

pub struct LocalJobQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    status: Arc<dyn StatusStore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalJobQueue {
    /// Spawn `config.workers` workers sharing one bounded channel.
    pub fn start(
        ingestor: Arc<Ingestor>,
        status: Arc<dyn StatusStore>,
        config: &JobsConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let ingestor = Arc::clone(&ingestor);
                let status = Arc::clone(&status);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };
                        tracing::info!(worker, job_id = %job.id, user_id = %job.request.user_id, "job started");
                        let outcome = ingestor
                            .run_job(
                                &job.id,
                                &job.request.path,
                                &job.request.user_id,
                                status.as_ref(),
                            )
                            .await;
                        tracing::info!(worker, job_id = %job.id, status = ?outcome.status, "job finished");
                    }
                    tracing::debug!(worker, "worker stopped");
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(tx)),
            status,
            workers: Mutex::new(workers),
        }
    }

    /// Stop accepting jobs, let the workers drain the queue, and wait for
    /// them to exit.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "job worker panicked");
            }
        }
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn submit(&self, request: IngestRequest) -> Result<JobId> {
        validate_user_id(&request.user_id)?;
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("job queue is shut down"))?;

        let id = Uuid::new_v4().to_string();
        self.status
            .put(&JobStatus::queued(&id, &request.user_id))
            .await?;
        sender
            .send(Job {
                id: id.clone(),
                request,
            })
            .await
            .map_err(|_| anyhow!("job queue is shut down"))?;
        tracing::debug!(job_id = %id, "job queued");
        Ok(id)
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<JobState>> {
        Ok(self.status.get(job_id).await?.map(JobState::from))
    }
}

/// `lexctx ingest <file> --user <id> [--wait]`.
pub async fn run_ingest(config: &Config, path: &Path, user_id: &str, wait: bool) -> Result<()> {
    let services = Services::from_config(config).await?;
    let ingestor = Arc::new(Ingestor::new(
        services.store.clone(),
        services.embedder.clone(),
        IngestSettings::from_config(config)?,
    ));
    let status: Arc<dyn StatusStore> = Arc::new(FileStatusStore::new(&config.jobs.status_dir));
    let queue = LocalJobQueue::start(ingestor, Arc::clone(&status), &config.jobs);

    let job_id = queue
        .submit(IngestRequest {
            path: path.to_path_buf(),
            user_id: user_id.to_string(),
        })
        .await?;
    println!("job {}", job_id);

    if wait {
        let mut last = None;
        loop {
            if let Some(state) = queue.get_status(&job_id).await? {
                if last != Some(state.state) {
                    eprintln!("  {:?}", state.state);
                    last = Some(state.state);
                }
                if state.ready {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    // A local queue lives only as long as this process.
    queue.shutdown().await;

    if let Some(final_status) = status.get(&job_id).await? {
        println!("{}", serde_json::to_string_pretty(&final_status)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexctx_core::embedding::Embedder;
    use lexctx_core::store::memory::InMemoryStore;
    use lexctx_core::store::VectorStore;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn queue_in(tmp: &TempDir, store: Arc<InMemoryStore>) -> LocalJobQueue {
        let ingestor = Arc::new(Ingestor::new(
            store,
            Arc::new(LengthEmbedder),
            IngestSettings::default(),
        ));
        let status: Arc<dyn StatusStore> =
            Arc::new(FileStatusStore::new(tmp.path().join("status")));
        LocalJobQueue::start(ingestor, status, &JobsConfig::default())
    }

    #[tokio::test]
    async fn submitted_jobs_complete_after_shutdown_drains() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let queue = queue_in(&tmp, store.clone());

        let mut ids = Vec::new();
        for user in ["alice", "bob", "carol"] {
            let path = tmp.path().join(format!("{}.txt", user));
            std::fs::write(&path, format!("Lease terms for {}.", user)).unwrap();
            ids.push(
                queue
                    .submit(IngestRequest {
                        path,
                        user_id: user.to_string(),
                    })
                    .await
                    .unwrap(),
            );
        }
        queue.shutdown().await;

        for id in &ids {
            let state = queue.get_status(id).await.unwrap().unwrap();
            assert!(state.ready);
            assert_eq!(state.successful, Some(true));
            assert_eq!(state.result.unwrap().chunks_embedded, 1);
        }
        assert_eq!(store.count("user_bob").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_job_is_ready_but_unsuccessful() {
        let tmp = TempDir::new().unwrap();
        let queue = queue_in(&tmp, Arc::new(InMemoryStore::new()));
        let path = tmp.path().join("sheet.xlsx");
        std::fs::write(&path, "x").unwrap();

        let id = queue
            .submit(IngestRequest {
                path,
                user_id: "alice".into(),
            })
            .await
            .unwrap();
        queue.shutdown().await;

        let state = queue.get_status(&id).await.unwrap().unwrap();
        assert_eq!(state.state, JobPhase::Error);
        assert_eq!(state.successful, Some(false));
        assert!(state.result.is_none());
        assert_eq!(
            state.error.as_deref(),
            Some("unsupported file type 'xlsx' (expected pdf, csv, txt, doc or docx)")
        );
    }

    #[tokio::test]
    async fn submit_rejects_bad_user_and_closed_queue() {
        let tmp = TempDir::new().unwrap();
        let queue = queue_in(&tmp, Arc::new(InMemoryStore::new()));
        let bad = queue
            .submit(IngestRequest {
                path: tmp.path().join("a.txt"),
                user_id: "a/b".into(),
            })
            .await;
        assert!(bad.is_err());

        queue.shutdown().await;
        let closed = queue
            .submit(IngestRequest {
                path: tmp.path().join("a.txt"),
                user_id: "alice".into(),
            })
            .await;
        assert!(closed.is_err());
    }

    #[test]
    fn queued_state_is_not_ready() {
        let state = JobState::from(JobStatus::queued("id", "alice"));
        assert!(!state.ready);
        assert_eq!(state.successful, None);
        assert!(state.error.is_none());
    }
}
