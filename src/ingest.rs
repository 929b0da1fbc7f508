//! Ingestion pipeline orchestration.
//!
//! Turns one uploaded file into durable records in a collection:
//!
//! 1. load + clean ([`crate::loader`]) on the blocking pool
//! 2. chunk ([`lexctx_core::chunk`])
//! 3. `ensure_collection`
//! 4. embed + upsert in fixed-size batches, each call bounded by a timeout
//! 5. report a [`JobResult`]
//!
//! Each step is a hard gate. Batches committed before a failure stay in the
//! store and are reported through [`PartialProgress`]. Re-running the same
//! file is safe: record ids are deterministic, so upserts replace rather
//! than duplicate.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lexctx_core::chunk::{chunk_units, ChunkOutcome, ChunkParams};
use lexctx_core::collection::user_collection;
use lexctx_core::embedding::Embedder;
use lexctx_core::models::{DocumentRef, EmbeddingRecord};
use lexctx_core::store::VectorStore;

use crate::config::Config;
use crate::error::{IngestError, IngestFailure, PartialProgress};
use crate::loader::{load_document, LoadOutcome};
use crate::services::Services;
use crate::status::{JobStatus, StatusStore};

/// Whether ingestion created the target collection or added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Created,
    Updated,
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub collection_name: String,
    pub chunks_embedded: usize,
    pub file_processed: String,
    pub operation: Operation,
}

/// Tunables for [`Ingestor`].
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub chunk: ChunkParams,
    pub batch_size: usize,
    pub call_timeout: Duration,
    pub max_file_bytes: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk: ChunkParams::default(),
            batch_size: 32,
            call_timeout: Duration::from_secs(120),
            max_file_bytes: 50 * 1024 * 1024,
        }
    }
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            chunk: config.chunking.params()?,
            batch_size: config.ingest.batch_size,
            call_timeout: config.ingest.call_timeout(),
            max_file_bytes: config.ingest.max_file_bytes,
        })
    }
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            settings,
        }
    }

    /// Ingest `path` into `user_<user_id>`.
    pub async fn ingest(&self, path: &Path, user_id: &str) -> Result<JobResult, IngestFailure> {
        let collection =
            user_collection(user_id).map_err(|e| IngestError::InvalidUserId(e.to_string()))?;
        self.ingest_document(&DocumentRef::for_user(path, user_id), &collection)
            .await
    }

    /// Ingest `path` into an explicitly named collection (e.g. the shared index).
    pub async fn ingest_into(
        &self,
        path: &Path,
        collection: &str,
    ) -> Result<JobResult, IngestFailure> {
        self.ingest_document(&DocumentRef::new(path), collection)
            .await
    }

    async fn ingest_document(
        &self,
        doc: &DocumentRef,
        collection: &str,
    ) -> Result<JobResult, IngestFailure> {
        let file_name = doc.file_name();
        tracing::info!(
            collection,
            file = %file_name,
            user_id = doc.user_id.as_deref().unwrap_or("-"),
            "ingesting document"
        );

        let owned = doc.clone();
        let max_bytes = self.settings.max_file_bytes;
        let outcome = tokio::task::spawn_blocking(move || load_document(&owned, max_bytes))
            .await
            .map_err(|e| IngestError::Extraction {
                path: doc.path.display().to_string(),
                reason: format!("loader task failed: {}", e),
            })??;

        let units = match outcome {
            LoadOutcome::Loaded(units) => units,
            LoadOutcome::Empty => return Err(IngestError::EmptyDocument(file_name).into()),
        };

        let chunks = match chunk_units(&units, &self.settings.chunk) {
            ChunkOutcome::Chunks(chunks) => chunks,
            ChunkOutcome::NoChunks => return Err(IngestError::NoChunksProduced(file_name).into()),
        };
        tracing::debug!(collection, units = units.len(), chunks = chunks.len(), "chunked");

        let info = self
            .bounded("ensure_collection", self.store.ensure_collection(collection))
            .await
            .map_err(IngestError::EmbeddingService)?;

        let batch_size = self.settings.batch_size.max(1);
        let mut progress = PartialProgress {
            chunks_committed: 0,
            batches_committed: 0,
            batches_total: chunks.len().div_ceil(batch_size),
        };

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .bounded("embed", self.embedder.embed(&texts))
                .await
                .map_err(|e| {
                    IngestFailure::with_progress(IngestError::EmbeddingService(e), progress)
                })?;
            if vectors.len() != batch.len() {
                let e = format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
                return Err(IngestFailure::with_progress(
                    IngestError::EmbeddingService(e),
                    progress,
                ));
            }

            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
                .collect();
            self.bounded("upsert", self.store.upsert(collection, &records))
                .await
                .map_err(|e| {
                    IngestFailure::with_progress(IngestError::EmbeddingService(e), progress)
                })?;

            progress.batches_committed += 1;
            progress.chunks_committed += batch.len();
            tracing::debug!(
                collection,
                batch = progress.batches_committed,
                batches_total = progress.batches_total,
                "batch committed"
            );
        }

        let operation = if info.created {
            Operation::Created
        } else {
            Operation::Updated
        };
        tracing::info!(
            collection,
            file = %file_name,
            chunks = chunks.len(),
            ?operation,
            "document ingested"
        );

        Ok(JobResult {
            collection_name: collection.to_string(),
            chunks_embedded: chunks.len(),
            file_processed: file_name,
            operation,
        })
    }

    /// Run one ingestion job, recording `running` and then the terminal
    /// status. Status write failures are logged and never change the
    /// outcome returned here.
    pub async fn run_job(
        &self,
        job_id: &str,
        path: &Path,
        user_id: &str,
        status: &dyn StatusStore,
    ) -> JobStatus {
        record(status, &JobStatus::running(job_id, user_id)).await;

        let final_status = match self.ingest(path, user_id).await {
            Ok(result) => JobStatus::completed(job_id, user_id, result),
            Err(failure) => {
                tracing::warn!(job_id, user_id, error = %failure, "ingestion failed");
                JobStatus::failed(job_id, user_id, &failure)
            }
        };

        record(status, &final_status).await;
        final_status
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{}: {:#}", what, e)),
            Err(_) => Err(format!(
                "{} timed out after {}s",
                what,
                self.settings.call_timeout.as_secs_f64()
            )),
        }
    }
}

async fn record(status: &dyn StatusStore, job: &JobStatus) {
    if let Err(e) = status.put(job).await {
        tracing::error!(job_id = %job.job_id, error = %e, "failed to write job status");
    }
}

/// `lexctx ingest-shared <file>`: add a document to the shared knowledge base.
pub async fn run_ingest_shared(config: &Config, path: &Path) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let ingestor = Ingestor::new(
        services.store.clone(),
        services.embedder.clone(),
        IngestSettings::from_config(config)?,
    );

    let result = ingestor
        .ingest_into(path, &config.retrieval.shared_collection)
        .await
        .map_err(|f| anyhow::anyhow!(f.traceback()))?;

    println!("ingest-shared {}", result.file_processed);
    println!("  collection: {}", result.collection_name);
    println!("  chunks embedded: {}", result.chunks_embedded);
    println!("  operation: {:?}", result.operation);
    println!("ok");
    Ok(())
}
