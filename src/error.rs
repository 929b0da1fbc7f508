//! Typed errors for the ingestion and retrieval pipelines.
//!
//! Pipeline stages return these enums so callers (the job worker, the CLI,
//! an embedding host) can branch on the failure kind. Configuration and
//! CLI glue use `anyhow` instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why ingesting one document failed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type '{0}' (expected pdf, csv, txt, doc or docx)")]
    UnsupportedType(String),

    #[error("document '{0}' contains no text after cleaning")]
    EmptyDocument(String),

    #[error("document '{0}' produced no chunks")]
    NoChunksProduced(String),

    #[error("file '{path}' is {size} bytes, over the {limit} byte limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from '{path}': {reason}")]
    Extraction { path: String, reason: String },

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// An embedding or vector-store call failed or timed out.
    #[error("embedding service failed: {0}")]
    EmbeddingService(String),
}

impl IngestError {
    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnsupportedType(_) => "unsupported_type",
            IngestError::EmptyDocument(_) => "empty_document",
            IngestError::NoChunksProduced(_) => "no_chunks_produced",
            IngestError::FileTooLarge { .. } => "file_too_large",
            IngestError::Io { .. } => "io",
            IngestError::Extraction { .. } => "extraction",
            IngestError::InvalidUserId(_) => "invalid_user_id",
            IngestError::EmbeddingService(_) => "embedding_service",
        }
    }
}

/// How far an ingestion got before it failed.
///
/// Batches counted here are durably committed and stay in the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialProgress {
    pub chunks_committed: usize,
    pub batches_committed: usize,
    pub batches_total: usize,
}

/// A failed ingestion: the error plus any progress made before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct IngestFailure {
    #[source]
    pub error: IngestError,
    pub partial: Option<PartialProgress>,
}

impl IngestFailure {
    pub fn with_progress(error: IngestError, partial: PartialProgress) -> Self {
        Self {
            error,
            partial: Some(partial),
        }
    }

    /// The error followed by every underlying cause, one per line.
    pub fn traceback(&self) -> String {
        let mut lines = vec![format!("{}: {}", self.error.kind(), self.error)];
        let mut source = std::error::Error::source(&self.error);
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        if let Some(p) = &self.partial {
            lines.push(format!(
                "progress: {}/{} batches committed ({} chunks)",
                p.batches_committed, p.batches_total, p.chunks_committed
            ));
        }
        lines.join("\n")
    }
}

impl From<IngestError> for IngestFailure {
    fn from(error: IngestError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// Why context retrieval failed. "Nothing relevant found" is not an error.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to embed query: {0}")]
    Embedding(String),

    #[error("vector search failed: {0}")]
    Search(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),
}

/// Language-model call failure. Always recovered locally by the caller.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Request(#[from] crate::http::HttpError),

    #[error("language model call timed out after {0}s")]
    Timeout(u64),

    #[error("language model provider is disabled")]
    Disabled,

    #[error("invalid language model response: {0}")]
    InvalidResponse(String),
}
