//! Core data models that flow through ingestion and retrieval.
//!
//! Ingestion produces [`TextUnit`] → [`Chunk`] → [`EmbeddingRecord`];
//! retrieval turns stored records back into [`RetrievedPassage`]s, fuses
//! them into [`FusedPassage`]s and finally compresses them into
//! [`CompressedExcerpt`]s.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An uploaded file waiting to be ingested.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub path: PathBuf,
    /// Lowercase extension without the leading dot (`"pdf"`, `"csv"`, ...).
    pub extension: String,
    /// Owning user; `None` for documents in the shared knowledge base.
    pub user_id: Option<String>,
}

impl DocumentRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            path,
            extension,
            user_id: None,
        }
    }

    pub fn for_user(path: impl Into<PathBuf>, user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::new(path)
        }
    }

    /// File name component, used as the `source` of every unit and in job results.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Where a piece of text came from inside its source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// File name of the uploaded document.
    pub source: String,
    /// 1-based page number (PDF).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// 0-based data row (CSV).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
}

/// One page or record extracted from a document, already cleaned.
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub content: String,
    pub meta: SourceMeta,
}

/// A bounded window of the concatenated cleaned text of one document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic UUIDv5 of `(source, index, hash)`.
    pub id: String,
    pub index: usize,
    pub text: String,
    /// SHA-256 hex of `text`.
    pub hash: String,
    /// Metadata of the unit in which this chunk starts.
    pub meta: SourceMeta,
    /// Char offset (inclusive) into the concatenated text.
    pub start: usize,
    /// Char offset (exclusive) into the concatenated text.
    pub end: usize,
}

/// A chunk together with its embedding, ready to be upserted.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub chunk_index: usize,
    pub text: String,
    pub hash: String,
    pub meta: SourceMeta,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            chunk_index: chunk.index,
            text: chunk.text.clone(),
            hash: chunk.hash.clone(),
            meta: chunk.meta.clone(),
            vector,
        }
    }
}

/// Which index a passage was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Shared,
    User,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Shared => "shared",
            Origin::User => "user",
        }
    }
}

/// A stored record surfaced by a similarity search.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub id: String,
    pub collection: String,
    pub text: String,
    pub meta: SourceMeta,
    /// Raw relevance score (cosine similarity).
    pub score: f64,
}

/// A passage after weighted fusion across the shared and user indexes.
#[derive(Debug, Clone, Serialize)]
pub struct FusedPassage {
    pub id: String,
    pub collection: String,
    /// Index the passage was first discovered in.
    pub origin: Origin,
    pub text: String,
    pub meta: SourceMeta,
    pub score: f64,
}

/// The query-relevant part of one passage, as judged by the compressor.
#[derive(Debug, Clone, Serialize)]
pub struct CompressedExcerpt {
    pub passage_id: String,
    pub text: String,
    pub score: f64,
}
