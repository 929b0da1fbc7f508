//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is everything the ingestion and retrieval
//! pipelines need from a persistent index: lazily created named
//! collections, idempotent batch upserts, and top-k similarity search.
//!
//! Implementations must be `Send + Sync` to be shared across tokio tasks.
//! The app crate provides a durable SQLite backend; [`memory::InMemoryStore`]
//! backs tests and embedding in other hosts.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EmbeddingRecord, RetrievedPassage};

/// Outcome of [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    /// `true` when this call created the collection.
    pub created: bool,
}

/// Persistent, named collections of embedded chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | Atomic get-or-create |
/// | [`upsert`](VectorStore::upsert) | Add or replace records by id, one atomic batch |
/// | [`search`](VectorStore::search) | Top-k by cosine similarity |
/// | [`count`](VectorStore::count) | Number of records in a collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the collection, creating it if it does not exist.
    ///
    /// Concurrent callers racing on the same name all succeed; exactly one
    /// of them observes `created == true`.
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo>;

    /// Add or replace `records` in `collection`. Returns the number written.
    ///
    /// The batch is committed atomically. An empty batch is a no-op.
    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Up to `k` passages ordered by descending similarity to `query`.
    ///
    /// An unknown or empty collection yields an empty list.
    async fn search(&self, collection: &str, query: &[f32], k: usize)
        -> Result<Vec<RetrievedPassage>>;

    /// Number of records stored in `collection` (0 if unknown).
    async fn count(&self, collection: &str) -> Result<usize>;
}
