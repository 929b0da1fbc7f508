//! In-memory [`VectorStore`] for tests and embedding in other hosts.
//!
//! Collections are `HashMap`s behind a single `std::sync::RwLock`. Search
//! is brute-force cosine similarity over every record in the collection.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{EmbeddingRecord, RetrievedPassage};

use super::{CollectionInfo, VectorStore};

#[derive(Default)]
struct Collection {
    /// Insertion order, so ties in search are reported deterministically.
    order: Vec<String>,
    records: HashMap<String, EmbeddingRecord>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo> {
        let mut collections = self.write()?;
        let created = !collections.contains_key(name);
        if created {
            collections.insert(name.to_string(), Collection::default());
        }
        Ok(CollectionInfo {
            name: name.to_string(),
            created,
        })
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut collections = self.write()?;
        let target = collections.entry(collection.to_string()).or_default();
        for record in records {
            if target.records.insert(record.id.clone(), record.clone()).is_none() {
                target.order.push(record.id.clone());
            }
        }
        Ok(records.len())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let collections = self.read()?;
        let Some(target) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<RetrievedPassage> = target
            .order
            .iter()
            .filter_map(|id| target.records.get(id))
            .map(|r| RetrievedPassage {
                id: r.id.clone(),
                collection: collection.to_string(),
                text: r.text.clone(),
                meta: r.meta.clone(),
                score: cosine_similarity(query, &r.vector) as f64,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .read()?
            .get(collection)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }
}
