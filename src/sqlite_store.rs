//! SQLite-backed [`VectorStore`].
//!
//! Collections are rows in `collections`; records live in `records` keyed
//! by `(collection, id)`. Each upsert batch runs in one transaction with
//! `ON CONFLICT DO UPDATE`, so concurrent writers to the same collection
//! get per-record last-writer-wins and never a half-applied batch.
//! Search ranks the collection's vectors by cosine similarity in process
//! and reads text and metadata only for the top hits.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use sqlx::{Row, SqlitePool};

use lexctx_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use lexctx_core::models::{EmbeddingRecord, RetrievedPassage, SourceMeta};
use lexctx_core::store::{CollectionInfo, VectorStore};

use crate::config::Config;
use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and apply the schema.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Names of all collections, sorted.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO collections (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(CollectionInfo {
            name: name.to_string(),
            created: result.rows_affected() == 1,
        })
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO collections (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(collection)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for record in records {
            let meta_json = serde_json::to_string(&record.meta)?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, chunk_index, text, hash, meta_json,
                                     embedding, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    hash = excluded.hash,
                    meta_json = excluded.meta_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(record.chunk_index as i64)
            .bind(&record.text)
            .bind(&record.hash)
            .bind(&meta_json)
            .bind(vec_to_blob(&record.vector))
            .bind(record.vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Rank on vectors alone, then load text and metadata for the winners.
        let rows = sqlx::query(
            "SELECT id, embedding FROM records WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut ranked: Vec<(String, f64)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (
                    row.get("id"),
                    cosine_similarity(query, &blob_to_vec(&blob)) as f64,
                )
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ranked.len()].join(", ");
        let sql = format!(
            "SELECT id, text, meta_json FROM records WHERE collection = ? AND id IN ({})",
            placeholders
        );
        let mut details = sqlx::query(&sql).bind(collection);
        for (id, _) in &ranked {
            details = details.bind(id.as_str());
        }
        let mut by_id: HashMap<String, (String, SourceMeta)> = details
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                let meta_json: String = row.get("meta_json");
                let meta: SourceMeta = serde_json::from_str(&meta_json).unwrap_or_default();
                (row.get("id"), (row.get("text"), meta))
            })
            .collect();

        // A record replaced between the two reads is skipped.
        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                let (text, meta) = by_id.remove(&id)?;
                Some(RetrievedPassage {
                    id,
                    collection: collection.to_string(),
                    text,
                    meta,
                    score,
                })
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        parse_config(&format!(
            "[db]\npath = \"{}\"\n",
            tmp.path().join("lexctx.sqlite").display()
        ))
        .unwrap()
    }

    fn record(id: &str, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            hash: format!("h-{text}"),
            meta: SourceMeta {
                source: "lease.pdf".to_string(),
                page: Some(2),
                row: None,
            },
            vector,
        }
    }

    #[tokio::test]
    async fn ensure_collection_is_get_or_create() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();

        assert!(store.ensure_collection("user_alice").await.unwrap().created);
        assert!(!store.ensure_collection("user_alice").await.unwrap().created);
        assert_eq!(store.list_collections().await.unwrap(), vec!["user_alice"]);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();
        store.ensure_collection("c").await.unwrap();

        let batch = vec![record("a", "alpha", vec![1.0, 0.0]), record("b", "beta", vec![0.0, 1.0])];
        assert_eq!(store.upsert("c", &batch).await.unwrap(), 2);
        assert_eq!(store.upsert("c", &batch).await.unwrap(), 2);
        assert_eq!(store.count("c").await.unwrap(), 2);
        assert_eq!(store.upsert("c", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_ranks_and_restores_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();
        store
            .upsert(
                "c",
                &[
                    record("far", "far", vec![0.0, 1.0]),
                    record("near", "near", vec![1.0, 0.05]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert_eq!(hits[0].meta.page, Some(2));
        assert!(hits[0].score > hits[1].score);

        assert!(store.search("missing", &[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_loads_text_for_top_k_only() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();
        let batch: Vec<_> = (0..20)
            .map(|i| record(&format!("r{i}"), &format!("clause {i}"), vec![1.0, i as f32]))
            .collect();
        store.upsert("c", &batch).await.unwrap();

        let hits = store.search("c", &[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["r0", "r1", "r2"]);
        assert_eq!(hits[1].text, "clause 1");
        assert_eq!(hits[2].meta.source, "lease.pdf");
        assert!(hits.iter().all(|h| h.collection == "c"));
    }

    #[tokio::test]
    async fn records_survive_reconnect() {
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp);
        {
            let store = SqliteStore::open(&cfg).await.unwrap();
            store.upsert("user_bob", &[record("x", "kept", vec![0.3, 0.4])]).await.unwrap();
            store.pool().close().await;
        }
        let store = SqliteStore::open(&cfg).await.unwrap();
        assert_eq!(store.count("user_bob").await.unwrap(), 1);
        assert!(!store.ensure_collection("user_bob").await.unwrap().created);
    }

    #[tokio::test]
    async fn concurrent_batches_to_one_collection() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(SqliteStore::open(&test_config(&tmp)).await.unwrap());

        let mut handles = Vec::new();
        for w in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let batch: Vec<_> = (0..10)
                    .map(|i| record(&format!("{w}-{i}"), "t", vec![w as f32, i as f32]))
                    .collect();
                store.upsert("shared", &batch).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.count("shared").await.unwrap(), 40);
    }
}
