//! Hybrid retrieval over the shared knowledge base and one user's index.
//!
//! Both collections are searched concurrently with their own top-k, then
//! combined with [`weighted_fusion`]. A collection that does not exist yet
//! simply contributes no passages.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lexctx_core::collection::user_collection;
use lexctx_core::embedding::{embed_query, Embedder};
use lexctx_core::fusion::weighted_fusion;
use lexctx_core::models::FusedPassage;
use lexctx_core::store::VectorStore;

use crate::config::{Config, RetrievalConfig};
use crate::error::RetrievalError;
use crate::services::Services;

pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Embed several queries in one call.
    pub async fn embed_queries(&self, queries: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let vectors = bounded(
            self.config.call_timeout(),
            "embed",
            self.embedder.embed(queries),
        )
        .await
        .map_err(RetrievalError::Embedding)?;
        if vectors.len() != queries.len() {
            return Err(RetrievalError::Embedding(format!(
                "expected {} query vectors, got {}",
                queries.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    /// Search with an already-embedded query.
    pub async fn retrieve(
        &self,
        query_vec: &[f32],
        user_id: &str,
    ) -> Result<Vec<FusedPassage>, RetrievalError> {
        let user = user_collection(user_id)
            .map_err(|e| RetrievalError::InvalidUserId(e.to_string()))?;

        let limit = self.config.call_timeout();
        let (shared, personal) = tokio::try_join!(
            bounded(
                limit,
                "shared search",
                self.store
                    .search(&self.config.shared_collection, query_vec, self.config.k_shared),
            ),
            bounded(
                limit,
                "user search",
                self.store.search(&user, query_vec, self.config.k_user),
            ),
        )
        .map_err(RetrievalError::Search)?;

        tracing::debug!(
            user_id,
            shared = shared.len(),
            user = personal.len(),
            "hybrid search"
        );

        Ok(weighted_fusion(
            &shared,
            &personal,
            self.config.weights(),
            self.config.final_limit,
        ))
    }

    /// Embed `query` and search with it.
    pub async fn retrieve_query(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<Vec<FusedPassage>, RetrievalError> {
        let vector = bounded(
            self.config.call_timeout(),
            "embed",
            embed_query(self.embedder.as_ref(), query),
        )
        .await
        .map_err(RetrievalError::Embedding)?;
        self.retrieve(&vector, user_id).await
    }
}

/// Run an upstream call under `limit`; a stall becomes an error.
async fn bounded<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{}: {:#}", what, e)),
        Err(_) => Err(format!("{} timed out after {}s", what, limit.as_secs_f64())),
    }
}

/// `lexctx search <query> --user <id>`: fused passages without any LLM step.
pub async fn run_search(config: &Config, query: &str, user_id: &str) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let retriever = HybridRetriever::new(
        services.store.clone(),
        services.embedder.clone(),
        config.retrieval.clone(),
    );

    let passages = retriever.retrieve_query(query, user_id).await?;
    if passages.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, p) in passages.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} / {}",
            i + 1,
            p.score,
            p.origin.as_str(),
            p.meta.source
        );
        if let Some(page) = p.meta.page {
            println!("    page: {}", page);
        }
        if let Some(row) = p.meta.row {
            println!("    row: {}", row);
        }
        println!("    excerpt: \"{}\"", snippet(&p.text, 200));
        println!("    id: {}", p.id);
        println!();
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
