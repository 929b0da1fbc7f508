//! The context pipeline: expand → retrieve/fuse → compress.
//!
//! [`ContextPipeline::get_context`] is what a chat front end calls before
//! prompting its answer model. An empty string means nothing relevant was
//! found; an `Err` means context could not be retrieved at all.

use std::sync::Arc;

use lexctx_core::collection::validate_user_id;
use lexctx_core::embedding::Embedder;
use lexctx_core::llm::LanguageModel;
use lexctx_core::store::VectorStore;

use crate::compress::ContextCompressor;
use crate::config::Config;
use crate::error::RetrievalError;
use crate::expand::QueryExpander;
use crate::retrieve::HybridRetriever;
use crate::services::Services;

pub struct ContextPipeline {
    expander: QueryExpander,
    compressor: ContextCompressor,
}

impl ContextPipeline {
    pub fn new(expander: QueryExpander, compressor: ContextCompressor) -> Self {
        Self {
            expander,
            compressor,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let retriever = Arc::new(HybridRetriever::new(
            store,
            embedder,
            config.retrieval.clone(),
        ));
        let expander = QueryExpander::new(
            Arc::clone(&llm),
            retriever,
            config.retrieval.paraphrases,
            config.llm.timeout(),
        );
        let compressor =
            ContextCompressor::new(llm, config.llm.max_concurrency, config.llm.timeout());
        Self::new(expander, compressor)
    }

    pub async fn get_context(&self, query: &str, user_id: &str) -> Result<String, RetrievalError> {
        validate_user_id(user_id).map_err(|e| RetrievalError::InvalidUserId(e.to_string()))?;
        let query = query.trim();
        if query.is_empty() {
            return Ok(String::new());
        }

        let passages = self.expander.retrieve(query, user_id).await?;
        if passages.is_empty() {
            tracing::info!(user_id, "no passages retrieved");
            return Ok(String::new());
        }

        let context = self.compressor.compress(query, &passages).await;
        tracing::info!(
            user_id,
            passages = passages.len(),
            context_chars = context.chars().count(),
            "context assembled"
        );
        Ok(context)
    }
}

/// `lexctx context <query> --user <id>`: print the compressed context.
pub async fn run_context(config: &Config, query: &str, user_id: &str) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let pipeline = ContextPipeline::from_config(
        config,
        services.store.clone(),
        services.embedder.clone(),
        services.llm.clone(),
    );

    let context = pipeline.get_context(query, user_id).await?;
    if context.is_empty() {
        eprintln!("No relevant context.");
    } else {
        println!("{}", context);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexctx_core::store::memory::InMemoryStore;
    use std::time::Duration;

    use crate::config::parse_config;
    use crate::llm::DisabledModel;

    struct StallingEmbedder;

    #[async_trait]
    impl Embedder for StallingEmbedder {
        fn model_name(&self) -> &str {
            "stalling"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(365 * 24 * 3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_query_embedding_fails_the_request() {
        let config = parse_config("[db]\npath = \"x\"\n[retrieval]\ncall_timeout_secs = 10\n")
            .unwrap();
        let pipeline = ContextPipeline::from_config(
            &config,
            Arc::new(InMemoryStore::new()),
            Arc::new(StallingEmbedder),
            Arc::new(DisabledModel),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(30 * 24 * 3600),
            pipeline.get_context("force majeure", "alice"),
        )
        .await
        .expect("get_context must not hang on a stalled embedder");

        match outcome {
            Err(RetrievalError::Embedding(msg)) => assert!(msg.contains("timed out after 10s")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
