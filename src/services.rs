//! Runtime wiring: the store, embedder and language model a command needs,
//! built once from [`Config`].

use anyhow::Result;
use std::sync::Arc;

use lexctx_core::embedding::Embedder;
use lexctx_core::llm::LanguageModel;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::create_llm;
use crate::sqlite_store::SqliteStore;

pub struct Services {
    pub store: Arc<SqliteStore>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LanguageModel>,
}

impl Services {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(config).await?);
        let embedder = create_embedder(&config.embedding)?;
        let llm = create_llm(&config.llm)?;
        tracing::debug!(
            embedder = embedder.model_name(),
            llm = llm.model_name(),
            "services ready"
        );
        Ok(Self {
            store,
            embedder,
            llm,
        })
    }
}
