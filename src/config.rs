//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults that
//! reproduce the reference deployment (500/100 char chunks, batches of 32,
//! top-5 from each index, equal weights, three paraphrases).
//!
//! ```toml
//! [db]
//! path = "./data/lexctx.sqlite"
//!
//! [embedding]
//! provider = "local"            # disabled | openai | ollama | local
//! model = "all-minilm-l6-v2"
//!
//! [llm]
//! provider = "groq"             # disabled | openai | groq | ollama
//! model = "llama3-70b-8192"
//! ```
//!
//! API keys are never read from the file: `OPENAI_API_KEY` and
//! `GROQ_API_KEY` come from the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lexctx_core::chunk::ChunkParams;
use lexctx_core::collection::{DEFAULT_SHARED_COLLECTION, USER_COLLECTION_PREFIX};
use lexctx_core::fusion::FusionWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.size, self.overlap)
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Chunks per embed + upsert round trip.
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
    /// Upper bound on a single embed or upsert call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
            call_timeout_secs: default_call_timeout_secs(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl IngestConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_ingest_batch_size() -> usize {
    32
}
fn default_call_timeout_secs() -> u64 {
    120
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_shared_collection")]
    pub shared_collection: String,
    #[serde(default = "default_k")]
    pub k_shared: usize,
    #[serde(default = "default_k")]
    pub k_user: usize,
    #[serde(default = "default_weight")]
    pub weight_shared: f64,
    #[serde(default = "default_weight")]
    pub weight_user: f64,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    /// Paraphrases requested from the language model per query.
    #[serde(default = "default_paraphrases")]
    pub paraphrases: usize,
    /// Upper bound on a single query-embedding or search call.
    #[serde(default = "default_retrieval_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            shared_collection: default_shared_collection(),
            k_shared: default_k(),
            k_user: default_k(),
            weight_shared: default_weight(),
            weight_user: default_weight(),
            final_limit: default_final_limit(),
            paraphrases: default_paraphrases(),
            call_timeout_secs: default_retrieval_call_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn weights(&self) -> FusionWeights {
        FusionWeights {
            shared: self.weight_shared,
            user: self.weight_user,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_shared_collection() -> String {
    DEFAULT_SHARED_COLLECTION.to_string()
}
fn default_k() -> usize {
    5
}
fn default_weight() -> f64 {
    0.5
}
fn default_final_limit() -> usize {
    10
}
fn default_paraphrases() -> usize {
    3
}
fn default_retrieval_call_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, OpenAI-compatible gateways).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_embedding_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_embedding_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Parallel compression calls per query.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_max_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Directory holding `jobs/<id>.status.json` and `users/<id>.status.json`.
    #[serde(default = "default_status_dir")]
    pub status_dir: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            status_dir: default_status_dir(),
        }
    }
}

fn default_workers() -> usize {
    2
}
fn default_queue_capacity() -> usize {
    64
}
fn default_status_dir() -> PathBuf {
    PathBuf::from("./data/status")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config
        .chunking
        .params()
        .context("invalid [chunking] section")?;

    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be > 0");
    }
    if config.ingest.call_timeout_secs == 0 {
        bail!("ingest.call_timeout_secs must be > 0");
    }

    let r = &config.retrieval;
    if r.shared_collection.is_empty() || r.shared_collection.starts_with(USER_COLLECTION_PREFIX) {
        bail!(
            "retrieval.shared_collection must be non-empty and must not start with '{}'",
            USER_COLLECTION_PREFIX
        );
    }
    if r.k_shared == 0 || r.k_user == 0 {
        bail!("retrieval.k_shared and retrieval.k_user must be >= 1");
    }
    if r.final_limit == 0 {
        bail!("retrieval.final_limit must be >= 1");
    }
    if r.weight_shared < 0.0 || r.weight_user < 0.0 || r.weight_shared + r.weight_user <= 0.0 {
        bail!("retrieval weights must be >= 0 and not both zero");
    }
    if r.call_timeout_secs == 0 {
        bail!("retrieval.call_timeout_secs must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.unwrap_or(0) == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        bail!("embedding.timeout_secs must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "groq" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, groq, or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    if config.llm.max_concurrency == 0 {
        bail!("llm.max_concurrency must be >= 1");
    }

    if config.jobs.workers == 0 || config.jobs.queue_capacity == 0 {
        bail!("jobs.workers and jobs.queue_capacity must be >= 1");
    }

    Ok(config)
}
