//! # lexctx
//!
//! Retrieval-augmented context for a legal-document assistant.
//!
//! Users upload contracts, statutes and spreadsheets; `lexctx` turns each
//! upload into a private vector collection and, at question time, assembles
//! the passages that matter from that collection and from a shared legal
//! knowledge base.
//!
//! ## Architecture
//!
//! ```text
//!  upload ─▶ JobQueue ─▶ Ingestor ──────────────▶ SQLite
//!            (workers)   load → clean → chunk     ├─ legal_index
//!               │        → embed → upsert         └─ user_<id>
//!               ▼                                      │
//!          status.json                                 │
//!                                                      ▼
//!  question ─▶ QueryExpander ─▶ HybridRetriever ─▶ ContextCompressor ─▶ context
//!              (paraphrases)    (shared + user,     (LLM extraction)
//!                                weighted fusion)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexctx init
//! lexctx ingest-shared ./statutes/residential-tenancies.pdf
//! lexctx ingest ./lease.pdf --user alice --wait
//! lexctx context "Can my landlord keep the deposit?" --user alice
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | File loading and cleaning (pdf, csv, txt, doc/docx) |
//! | [`ingest`] | Ingestion pipeline |
//! | [`jobs`] | Job queue and workers |
//! | [`status`] | Job status records |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Language-model providers |
//! | [`retrieve`] | Hybrid retrieval |
//! | [`expand`] | Multi-query expansion |
//! | [`compress`] | Contextual compression |
//! | [`context`] | The end-to-end context pipeline |
//! | [`sqlite_store`] | Durable vector store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! Chunking, fusion, collection naming and the service traits live in the
//! `lexctx-core` crate.

pub mod compress;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod expand;
pub mod http;
pub mod ingest;
pub mod jobs;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod prompts;
pub mod retrieve;
pub mod services;
pub mod sqlite_store;
pub mod status;
pub mod telemetry;
