//! # lexctx core
//!
//! Runtime-agnostic logic shared by the `lexctx` application: data models,
//! text cleaning, overlap chunking, the vector store abstraction, weighted
//! rank fusion, and the embedding / language-model provider traits.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Everything
//! that talks to the outside world lives in the app crate and plugs in
//! through [`store::VectorStore`], [`embedding::Embedder`] and
//! [`llm::LanguageModel`].

pub mod chunk;
pub mod clean;
pub mod collection;
pub mod embedding;
pub mod fusion;
pub mod llm;
pub mod models;
pub mod store;
