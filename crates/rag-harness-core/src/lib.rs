//! # RAG Harness Core
//!
//! The ingestion-and-retrieval core: categorization, content filtering,
//! chunking, fragment identity, batched embedding, the vector index
//! contract, and retrieval strategies.
//!
//! This crate performs no filesystem, database, or network I/O. Backends
//! and embedding providers are supplied by the caller through the
//! [`store::VectorIndex`] and [`embedding::EmbeddingProvider`] traits.
//!
//! ```text
//! write: path ─► categorize/filter ─► chunk ─► identity ─► batch ─► VectorIndex
//! read:  query ─► EmbeddingProvider ─► VectorIndex::query ─► strategy ─► results
//! ```

pub mod batch;
pub mod categorize;
pub mod chunk;
pub mod embedding;
pub mod filter;
pub mod identity;
pub mod models;
pub mod search;
pub mod store;
pub mod strategy;
