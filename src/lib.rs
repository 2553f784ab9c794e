//! # RAG Harness
//!
//! Repository and documentation ingestion into a metadata-tagged vector
//! index, with strategy-driven retrieval.
//!
//! The pure pipeline (categorization, filtering, chunking, fragment
//! identity, batching, the index contract, retrieval strategies) lives in
//! `rag-harness-core`. This crate adds the I/O around it: configuration,
//! the SQLite-backed index, embedding providers, repository and
//! documentation readers, the CLI commands, and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────┐
//! │ repo / docs  │──▶│ filter → chunk → │──▶│  SQLite    │
//! │  readers     │   │ id → embed batch │   │  index     │
//! └──────────────┘   └──────────────────┘   └─────┬──────┘
//!                                                 │
//!                        ┌────────────────────────┤
//!                        ▼                        ▼
//!                   ┌──────────┐            ┌──────────┐
//!                   │   CLI    │            │   HTTP   │
//!                   │  (rag)   │            │   API    │
//!                   └──────────┘            └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | SQLite pool |
//! | [`sqlite_index`] | Persistent vector index |
//! | [`embedding`] | Embedding providers |
//! | [`repo`] | Repository acquisition and file extraction |
//! | [`docs`] | Documentation directory reader |
//! | [`ingest`] | Ingestion orchestration and run statistics |
//! | [`search`] | Profile resolution and search output |
//! | [`stats`] | Index statistics |
//! | [`admin`] | Clear and delete-by-repository |
//! | [`server`] | HTTP JSON API |

pub mod admin;
pub mod config;
pub mod db;
pub mod docs;
pub mod embedding;
pub mod ingest;
pub mod repo;
pub mod search;
pub mod server;
pub mod sqlite_index;
pub mod stats;
