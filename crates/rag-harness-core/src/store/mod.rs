//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the contract every backend implements: a
//! single named collection of `(id, vector, text, metadata)` entries with
//! cosine k-NN query and metadata-filtered administration. The app crate
//! provides the persistent SQLite backend; [`memory::InMemoryIndex`] lives
//! here for tests and embedding in other programs.
//!
//! # Filters
//!
//! A filter is a [`Metadata`] map interpreted as an exact-match conjunction:
//! an entry matches when every filter key is present with an equal value.
//! The empty filter matches everything. In [`VectorIndex::query`] the
//! filter restricts the candidate set *before* the `k` nearest are chosen.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::Metadata;

/// Distance metric every collection is created with.
pub const METRIC: &str = "cosine";

/// Errors raised by index backends on malformed writes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("add() argument lengths differ: {ids} ids, {vectors} vectors, {texts} texts, {metadatas} metadatas")]
    LengthMismatch {
        ids: usize,
        vectors: usize,
        texts: usize,
        metadatas: usize,
    },
    #[error("vector dimension mismatch: collection has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine distance, `1 - cosine_similarity`.
    pub distance: f64,
}

/// Persistent store of fragment vectors for one collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_or_create`](VectorIndex::get_or_create) | Idempotently ensure the collection exists |
/// | [`add`](VectorIndex::add) | Upsert entries by id |
/// | [`query`](VectorIndex::query) | Filtered cosine k-NN |
/// | [`ids`](VectorIndex::ids) | Full id scan for idempotent ingestion |
/// | [`peek`](VectorIndex::peek) | Metadata sample for statistics |
/// | [`delete`](VectorIndex::delete) / [`delete_where`](VectorIndex::delete_where) | Scoped deletes |
/// | [`count`](VectorIndex::count) | Number of entries |
/// | [`reset`](VectorIndex::reset) | Drop every entry and the collection itself |
///
/// Every method other than `get_or_create` and `reset` creates the
/// collection on first use if it does not exist.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn collection_name(&self) -> &str;

    async fn get_or_create(&self) -> Result<()>;

    /// Upsert. All four slices must have the same length, and every vector
    /// must match the collection's dimensionality once it is known.
    async fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<()>;

    /// Up to `k` entries nearest to `vector`, ascending by distance.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>>;

    async fn ids(&self) -> Result<HashSet<String>>;

    /// Metadata of up to `n` entries.
    async fn peek(&self, n: usize) -> Result<Vec<Metadata>>;

    /// Returns the number of entries removed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Returns the number of entries removed. An empty filter is rejected
    /// rather than treated as "delete everything"; use `reset` for that.
    async fn delete_where(&self, filter: &Metadata) -> Result<usize>;

    async fn count(&self) -> Result<usize>;

    async fn reset(&self) -> Result<()>;
}

/// True if `metadata` satisfies every key/value pair in `filter`.
pub fn matches_filter(metadata: &Metadata, filter: &Metadata) -> bool {
    filter
        .iter()
        .all(|(key, want)| metadata.get(key) == Some(want))
}

/// Check `add` arguments. Returns the dimensionality the collection has
/// after the write.
pub fn validate_add(
    ids: &[String],
    vectors: &[Vec<f32>],
    texts: &[String],
    metadatas: &[Metadata],
    dims: Option<usize>,
) -> Result<Option<usize>, IndexError> {
    let n = ids.len();
    if vectors.len() != n || texts.len() != n || metadatas.len() != n {
        return Err(IndexError::LengthMismatch {
            ids: n,
            vectors: vectors.len(),
            texts: texts.len(),
            metadatas: metadatas.len(),
        });
    }

    let mut expected = dims;
    for v in vectors {
        match expected {
            Some(d) if d != v.len() => {
                return Err(IndexError::DimensionMismatch {
                    expected: d,
                    actual: v.len(),
                })
            }
            Some(_) => {}
            None => expected = Some(v.len()),
        }
    }
    Ok(expected)
}
