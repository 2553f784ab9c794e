//! In-memory [`VectorIndex`] implementation.
//!
//! Entries live in a `BTreeMap` behind `std::sync::RwLock`. Query is
//! brute-force cosine distance over the filtered entries.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::Metadata;

use super::{matches_filter, validate_add, QueryHit, VectorIndex};

struct Entry {
    vector: Vec<f32>,
    text: String,
    metadata: Metadata,
}

#[derive(Default)]
struct Collection {
    dims: Option<usize>,
    entries: BTreeMap<String, Entry>,
}

/// In-memory index for tests and embedding in other programs.
pub struct InMemoryIndex {
    name: String,
    collection: RwLock<Option<Collection>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(None),
        }
    }

    /// Whether the collection currently exists.
    pub fn exists(&self) -> Result<bool> {
        let guard = self
            .collection
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        Ok(guard.is_some())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<Collection>>> {
        self.collection
            .write()
            .map_err(|_| anyhow!("index lock poisoned"))
    }

    /// Write access to the collection, creating it if absent.
    fn with_collection<T>(&self, f: impl FnOnce(&mut Collection) -> T) -> Result<T> {
        let mut guard = self.write()?;
        let collection = guard.get_or_insert_with(|| {
            tracing::info!(collection = %self.name, "created collection");
            Collection::default()
        });
        Ok(f(collection))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new("documents")
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn get_or_create(&self) -> Result<()> {
        self.with_collection(|_| ())
    }

    async fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<()> {
        self.with_collection(|c| -> Result<()> {
            c.dims = validate_add(ids, vectors, texts, metadatas, c.dims)?;
            for (((id, vector), text), metadata) in ids.iter().zip(vectors).zip(texts).zip(metadatas)
            {
                c.entries.insert(
                    id.clone(),
                    Entry {
                        vector: vector.clone(),
                        text: text.clone(),
                        metadata: metadata.clone(),
                    },
                );
            }
            Ok(())
        })?
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>> {
        self.with_collection(|c| -> Result<Vec<QueryHit>> {
            if let Some(d) = c.dims {
                if d != vector.len() {
                    bail!(super::IndexError::DimensionMismatch {
                        expected: d,
                        actual: vector.len()
                    });
                }
            }

            let mut hits: Vec<QueryHit> = c
                .entries
                .iter()
                .filter(|(_, e)| filter.map_or(true, |f| matches_filter(&e.metadata, f)))
                .map(|(id, e)| QueryHit {
                    id: id.clone(),
                    text: e.text.clone(),
                    metadata: e.metadata.clone(),
                    distance: cosine_distance(vector, &e.vector),
                })
                .collect();

            hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
            hits.truncate(k);
            Ok(hits)
        })?
    }

    async fn ids(&self) -> Result<HashSet<String>> {
        self.with_collection(|c| c.entries.keys().cloned().collect())
    }

    async fn peek(&self, n: usize) -> Result<Vec<Metadata>> {
        self.with_collection(|c| {
            c.entries
                .values()
                .take(n)
                .map(|e| e.metadata.clone())
                .collect()
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.with_collection(|c| ids.iter().filter(|id| c.entries.remove(*id).is_some()).count())
    }

    async fn delete_where(&self, filter: &Metadata) -> Result<usize> {
        if filter.is_empty() {
            bail!("delete_where requires a non-empty filter");
        }
        self.with_collection(|c| {
            let before = c.entries.len();
            c.entries.retain(|_, e| !matches_filter(&e.metadata, filter));
            before - c.entries.len()
        })
    }

    async fn count(&self) -> Result<usize> {
        self.with_collection(|c| c.entries.len())
    }

    async fn reset(&self) -> Result<()> {
        *self.write()? = None;
        Ok(())
    }
}
