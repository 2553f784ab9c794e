//! Idempotent, batched embedding and storage.
//!
//! [`add_fragments`] is the write path: it fetches every existing id from
//! the index up front, drops candidates that are already present (and
//! duplicates within the same run), then hands the rest to
//! [`embed_and_store`].
//!
//! [`embed_and_store`] embeds and writes in fixed-size batches, in input
//! order, one at a time. A batch whose embedding or write fails is
//! abandoned and counted; later batches still run. Committed batches are
//! never rolled back.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashSet;

use crate::embedding::EmbeddingProvider;
use crate::models::Fragment;
use crate::store::VectorIndex;

/// Default number of fragments per embedding call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of [`embed_and_store`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Fragments handed to the batcher.
    pub requested: usize,
    /// Fragments committed to the index.
    pub added: usize,
    /// Number of failed batches.
    pub error_count: usize,
    /// Fragments in failed batches.
    pub failed_fragments: usize,
}

impl BatchReport {
    /// Fragments requested but not committed.
    pub fn missing(&self) -> usize {
        self.requested - self.added
    }

    pub fn merge(&mut self, other: &BatchReport) {
        self.requested += other.requested;
        self.added += other.added;
        self.error_count += other.error_count;
        self.failed_fragments += other.failed_fragments;
    }
}

/// Outcome of [`add_fragments`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddReport {
    /// Candidates whose id was already indexed or repeated within the run.
    pub skipped_existing: usize,
    pub batches: BatchReport,
}

/// `embed_and_store(fragments) -> (added_count, error_count)`.
///
/// `batch_size` of zero is rejected. An error is only returned for that
/// argument check; per-batch failures are reported in the [`BatchReport`].
pub async fn embed_and_store(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    fragments: &[Fragment],
    batch_size: usize,
) -> Result<BatchReport> {
    if batch_size == 0 {
        bail!("batch_size must be > 0");
    }

    let mut report = BatchReport {
        requested: fragments.len(),
        ..BatchReport::default()
    };
    let total_batches = fragments.len().div_ceil(batch_size);

    for (n, batch) in fragments.chunks(batch_size).enumerate() {
        match store_batch(index, provider, batch).await {
            Ok(()) => {
                report.added += batch.len();
                tracing::debug!(
                    batch = n + 1,
                    of = total_batches,
                    fragments = batch.len(),
                    "batch committed"
                );
            }
            Err(e) => {
                report.error_count += 1;
                report.failed_fragments += batch.len();
                tracing::warn!(
                    batch = n + 1,
                    of = total_batches,
                    fragments = batch.len(),
                    error = %e,
                    "batch failed, continuing"
                );
            }
        }
    }

    Ok(report)
}

async fn store_batch(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    batch: &[Fragment],
) -> Result<()> {
    let texts: Vec<String> = batch.iter().map(|f| f.text.clone()).collect();
    let vectors = provider.embed(&texts).await?;
    if vectors.len() != batch.len() {
        bail!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            batch.len()
        );
    }

    let ids: Vec<String> = batch.iter().map(|f| f.id.clone()).collect();
    let metadatas: Vec<_> = batch.iter().map(|f| f.metadata.clone()).collect();
    index.add(&ids, &vectors, &texts, &metadatas).await
}

/// Drop fragments whose id is in `existing` or already seen earlier in
/// `fragments`. Returns the survivors and the number dropped.
pub fn filter_new(fragments: Vec<Fragment>, existing: &HashSet<String>) -> (Vec<Fragment>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let before = fragments.len();
    let fresh: Vec<Fragment> = fragments
        .into_iter()
        .filter(|f| !existing.contains(&f.id) && seen.insert(f.id.clone()))
        .collect();
    let skipped = before - fresh.len();
    (fresh, skipped)
}

/// Idempotent write: skip already-indexed ids, then [`embed_and_store`].
pub async fn add_fragments(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    fragments: Vec<Fragment>,
    batch_size: usize,
) -> Result<AddReport> {
    index.get_or_create().await?;
    let existing = index.ids().await?;
    let (fresh, skipped_existing) = filter_new(fragments, &existing);

    if skipped_existing > 0 {
        tracing::info!(skipped = skipped_existing, "fragments already indexed");
    }

    let batches = if fresh.is_empty() {
        BatchReport::default()
    } else {
        embed_and_store(index, provider, &fresh, batch_size).await?
    };

    Ok(AddReport {
        skipped_existing,
        batches,
    })
}
