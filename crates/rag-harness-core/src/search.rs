//! Read path: embed a query, query the index, apply a strategy.
//!
//! Works entirely through the [`VectorIndex`] and [`EmbeddingProvider`]
//! traits. Errors from either propagate unchanged; nothing is retried here.
//!
//! Also holds the two text renderings of a result list that callers hand
//! on: [`format_context`] (the block an LLM prompt embeds) and
//! [`format_sources`] (the numbered human-readable source list).

use anyhow::Result;

use crate::embedding::EmbeddingProvider;
use crate::models::{Metadata, SearchResult};
use crate::store::VectorIndex;
use crate::strategy::RetrievalStrategy;

/// `search(query_text, n_results, filter?) -> ranked Search Results`.
///
/// `similarity = 1 - distance`, not clamped. Blank queries return nothing
/// without touching the provider.
pub async fn search(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    query: &str,
    n_results: usize,
    filter: Option<&Metadata>,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() || n_results == 0 {
        return Ok(Vec::new());
    }

    let vector = provider.embed_query(query).await?;
    let filter = filter.filter(|f| !f.is_empty());
    let hits = index.query(&vector, n_results, filter).await?;

    Ok(hits
        .into_iter()
        .map(|h| SearchResult {
            id: h.id,
            content: h.text,
            metadata: h.metadata,
            similarity: 1.0 - h.distance,
            weighted_score: None,
        })
        .collect())
}

/// [`search`] followed by `strategy.apply(results, limit)`.
pub async fn search_with_strategy(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    query: &str,
    n_results: usize,
    filter: Option<&Metadata>,
    strategy: &dyn RetrievalStrategy,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let raw = search(index, provider, query, n_results, filter).await?;
    Ok(strategy.apply(raw, limit))
}

fn source_desc(r: &SearchResult) -> String {
    let file = match r.source_file() {
        "" => "Unknown",
        f => f,
    };
    match r.repo_name() {
        "" => file.to_string(),
        repo => format!("{}/{}", repo, file),
    }
}

/// Context block for an LLM prompt. Code fragments with a known language
/// are fenced.
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No relevant documents found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let category = match r.category() {
                "" => "unknown",
                c => c,
            };
            let body = if category == "code" && !r.language().is_empty() {
                format!("```{}\n{}\n```", r.language(), r.content)
            } else {
                r.content.clone()
            };
            format!(
                "[Source {}: {} ({}) - relevance: {:.2}]\n{}\n",
                i + 1,
                source_desc(r),
                category,
                r.similarity,
                body
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// One line per result:
/// `N. repo/source_file (language) [marker] - relevance: 0.87`.
///
/// `.wdl` sources get a `[WDL Workflow]` marker, other sources whose path
/// mentions `pipeline` get `[Pipeline]`.
pub fn format_sources(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        let mut desc = source_desc(r);
        if !r.language().is_empty() {
            desc.push_str(&format!(" ({})", r.language()));
        }
        let file = r.source_file();
        if file.contains(".wdl") {
            desc.push_str(" [WDL Workflow]");
        } else if file.to_lowercase().contains("pipeline") {
            desc.push_str(" [Pipeline]");
        }
        out.push_str(&format!(
            "{}. {} - relevance: {:.2}\n",
            i + 1,
            desc,
            r.similarity
        ));
    }
    out
}
