//! Index statistics.
//!
//! The total comes from `count()`. The per-field breakdowns are computed
//! over a `peek` sample of the first [`SAMPLE_SIZE`] fragments, so on a
//! large index they describe the sample, not the whole collection.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rag_harness_core::models::{keys, meta_str, Metadata};
use rag_harness_core::store::VectorIndex;

use crate::config::Config;
use crate::sqlite_index::SqliteIndex;

pub const SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub collection_name: String,
    pub persist_directory: PathBuf,
    pub total_chunks: usize,
    pub sample_size: usize,
    pub by_source_type: BTreeMap<String, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

fn histogram(sample: &[Metadata], key: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for m in sample {
        let value = match meta_str(m, key) {
            "" => "unknown",
            v => v,
        };
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

/// `persist_directory` is reported as given; the index itself does not
/// know where it lives.
pub async fn collect_stats(index: &dyn VectorIndex, persist_directory: &Path) -> Result<IndexStats> {
    let total_chunks = index.count().await?;
    let sample = index.peek(SAMPLE_SIZE).await?;

    Ok(IndexStats {
        collection_name: index.collection_name().to_string(),
        persist_directory: persist_directory.to_path_buf(),
        total_chunks,
        sample_size: sample.len(),
        by_source_type: histogram(&sample, keys::SOURCE_TYPE),
        by_language: histogram(&sample, keys::LANGUAGE),
        by_category: histogram(&sample, keys::FILE_CATEGORY),
    })
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn print_breakdown(title: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("  By {}:", title);
    let mut rows: Vec<_> = counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (value, n) in rows {
        println!("    {:<24} {:>6}", value, n);
    }
}

/// `rag stats`.
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let stats = collect_stats(&index, &config.index.persist_directory).await?;
    index.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let db_path = config.index_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("RAG Harness — Index Stats");
    println!("=========================");
    println!();
    println!("  Index:       {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", stats.collection_name);
    println!("  Fragments:   {}", stats.total_chunks);
    if stats.sample_size < stats.total_chunks {
        println!("  (breakdowns over the first {} fragments)", stats.sample_size);
    }
    print_breakdown("source type", &stats.by_source_type);
    print_breakdown("language", &stats.by_language);
    print_breakdown("category", &stats.by_category);
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_harness_core::store::memory::InMemoryIndex;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), (*v).into()))
            .collect()
    }

    #[tokio::test]
    async fn test_collect_stats_histograms() {
        let index = InMemoryIndex::new("docs");
        let ids: Vec<String> = (0..3).map(|i| format!("f{}", i)).collect();
        let vectors = vec![vec![1.0, 0.0]; 3];
        let texts = vec!["t".to_string(); 3];
        let metadatas = vec![
            meta(&[("source_type", "repository"), ("language", "python"), ("file_category", "code")]),
            meta(&[("source_type", "repository"), ("file_category", "configuration")]),
            meta(&[("source_type", "documentation"), ("language", "markdown")]),
        ];
        index.add(&ids, &vectors, &texts, &metadatas).await.unwrap();

        let stats = collect_stats(&index, Path::new("./data/index")).await.unwrap();
        assert_eq!(stats.collection_name, "docs");
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.by_source_type["repository"], 2);
        assert_eq!(stats.by_language["unknown"], 1);
        assert_eq!(stats.by_category["unknown"], 1);
    }

    #[tokio::test]
    async fn test_stats_json_keys() {
        let index = InMemoryIndex::default();
        let stats = collect_stats(&index, Path::new("/var/rag/index")).await.unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_chunks"], 0);
        assert_eq!(json["collection_name"], "documents");
        assert_eq!(json["persist_directory"], "/var/rag/index");
        assert!(json.get("by_category").is_some());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
