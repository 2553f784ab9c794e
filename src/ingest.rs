//! Ingestion orchestration.
//!
//! Repository flow: acquire → extract files → chunk → assign ids →
//! idempotent batched write. Documentation flow: read pages → chunk →
//! per-file-stem ids → the same write path.
//!
//! Repositories are processed one at a time. A repository that fails to
//! clone or walk is recorded in [`IngestStats::failed_repos`] and the run
//! moves on.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rag_harness_core::batch::{add_fragments, AddReport};
use rag_harness_core::categorize::Category;
use rag_harness_core::chunk::chunk;
use rag_harness_core::embedding::EmbeddingProvider;
use rag_harness_core::filter::ContentFilter;
use rag_harness_core::identity::{assign, IdScheme};
use rag_harness_core::models::{Fragment, SourceDocument};
use rag_harness_core::store::VectorIndex;

use crate::config::Config;
use crate::docs;
use crate::embedding::create_provider;
use crate::repo::{self, ExtractOptions};
use crate::sqlite_index::SqliteIndex;

/// Statistics for one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub repos_requested: usize,
    pub repos_processed: usize,
    pub files_extracted: usize,
    pub fragments_created: usize,
    pub files_by_category: BTreeMap<String, usize>,
    pub files_by_language: BTreeMap<String, usize>,
    /// `(repository spec, error message)`.
    pub failed_repos: Vec<(String, String)>,
    pub skipped_existing: usize,
    pub fragments_added: usize,
    pub failed_batches: usize,
    pub failed_fragments: usize,
}

impl IngestStats {
    fn record_documents(&mut self, docs: &[SourceDocument]) {
        self.files_extracted += docs.len();
        for doc in docs {
            *self
                .files_by_category
                .entry(doc.category.clone())
                .or_insert(0) += 1;
            let language = doc.language.as_deref().unwrap_or("unknown");
            *self
                .files_by_language
                .entry(language.to_string())
                .or_insert(0) += 1;
        }
    }

    fn record_write(&mut self, report: &AddReport) {
        self.skipped_existing += report.skipped_existing;
        self.fragments_added += report.batches.added;
        self.failed_batches += report.batches.error_count;
        self.failed_fragments += report.batches.failed_fragments;
    }
}

/// Chunk every document and assign ids under `scheme`.
pub fn fragments_for(docs: &[SourceDocument], scheme: IdScheme) -> Vec<Fragment> {
    docs.iter()
        .flat_map(|doc| chunk(&doc.text, &doc.metadata))
        .map(|candidate| assign(candidate, scheme))
        .collect()
}

/// Repository specs from the command line, or from config (`repos` plus
/// `repos_file`) when none were given.
pub fn repo_specs(config: &Config, cli_specs: &[String]) -> Result<Vec<String>> {
    if !cli_specs.is_empty() {
        return Ok(cli_specs.to_vec());
    }
    let mut specs = config.ingest.repos.clone();
    if let Some(path) = &config.ingest.repos_file {
        specs.extend(repo::read_repos_file(path)?);
    }
    Ok(specs)
}

fn parse_categories(names: &[String]) -> Result<Vec<Category>> {
    names
        .iter()
        .map(|n| Category::parse(n).with_context(|| format!("Unknown category: '{}'", n)))
        .collect()
}

fn content_filter(config: &Config) -> Result<ContentFilter> {
    ContentFilter::new(
        config.chunking.min_content_chars,
        &config.ingest.exclude_globs,
    )
    .with_context(|| "Invalid ingest.exclude_globs")
}

/// Ingest repositories into `index`.
pub async fn ingest_repos(
    config: &Config,
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    specs: &[String],
    categories: &[Category],
) -> Result<IngestStats> {
    let filter = content_filter(config)?;
    let opts = ExtractOptions {
        filter: &filter,
        include_categories: categories,
        max_file_bytes: config.chunking.max_file_bytes,
    };

    let mut stats = IngestStats {
        repos_requested: specs.len(),
        ..IngestStats::default()
    };

    for spec in specs {
        let extracted = repo::acquire(spec, &config.ingest.repos_dir)
            .and_then(|(name, path)| repo::extract_files(&name, &path, &opts).map(|r| (name, r)));
        let (name, (documents, skips)) = match extracted {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(repo = %spec, error = %e, "repository failed");
                stats.failed_repos.push((spec.clone(), format!("{:#}", e)));
                continue;
            }
        };

        tracing::info!(
            repo = %name,
            files = documents.len(),
            filtered = skips.filtered,
            excluded_category = skips.excluded_category,
            too_large = skips.too_large,
            "extracted files"
        );
        stats.record_documents(&documents);

        let fragments = fragments_for(&documents, IdScheme::Repository);
        stats.fragments_created += fragments.len();

        let report = add_fragments(index, provider, fragments, config.embedding.batch_size).await?;
        stats.record_write(&report);
        stats.repos_processed += 1;
    }

    Ok(stats)
}

/// Ingest the markdown pages under `dir` into `index`.
pub async fn ingest_docs(
    config: &Config,
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    dir: &Path,
) -> Result<IngestStats> {
    let filter = content_filter(config)?;
    let documents = docs::read_docs_dir(dir, &filter)?;

    let mut stats = IngestStats::default();
    stats.record_documents(&documents);

    let fragments = fragments_for(&documents, IdScheme::FileStem);
    stats.fragments_created = fragments.len();

    let report = add_fragments(index, provider, fragments, config.embedding.batch_size).await?;
    stats.record_write(&report);
    Ok(stats)
}

/// `rag ingest repos`.
pub async fn run_ingest_repos(
    config: &Config,
    cli_specs: &[String],
    cli_categories: &[String],
) -> Result<()> {
    let specs = repo_specs(config, cli_specs)?;
    let categories = if cli_categories.is_empty() {
        parse_categories(&config.ingest.include_categories)?
    } else {
        parse_categories(cli_categories)?
    };

    if specs.is_empty() {
        println!("No repositories to ingest. Pass them as arguments or set ingest.repos.");
        return Ok(());
    }

    let provider = create_provider(&config.embedding)?;
    let index = SqliteIndex::open(config).await?;
    let stats = ingest_repos(config, &index, provider.as_ref(), &specs, &categories).await?;

    println!("ingest repos");
    print_stats(&stats);
    println!("  total in index: {}", index.count().await?);
    println!("ok");

    index.close().await;
    Ok(())
}

/// `rag ingest docs`.
pub async fn run_ingest_docs(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.ingest.docs_dir.clone());
    let provider = create_provider(&config.embedding)?;
    let index = SqliteIndex::open(config).await?;
    let stats = ingest_docs(config, &index, provider.as_ref(), &dir).await?;

    println!("ingest docs {}", dir.display());
    print_stats(&stats);
    println!("  total in index: {}", index.count().await?);
    println!("ok");

    index.close().await;
    Ok(())
}

fn print_histogram(title: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!("  {}:", title);
    for (key, n) in counts {
        println!("    {}: {}", key, n);
    }
}

pub fn print_stats(stats: &IngestStats) {
    if stats.repos_requested > 0 {
        println!(
            "  repositories: {} of {}",
            stats.repos_processed, stats.repos_requested
        );
    }
    println!("  files extracted: {}", stats.files_extracted);
    println!("  fragments created: {}", stats.fragments_created);
    print_histogram("files by category", &stats.files_by_category);
    print_histogram("files by language", &stats.files_by_language);
    println!("  already indexed: {}", stats.skipped_existing);
    println!("  fragments added: {}", stats.fragments_added);
    if stats.failed_batches > 0 {
        println!(
            "  failed batches: {} ({} fragments)",
            stats.failed_batches, stats.failed_fragments
        );
    }
    for (spec, error) in &stats.failed_repos {
        println!("  failed: {} ({})", spec, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_harness_core::models::{keys, Metadata};

    fn doc(text: &str, file: &str, category: &str, language: Option<&str>) -> SourceDocument {
        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE_FILE.into(), file.into());
        metadata.insert(keys::FILE_NAME.into(), file.into());
        metadata.insert(keys::FILE_CATEGORY.into(), category.into());
        metadata.insert(keys::REPO_NAME.into(), "r".into());
        SourceDocument {
            text: text.to_string(),
            category: category.to_string(),
            language: language.map(str::to_string),
            mime_type: "text/plain".to_string(),
            size_bytes: text.len() as u64,
            metadata,
        }
    }

    #[test]
    fn test_record_documents_histograms() {
        let mut stats = IngestStats::default();
        stats.record_documents(&[
            doc("a", "a.py", "code", Some("python")),
            doc("b", "b.py", "code", Some("python")),
            doc("c", "c.md", "documentation", None),
        ]);
        assert_eq!(stats.files_extracted, 3);
        assert_eq!(stats.files_by_category["code"], 2);
        assert_eq!(stats.files_by_language["python"], 2);
        assert_eq!(stats.files_by_language["unknown"], 1);
    }

    #[test]
    fn test_fragments_for_assigns_scheme() {
        let docs = [doc("some readable body text", "guide.md", "documentation", None)];
        let repo = fragments_for(&docs, IdScheme::Repository);
        let stem = fragments_for(&docs, IdScheme::FileStem);
        assert_eq!(repo.len(), 1);
        assert!(repo[0].id.starts_with("repo_"));
        assert!(stem[0].id.starts_with("guide_"));
    }

    #[test]
    fn test_cli_specs_override_config() {
        let mut config: Config = toml::from_str("").unwrap();
        config.ingest.repos = vec!["https://x/a.git".into()];
        assert_eq!(repo_specs(&config, &[]).unwrap(), vec!["https://x/a.git"]);
        assert_eq!(
            repo_specs(&config, &["./b".to_string()]).unwrap(),
            vec!["./b"]
        );
    }

    #[test]
    fn test_parse_categories_rejects_unknown() {
        assert!(parse_categories(&["code".into(), "nope".into()]).is_err());
    }
}
