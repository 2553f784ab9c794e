//! Pre-scraped documentation directory reader.
//!
//! Every `*.md` file directly inside the directory becomes one
//! [`SourceDocument`]. Scraped pages start with a `Source: <url>` line,
//! which is recorded as `source_url`.

use anyhow::{bail, Context, Result};
use std::path::Path;

use rag_harness_core::categorize::{self, Category};
use rag_harness_core::filter::ContentFilter;
use rag_harness_core::models::{keys, MetaValue, Metadata, SourceDocument};

/// Lines searched for the `Source:` header.
const SOURCE_HEADER_LINES: usize = 10;

pub const SOURCE_URL_KEY: &str = "source_url";

/// `Source: <url>` from the first lines of a page, `"Unknown"` when absent.
pub fn source_url(content: &str) -> String {
    content
        .lines()
        .take(SOURCE_HEADER_LINES)
        .find_map(|line| line.strip_prefix("Source:"))
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn doc_metadata(path: &Path, content: &str) -> Metadata {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut m = Metadata::new();
    m.insert(keys::SOURCE_FILE.into(), file_name.clone().into());
    m.insert(keys::FILE_NAME.into(), file_name.into());
    m.insert(keys::FILE_TYPE.into(), ".md".into());
    m.insert(
        keys::FILE_CATEGORY.into(),
        Category::Documentation.as_str().into(),
    );
    m.insert(keys::MIME_TYPE.into(), categorize::mime_type(path).into());
    m.insert(keys::SOURCE_TYPE.into(), "documentation".into());
    m.insert(keys::LANGUAGE.into(), "markdown".into());
    m.insert(SOURCE_URL_KEY.into(), source_url(content).into());
    m.insert(
        keys::FILE_SIZE.into(),
        MetaValue::from(content.chars().count()),
    );
    m
}

/// Read every markdown page in `dir`, sorted by file name. Pages the
/// filter rejects are skipped.
pub fn read_docs_dir(dir: &Path, filter: &ContentFilter) -> Result<Vec<SourceDocument>> {
    if !dir.is_dir() {
        bail!("Documentation directory does not exist: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "md"))
        .collect();
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "error reading page");
                continue;
            }
        };
        if let Err(reason) = filter.check_content(&content) {
            tracing::debug!(file = %path.display(), ?reason, "skipped");
            continue;
        }

        let metadata = doc_metadata(&path, &content);
        docs.push(SourceDocument {
            category: Category::Documentation.as_str().to_string(),
            language: Some("markdown".to_string()),
            mime_type: categorize::mime_type(&path).to_string(),
            size_bytes: content.len() as u64,
            text: content,
            metadata,
        });
    }

    Ok(docs)
}
