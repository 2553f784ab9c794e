//! Repository acquisition and file extraction.
//!
//! A repository spec is either a local directory (used in place) or a git
//! URL, cloned into `repos_dir/<repo_name>` on first use and pulled on
//! later runs. A failed pull is logged and the existing checkout is used.
//!
//! [`extract_files`] walks a checkout and turns every eligible file into a
//! [`SourceDocument`] carrying the file-level metadata shared by all of
//! its fragments.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use rag_harness_core::categorize::{self, Category};
use rag_harness_core::filter::{looks_binary, ContentFilter, Rejection};
use rag_harness_core::models::{keys, MetaValue, Metadata, SourceDocument};

/// Derive the repository name from a URL or path: last segment, trailing
/// `/` and `.git` removed.
pub fn repo_name(spec: &str) -> String {
    let trimmed = spec.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':', '\\'])
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

fn is_remote(spec: &str) -> bool {
    spec.contains("://") || spec.starts_with("git@")
}

/// Resolve a spec to a local checkout, cloning or pulling as needed.
/// Returns `(repo_name, path)`.
///
/// Local paths are canonicalized first, so `.` is named after the
/// directory it points at.
pub fn acquire(spec: &str, repos_dir: &Path) -> Result<(String, PathBuf)> {
    if !is_remote(spec) {
        let path = PathBuf::from(spec);
        if !path.is_dir() {
            bail!("Repository path does not exist or is not a directory: {}", spec);
        }
        let canonical = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve repository path: {}", spec))?;
        let name = repo_name(&canonical.to_string_lossy());
        if name.is_empty() {
            bail!("Cannot derive a repository name from '{}'", spec);
        }
        return Ok((name, path));
    }

    let name = repo_name(spec);
    if name.is_empty() {
        bail!("Cannot derive a repository name from '{}'", spec);
    }

    let dest = repos_dir.join(&name);
    if dest.join(".git").exists() {
        tracing::info!(repo = %name, "updating existing repository");
        if let Err(e) = git_pull(&dest) {
            tracing::warn!(repo = %name, error = %e, "could not update repository, using existing checkout");
        }
    } else {
        tracing::info!(repo = %name, url = spec, "cloning repository");
        git_clone(spec, &dest)?;
    }
    Ok((name, dest))
}

fn git_clone(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create repos directory: {}", parent.display()))?;
    }

    let output = Command::new("git")
        .arg("clone")
        .arg(url)
        .arg(dest)
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

fn git_pull(repo_dir: &Path) -> Result<()> {
    let output = Command::new("git")
        .args(["pull", "--ff-only"])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git pull'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git pull failed: {}", stderr.trim());
    }

    Ok(())
}

/// Options for [`extract_files`].
pub struct ExtractOptions<'a> {
    pub filter: &'a ContentFilter,
    pub include_categories: &'a [Category],
    pub max_file_bytes: u64,
}

/// Counts of files skipped during extraction, by reason.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSkips {
    pub filtered: usize,
    pub excluded_category: usize,
    pub too_large: usize,
    pub unreadable: usize,
}

/// File-level metadata for `relative` inside repository `repo`.
pub fn file_metadata(repo: &str, relative: &Path, category: Category, size_chars: usize) -> Metadata {
    let mut m = Metadata::new();
    let source_file = relative.to_string_lossy().replace('\\', "/");
    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let directory = relative
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());

    m.insert(keys::SOURCE_FILE.into(), source_file.into());
    m.insert(keys::FILE_NAME.into(), file_name.into());
    m.insert(
        keys::FILE_TYPE.into(),
        categorize::suffix(relative)
            .unwrap_or_else(|| "no_extension".to_string())
            .into(),
    );
    m.insert(keys::FILE_CATEGORY.into(), category.as_str().into());
    m.insert(keys::MIME_TYPE.into(), categorize::mime_type(relative).into());
    m.insert(keys::REPO_NAME.into(), repo.into());
    m.insert(keys::SOURCE_TYPE.into(), "repository".into());
    if let Some(language) = categorize::language(relative) {
        m.insert(keys::LANGUAGE.into(), language.into());
    }
    m.insert(keys::DIRECTORY.into(), directory.into());
    m.insert(keys::FILE_SIZE.into(), MetaValue::from(size_chars));
    m
}

/// Walk `root` and return every eligible file as a [`SourceDocument`],
/// sorted by relative path.
pub fn extract_files(
    repo: &str,
    root: &Path,
    opts: &ExtractOptions<'_>,
) -> Result<(Vec<SourceDocument>, ExtractSkips)> {
    let mut docs = Vec::new();
    let mut skips = ExtractSkips::default();

    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| {
        // prune denylisted directories without descending into them
        e.depth() == 0
            || !e.file_type().is_dir()
            || opts
                .filter
                .check_path(&e.path().strip_prefix(root).unwrap_or(e.path()).join("_"))
                != Err(Rejection::ExcludedDirectory)
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to walk {}", root.display()));
            }
            Err(e) => {
                tracing::warn!(repo, error = %e, "skipping unreadable entry");
                skips.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if let Err(reason) = opts.filter.check_path(relative) {
            tracing::debug!(file = %relative.display(), ?reason, "skipped");
            skips.filtered += 1;
            continue;
        }

        let category = categorize::category(relative);
        if !opts.include_categories.contains(&category) {
            skips.excluded_category += 1;
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > opts.max_file_bytes {
            tracing::debug!(file = %relative.display(), size, "skipped, too large");
            skips.too_large += 1;
            continue;
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "error reading file");
                skips.unreadable += 1;
                continue;
            }
        };
        if looks_binary(&bytes) {
            tracing::debug!(file = %relative.display(), reason = ?Rejection::BinaryContent, "skipped");
            skips.filtered += 1;
            continue;
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();

        if let Err(reason) = opts.filter.check_content(&text) {
            tracing::debug!(file = %relative.display(), ?reason, "skipped");
            skips.filtered += 1;
            continue;
        }

        let metadata = file_metadata(repo, relative, category, text.chars().count());
        docs.push(SourceDocument {
            category: category.as_str().to_string(),
            language: categorize::language(relative).map(str::to_string),
            mime_type: categorize::mime_type(relative).to_string(),
            size_bytes: size,
            text,
            metadata,
        });
    }

    Ok((docs, skips))
}

/// Read a repos file: one spec per line, blank lines and `#` comments
/// ignored.
pub fn read_repos_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read repos file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}
