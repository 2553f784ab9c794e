//! Stable fragment identifiers.
//!
//! An id is a SHA-256 digest over `(repo_name, source_file, chunk_index,
//! first 500 chars of text)`, so re-ingesting unchanged content yields the
//! same id in any process. Two namespaces exist:
//!
//! - repository fragments: `repo_<64 hex>`
//! - documentation fragments: `<file stem>_<16 hex>`

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::models::{keys, meta_str, Fragment, FragmentCandidate};

/// Number of leading characters of the text that contribute to the id.
pub const ID_TEXT_PREFIX_CHARS: usize = 500;

const DELIMITER: &str = "\u{1f}";

/// Id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    Repository,
    /// Per-file stem scheme used for documentation directories.
    FileStem,
}

fn digest_hex(repo_name: &str, source_file: &str, chunk_index: i64, text: &str) -> String {
    let prefix: String = text.chars().take(ID_TEXT_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(repo_name.as_bytes());
    hasher.update(DELIMITER.as_bytes());
    hasher.update(source_file.as_bytes());
    hasher.update(DELIMITER.as_bytes());
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.update(DELIMITER.as_bytes());
    hasher.update(prefix.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `derive_id(repo_name, source_file, chunk_index, text)` in the repository
/// namespace.
pub fn derive_id(repo_name: &str, source_file: &str, chunk_index: i64, text: &str) -> String {
    format!(
        "repo_{}",
        digest_hex(repo_name, source_file, chunk_index, text)
    )
}

/// Documentation-namespace id: `<stem>_<first 16 hex chars>`.
pub fn derive_doc_id(source_file: &str, chunk_index: i64, text: &str) -> String {
    let stem = Path::new(source_file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "doc".to_string());
    let hex = digest_hex("", source_file, chunk_index, text);
    format!("{}_{}", stem, &hex[..16])
}

/// Assign an id to a chunker candidate using the given scheme.
pub fn assign(candidate: FragmentCandidate, scheme: IdScheme) -> Fragment {
    let source_file = meta_str(&candidate.metadata, keys::SOURCE_FILE);
    let index = candidate.chunk_index();
    let id = match scheme {
        IdScheme::Repository => derive_id(
            meta_str(&candidate.metadata, keys::REPO_NAME),
            source_file,
            index,
            &candidate.text,
        ),
        IdScheme::FileStem => derive_doc_id(source_file, index, &candidate.text),
    };
    Fragment {
        id,
        text: candidate.text,
        metadata: candidate.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetaValue, Metadata};

    #[test]
    fn test_deterministic_and_prefixed() {
        let a = derive_id("repo-a", "src/main.py", 0, "print('hello')");
        let b = derive_id("repo-a", "src/main.py", 0, "print('hello')");
        assert_eq!(a, b);
        assert!(a.starts_with("repo_"));
        assert_eq!(a.len(), "repo_".len() + 64);
    }

    #[test]
    fn test_each_component_matters() {
        let base = derive_id("r", "f.py", 0, "text");
        assert_ne!(base, derive_id("r2", "f.py", 0, "text"));
        assert_ne!(base, derive_id("r", "g.py", 0, "text"));
        assert_ne!(base, derive_id("r", "f.py", 1, "text"));
        assert_ne!(base, derive_id("r", "f.py", 0, "text!"));
    }

    #[test]
    fn test_identical_text_in_different_repos_coexists() {
        let boilerplate = "Licensed under the Apache License, Version 2.0";
        assert_ne!(
            derive_id("alpha", "NOTICE.md", 0, boilerplate),
            derive_id("beta", "NOTICE.md", 0, boilerplate)
        );
    }

    #[test]
    fn test_only_prefix_of_text_is_hashed() {
        let head = "x".repeat(ID_TEXT_PREFIX_CHARS);
        let a = format!("{}tail one", head);
        let b = format!("{}tail two", head);
        assert_eq!(derive_id("r", "f", 0, &a), derive_id("r", "f", 0, &b));
    }

    #[test]
    fn test_components_do_not_run_together() {
        assert_ne!(derive_id("ab", "c", 0, "t"), derive_id("a", "bc", 0, "t"));
    }

    #[test]
    fn test_doc_id_uses_stem() {
        let id = derive_doc_id("getting-started.md", 3, "Install the tool.");
        assert!(id.starts_with("getting-started_"));
        assert_eq!(id.len(), "getting-started_".len() + 16);
    }

    #[test]
    fn test_assign_reads_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert(keys::REPO_NAME.into(), MetaValue::from("r"));
        metadata.insert(keys::SOURCE_FILE.into(), MetaValue::from("a.py"));
        metadata.insert(keys::CHUNK_INDEX.into(), MetaValue::Int(2));
        let candidate = FragmentCandidate {
            text: "body".into(),
            metadata,
        };
        let fragment = assign(candidate, IdScheme::Repository);
        assert_eq!(fragment.id, derive_id("r", "a.py", 2, "body"));
    }
}
