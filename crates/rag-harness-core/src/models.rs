//! Core data models that flow through the ingestion and retrieval pipeline.
//!
//! A [`SourceDocument`] is a whole file or scraped page before chunking. The
//! chunker turns it into [`FragmentCandidate`]s, which become [`Fragment`]s
//! once they have a stable id. Queries produce [`SearchResult`]s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known metadata keys.
pub mod keys {
    pub const SOURCE_FILE: &str = "source_file";
    pub const FILE_NAME: &str = "file_name";
    pub const FILE_TYPE: &str = "file_type";
    pub const FILE_CATEGORY: &str = "file_category";
    pub const FILE_SIZE: &str = "file_size";
    pub const MIME_TYPE: &str = "mime_type";
    pub const LANGUAGE: &str = "language";
    pub const DIRECTORY: &str = "directory";
    pub const REPO_NAME: &str = "repo_name";
    pub const SOURCE_TYPE: &str = "source_type";
    pub const SOURCE_URL: &str = "source_url";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const CHUNKING_STRATEGY: &str = "chunking_strategy";
    pub const CHUNK_TYPE: &str = "chunk_type";
    pub const ELEMENT_TYPE: &str = "element_type";
    pub const ELEMENT_NAME: &str = "element_name";

    /// Keys whose values are written as integers.
    pub const INTEGER: &[&str] = &[CHUNK_INDEX, TOTAL_CHUNKS, FILE_SIZE];
}

/// A scalar metadata value.
///
/// Metadata is deliberately flat: only strings, integers, floats, and
/// booleans are allowed so that every key can be used in an exact-match
/// filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Parse a command-line value for `key`, typed the way the pipeline
    /// writes that key. Only [`keys::INTEGER`] keys become integers, so
    /// `repo_name=2024` still matches the stored string `"2024"`.
    pub fn parse_for_key(key: &str, raw: &str) -> Self {
        if keys::INTEGER.contains(&key) {
            if let Ok(i) = raw.parse::<i64>() {
                return MetaValue::Int(i);
            }
        }
        MetaValue::Str(raw.to_string())
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Int(i) => write!(f, "{}", i),
            MetaValue::Float(x) => write!(f, "{}", x),
            MetaValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

impl From<usize> for MetaValue {
    fn from(i: usize) -> Self {
        MetaValue::Int(i as i64)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// Ordered string-keyed scalar metadata. Also used as an exact-match
/// conjunctive filter.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Look up a string-valued metadata key, returning `""` when it is absent
/// or not a string.
pub fn meta_str<'a>(metadata: &'a Metadata, key: &str) -> &'a str {
    metadata.get(key).and_then(MetaValue::as_str).unwrap_or("")
}

/// An entire file or scraped page before chunking. Never persisted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Raw text content.
    pub text: String,
    /// Derived category, e.g. `code`.
    pub category: String,
    /// Derived language tag, `None` when undetermined.
    pub language: Option<String>,
    /// MIME hint, `unknown` when undetermined.
    pub mime_type: String,
    pub size_bytes: u64,
    /// File-level metadata shared by every fragment of this document.
    pub metadata: Metadata,
}

/// Output of the chunker: text plus fragment-level metadata, no id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentCandidate {
    pub text: String,
    pub metadata: Metadata,
}

impl FragmentCandidate {
    pub fn chunk_index(&self) -> i64 {
        self.metadata
            .get(keys::CHUNK_INDEX)
            .and_then(MetaValue::as_i64)
            .unwrap_or(0)
    }
}

/// The atomic indexed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A fragment paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// `1 - cosine_distance`. Not clamped: can be slightly negative.
    pub similarity: f64,
    /// Set by strategies that rescale the similarity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
}

impl SearchResult {
    pub fn category(&self) -> &str {
        meta_str(&self.metadata, keys::FILE_CATEGORY)
    }

    pub fn language(&self) -> &str {
        meta_str(&self.metadata, keys::LANGUAGE)
    }

    pub fn source_file(&self) -> &str {
        meta_str(&self.metadata, keys::SOURCE_FILE)
    }

    pub fn repo_name(&self) -> &str {
        meta_str(&self.metadata, keys::REPO_NAME)
    }
}
