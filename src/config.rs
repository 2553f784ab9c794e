//! TOML configuration.
//!
//! [`load_config`] reads, parses, and validates the file in one step and
//! fails fast on anything that would otherwise surface mid-run.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rag_harness_core::batch::DEFAULT_BATCH_SIZE;
use rag_harness_core::categorize::Category;
use rag_harness_core::filter::DEFAULT_MIN_CONTENT_CHARS;
use rag_harness_core::strategy::{builtin_profiles, Profile, STRATEGY_NAMES};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist_directory: default_persist_directory(),
            collection: default_collection(),
        }
    }
}

fn default_persist_directory() -> PathBuf {
    PathBuf::from("./data/index")
}
fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_min_content_chars() -> usize {
    DEFAULT_MIN_CONTENT_CHARS
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ollama base URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Repository URLs or local paths.
    #[serde(default)]
    pub repos: Vec<String>,
    /// Optional file with one repository per line; `#` starts a comment.
    #[serde(default)]
    pub repos_file: Option<PathBuf>,
    #[serde(default = "default_include_categories")]
    pub include_categories: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            repos_dir: default_repos_dir(),
            docs_dir: default_docs_dir(),
            repos: Vec::new(),
            repos_file: None,
            include_categories: default_include_categories(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("./data/repositories")
}
fn default_docs_dir() -> PathBuf {
    PathBuf::from("./data/documents")
}
fn default_include_categories() -> Vec<String> {
    vec![
        "documentation".to_string(),
        "code".to_string(),
        "configuration".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_profile")]
    pub default_profile: String,
    /// Overrides and additions on top of the built-in profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_profile: default_profile(),
            profiles: BTreeMap::new(),
        }
    }
}

fn default_profile() -> String {
    "qa_agent".to_string()
}

impl RetrievalConfig {
    /// Built-in profiles with configured ones layered on top.
    pub fn all_profiles(&self) -> BTreeMap<String, Profile> {
        let mut all = builtin_profiles();
        all.extend(self.profiles.clone());
        all
    }

    pub fn profile(&self, name: &str) -> Option<Profile> {
        self.all_profiles().remove(name)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Absolute-or-relative path of the SQLite file inside the persist
    /// directory.
    pub fn index_path(&self) -> PathBuf {
        self.index.persist_directory.join("index.sqlite")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.index.collection.trim().is_empty() {
        bail!("index.collection must not be empty");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.provider == "local" && config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when provider is 'local'");
    }

    // Validate ingest
    for category in &config.ingest.include_categories {
        if Category::parse(category).is_none() {
            bail!(
                "Unknown category in ingest.include_categories: '{}'",
                category
            );
        }
    }

    // Validate retrieval
    let profiles = config.retrieval.all_profiles();
    if !profiles.contains_key(&config.retrieval.default_profile) {
        bail!(
            "retrieval.default_profile '{}' is not a known profile",
            config.retrieval.default_profile
        );
    }
    for (name, profile) in &config.retrieval.profiles {
        if profile.limit < 1 {
            bail!("retrieval.profiles.{}.limit must be >= 1", name);
        }
        if profile.n_results < profile.limit {
            bail!("retrieval.profiles.{}.n_results must be >= limit", name);
        }
        if !STRATEGY_NAMES.contains(&profile.strategy.as_str()) {
            tracing::warn!(
                profile = %name,
                strategy = %profile.strategy,
                "unknown strategy, results will be truncated in original order"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.index.collection, "documents");
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.chunking.min_content_chars, 50);
        assert_eq!(config.retrieval.default_profile, "qa_agent");
        assert_eq!(config.index_path(), PathBuf::from("./data/index/index.sqlite"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let err = parse("[embedding]\nprovider = \"disabled\"\nbatch_size = 0").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\ndims = 8").is_err());
        assert!(parse("[embedding]\nprovider = \"ollama\"\nmodel = \"m\"").is_err());
        assert!(parse("[embedding]\nprovider = \"ollama\"\nmodel = \"m\"\ndims = 8").is_ok());
        assert!(parse("[embedding]\nprovider = \"cohere\"").is_err());
    }

    #[test]
    fn test_profile_override_and_validation() {
        let config = parse(
            r#"
[retrieval]
default_profile = "terse"

[retrieval.profiles.terse]
strategy = "code_focused"
n_results = 4
limit = 2

[retrieval.profiles.qa_agent]
strategy = "balanced"
n_results = 30
limit = 3
category_weights = { documentation = 1.0 }
"#,
        )
        .unwrap();
        let qa = config.retrieval.profile("qa_agent").unwrap();
        assert_eq!(qa.n_results, 30);
        assert!(config.retrieval.profile("workflow_agent").is_some());

        let bad = parse(
            "[retrieval.profiles.x]\nstrategy = \"balanced\"\nn_results = 1\nlimit = 2",
        );
        assert!(bad.is_err());
        assert!(parse("[retrieval]\ndefault_profile = \"nobody\"").is_err());
    }

    #[test]
    fn test_rejects_unknown_category() {
        assert!(parse("[ingest]\ninclude_categories = [\"code\", \"binary\"]").is_err());
    }
}
