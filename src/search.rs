//! Application search entry point.
//!
//! Resolves a [`SearchRequest`] against the configured profiles, runs the
//! core read path over the persistent index, and renders the results for
//! the CLI. The HTTP server shares [`SearchRequest`] and [`execute`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use rag_harness_core::embedding::EmbeddingProvider;
use rag_harness_core::models::{MetaValue, Metadata, SearchResult};
use rag_harness_core::search::{format_sources, search_with_strategy};
use rag_harness_core::store::VectorIndex;
use rag_harness_core::strategy::{strategy_by_name, RetrievalStrategy, STRATEGY_NAMES};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_index::SqliteIndex;

/// A search as issued by the CLI or the HTTP API. Unset fields come from
/// the profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub n_results: Option<usize>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filter: Metadata,
}

/// Settings a request resolves to.
pub struct Resolved {
    pub strategy: Box<dyn RetrievalStrategy>,
    pub n_results: usize,
    pub limit: usize,
}

/// Apply profile defaults and explicit overrides.
///
/// An explicit strategy keeps the profile's category weights. `n_results`
/// is raised to `limit` when it would otherwise be smaller.
pub fn resolve(config: &Config, req: &SearchRequest) -> Result<Resolved> {
    let profile_name = req
        .profile
        .as_deref()
        .unwrap_or(&config.retrieval.default_profile);
    let profile = config
        .retrieval
        .profile(profile_name)
        .with_context(|| format!("Unknown profile: '{}'", profile_name))?;

    let strategy = match req.strategy.as_deref() {
        Some(name) if !STRATEGY_NAMES.contains(&name) => bail!(
            "Unknown strategy: '{}'. Available: {}",
            name,
            STRATEGY_NAMES.join(", ")
        ),
        Some(name) => strategy_by_name(name, &profile.category_weights),
        None => profile.strategy(),
    };

    let limit = req.limit.unwrap_or(profile.limit);
    if limit == 0 {
        bail!("limit must be >= 1");
    }
    let n_results = req.n_results.unwrap_or(profile.n_results).max(limit);

    Ok(Resolved {
        strategy,
        n_results,
        limit,
    })
}

/// Resolve and run `req`.
pub async fn execute(
    config: &Config,
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    req: &SearchRequest,
) -> Result<Vec<SearchResult>> {
    let resolved = resolve(config, req)?;
    let filter = (!req.filter.is_empty()).then_some(&req.filter);
    search_with_strategy(
        index,
        provider,
        &req.query,
        resolved.n_results,
        filter,
        resolved.strategy.as_ref(),
        resolved.limit,
    )
    .await
}

/// Parse `--where key=value` pairs into an exact-match filter.
pub fn parse_where(pairs: &[String]) -> Result<Metadata> {
    let mut filter = Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid KEY=VALUE: no '=' found in '{}'", pair))?;
        if key.is_empty() {
            bail!("invalid KEY=VALUE: empty key in '{}'", pair);
        }
        filter.insert(key.to_string(), MetaValue::parse_for_key(key, value));
    }
    Ok(filter)
}

/// `rag search`.
pub async fn run_search(config: &Config, req: SearchRequest, json: bool) -> Result<()> {
    let provider = create_provider(&config.embedding)?;
    let index = SqliteIndex::open(config).await?;
    let results = execute(config, &index, provider.as_ref(), &req).await?;
    index.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    print!("{}", format_sources(&results));
    println!();
    for (i, result) in results.iter().enumerate() {
        let score = result
            .weighted_score
            .map(|w| format!(" weighted: {:.2}", w))
            .unwrap_or_default();
        println!("{}. [{:.2}{}] {}", i + 1, result.similarity, score, result.id);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.content, 200).replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((at, _)) => format!("{}...", &text[..at]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        toml::from_str("").unwrap()
    }

    #[test]
    fn test_resolve_uses_default_profile() {
        let r = resolve(&config(), &SearchRequest::default()).unwrap();
        assert_eq!(r.strategy.name(), "balanced");
        assert_eq!((r.n_results, r.limit), (15, 5));
    }

    #[test]
    fn test_resolve_overrides() {
        let req = SearchRequest {
            profile: Some("code_assistant".into()),
            strategy: Some("workflow_focused".into()),
            n_results: Some(3),
            limit: Some(4),
            ..SearchRequest::default()
        };
        let r = resolve(&config(), &req).unwrap();
        assert_eq!(r.strategy.name(), "workflow_focused");
        assert_eq!((r.n_results, r.limit), (4, 4));
    }

    #[test]
    fn test_resolve_rejects_unknowns() {
        let bad_profile = SearchRequest {
            profile: Some("nobody".into()),
            ..SearchRequest::default()
        };
        assert!(resolve(&config(), &bad_profile).is_err());

        let bad_strategy = SearchRequest {
            strategy: Some("random".into()),
            ..SearchRequest::default()
        };
        assert!(resolve(&config(), &bad_strategy).is_err());
    }

    #[test]
    fn test_parse_where() {
        let f = parse_where(&["repo_name=tool".into(), "chunk_index=2".into()]).unwrap();
        assert_eq!(f["repo_name"], MetaValue::Str("tool".into()));
        assert_eq!(f["chunk_index"], MetaValue::Int(2));

        let f = parse_where(&["repo_name=2024".into()]).unwrap();
        assert_eq!(f["repo_name"], MetaValue::Str("2024".into()));
        assert!(parse_where(&["novalue".into()]).is_err());
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé...");
        assert_eq!(excerpt("short", 10), "short");
    }
}
