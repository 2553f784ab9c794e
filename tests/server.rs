//! HTTP API tests against a router bound to an ephemeral port.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use rag_harness::config::Config;
use rag_harness::embedding::DisabledProvider;
use rag_harness::server::{router, AppState};
use rag_harness_core::batch::embed_and_store;
use rag_harness_core::embedding::EmbeddingProvider;
use rag_harness_core::models::{keys, Fragment, Metadata};
use rag_harness_core::store::memory::InMemoryIndex;
use rag_harness_core::store::VectorIndex;

/// One dimension per known word.
struct KeywordEmbedder;

const WORDS: &[&str] = &["workflow", "alignment", "billing", "config"];

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        WORDS.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                WORDS
                    .iter()
                    .map(|w| t.matches(w).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }
}

/// Fails every call with a message that happens to mention "disabled".
struct OutageEmbedder;

#[async_trait]
impl EmbeddingProvider for OutageEmbedder {
    fn model_name(&self) -> &str {
        "outage"
    }
    fn dims(&self) -> usize {
        WORDS.len()
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("upstream account disabled by billing")
    }
}

fn fragment(id: &str, text: &str, category: &str, repo: &str) -> Fragment {
    let mut metadata = Metadata::new();
    metadata.insert(keys::FILE_CATEGORY.into(), category.into());
    metadata.insert(keys::REPO_NAME.into(), repo.into());
    metadata.insert(keys::SOURCE_FILE.into(), format!("{}.md", id).into());
    Fragment {
        id: id.to_string(),
        text: text.to_string(),
        metadata,
    }
}

async fn spawn(provider: Arc<dyn EmbeddingProvider>) -> String {
    let config: Config = toml::from_str("[embedding]\nprovider = \"disabled\"").unwrap();
    let index = Arc::new(InMemoryIndex::default());
    embed_and_store(
        index.as_ref(),
        &KeywordEmbedder,
        &[
            fragment("run", "workflow workflow guide", "documentation", "docs"),
            fragment("align", "alignment workflow code", "code", "tools"),
            fragment("bill", "billing config", "configuration", "tools"),
        ],
        10,
    )
    .await
    .unwrap();

    let index: Arc<dyn VectorIndex> = index;
    let app = router(AppState::new(config, index, provider));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_and_stats() {
    let base = spawn(Arc::new(KeywordEmbedder)).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let stats: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_chunks"], 3);
    assert_eq!(stats["collection_name"], "documents");
    assert!(stats["persist_directory"].is_string());
    assert_eq!(stats["by_category"]["code"], 1);
}

#[tokio::test]
async fn test_search_with_filter_and_limit() {
    let base = spawn(Arc::new(KeywordEmbedder)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({
            "query": "workflow",
            "strategy": "code_focused",
            "limit": 1,
            "filter": { "repo_name": "tools" }
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["strategy"], "code_focused");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "align");
    assert!(body["sources"].as_str().unwrap().starts_with("1. tools/align.md"));
    assert!(body["context"].as_str().unwrap().contains("[Source 1: tools/align.md (code)"));
}

#[tokio::test]
async fn test_search_errors() {
    let base = spawn(Arc::new(KeywordEmbedder)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "workflow", "profile": "nobody" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let disabled = spawn(Arc::new(DisabledProvider)).await;
    let resp = client
        .post(format!("{}/search", disabled))
        .json(&json!({ "query": "workflow" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "embeddings_disabled");
}

#[tokio::test]
async fn test_provider_failure_is_internal() {
    let base = spawn(Arc::new(OutageEmbedder)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/search", base))
        .json(&json!({ "query": "workflow" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("disabled by billing"));
}
