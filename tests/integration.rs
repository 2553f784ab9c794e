use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rag"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("alpha.md"),
        "Source: https://docs.example.org/alpha\n\n# Alpha\n\nRunning a workflow on the cluster requires a configured backend and credentials.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("glossary.md"),
        "# Glossary\n\n## Task\nA single unit of work with inputs, a command, and outputs.\n\n## Workflow\nA graph of tasks connected by their inputs and outputs.",
    )
    .unwrap();
    fs::write(docs_dir.join("stub.md"), "too short").unwrap();

    let config_content = format!(
        r#"[index]
persist_directory = "{root}/data/index"
collection = "documents"

[embedding]
provider = "disabled"
batch_size = 2

[ingest]
docs_dir = "{root}/docs"
repos_dir = "{root}/data/repositories"

[server]
bind = "127.0.0.1:7399"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/index/index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_rag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_rag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rag(&config_path, &["stats", "--json"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_chunks"], 0);
    assert_eq!(stats["collection_name"], "documents");
    assert!(stats["persist_directory"]
        .as_str()
        .unwrap()
        .ends_with("data/index"));
}

#[test]
fn test_ingest_docs_with_disabled_provider_completes() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rag(&config_path, &["ingest", "docs"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    // stub.md is below the size threshold
    assert!(stdout.contains("files extracted: 2"));
    assert!(stdout.contains("fragments added: 0"));
    assert!(stdout.contains("failed batches:"));
    assert!(stdout.contains("total in index: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_clear_requires_confirmation() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_rag(&config_path, &["clear"]);
    assert!(!success, "clear without --yes should fail");

    let (stdout, stderr, success) = run_rag(&config_path, &["clear", "--yes"]);
    assert!(success, "clear failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Cleared collection 'documents'"));
}

#[test]
fn test_delete_repo_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rag(&config_path, &["delete-repo", "nothing"]);
    assert!(success);
    assert!(stdout.contains("No fragments found"));
}

#[test]
fn test_search_with_disabled_provider_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_rag(&config_path, &["search", "workflow"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_invalid_config_fails_fast() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[embedding]\nprovider = \"cohere\"\n").unwrap();

    let (_, stderr, success) = run_rag(&bad, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
}

#[test]
fn test_completions_without_config() {
    let (stdout, _, success) = run_rag(Path::new("/nonexistent/rag.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("rag"));
}
