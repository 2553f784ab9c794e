//! Destructive maintenance: clearing the collection and removing one
//! repository's fragments.

use anyhow::{bail, Result};

use rag_harness_core::models::{keys, Metadata};
use rag_harness_core::store::VectorIndex;

use crate::config::Config;
use crate::sqlite_index::SqliteIndex;

/// Drop every fragment in the collection. Returns how many were removed.
pub async fn clear_collection(index: &dyn VectorIndex) -> Result<usize> {
    let before = index.count().await?;
    index.reset().await?;
    Ok(before)
}

/// Remove all fragments whose `repo_name` equals `repo`.
pub async fn delete_by_repo(index: &dyn VectorIndex, repo: &str) -> Result<usize> {
    if repo.trim().is_empty() {
        bail!("repository name must not be empty");
    }
    let mut filter = Metadata::new();
    filter.insert(keys::REPO_NAME.into(), repo.into());
    index.delete_where(&filter).await
}

/// `rag clear`.
pub async fn run_clear(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to clear the collection without --yes");
    }
    let index = SqliteIndex::open(config).await?;
    let removed = clear_collection(&index).await?;
    index.close().await;
    println!("Cleared collection '{}' ({} fragments removed).", config.index.collection, removed);
    Ok(())
}

/// `rag delete-repo`.
pub async fn run_delete_repo(config: &Config, repo: &str) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let removed = delete_by_repo(&index, repo).await?;
    index.close().await;
    if removed == 0 {
        println!("No fragments found for repository '{}'.", repo);
    } else {
        println!("Deleted {} fragments from repository '{}'.", removed, repo);
    }
    Ok(())
}
