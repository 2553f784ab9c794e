//! Persistent [`VectorIndex`] on SQLite.
//!
//! # Schema
//!
//! ```sql
//! collections(name TEXT PRIMARY KEY, metric TEXT, dims INTEGER NULL, created_at INTEGER)
//! fragments(collection TEXT, id TEXT, text TEXT, metadata_json TEXT, embedding BLOB,
//!           PRIMARY KEY (collection, id))
//! ```
//!
//! Vectors are little-endian f32 BLOBs. Similarity search is brute force:
//! the metadata filter is pushed into SQL (`json_extract` equality per key)
//! so it restricts the candidate rows, then cosine distance is computed in
//! Rust over what remains and the `k` nearest are kept.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool};
use sqlx::Row;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use rag_harness_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use rag_harness_core::models::{MetaValue, Metadata};
use rag_harness_core::store::{validate_add, IndexError, QueryHit, VectorIndex, METRIC};

use crate::config::Config;
use crate::db;

pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
    ready: AtomicBool,
}

impl SqliteIndex {
    /// Open the store configured under `[index]`. The collection itself is
    /// created lazily.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::from_pool(pool, &config.index.collection))
    }

    pub fn from_pool(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
            ready: AtomicBool::new(false),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                dims INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fragments (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lazily run [`VectorIndex::get_or_create`] once per process (and again
    /// after a reset).
    async fn ensure(&self) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            self.get_or_create().await?;
        }
        Ok(())
    }

    async fn dims(&self) -> Result<Option<usize>> {
        let dims: Option<i64> =
            sqlx::query_scalar::<_, Option<i64>>("SELECT dims FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
        Ok(dims.map(|d| d as usize))
    }
}

/// JSON path for a top-level metadata key.
fn json_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', "\\\""))
}

/// `AND json_extract(metadata_json, ?) = ?` per filter key.
fn filter_clause(filter: &Metadata) -> String {
    " AND json_extract(metadata_json, ?) = ?".repeat(filter.len())
}

fn bind_filter<'q>(
    mut q: Query<'q, Sqlite, SqliteArguments<'q>>,
    filter: &'q Metadata,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for (key, value) in filter {
        q = q.bind(json_path(key));
        q = match value {
            MetaValue::Str(s) => q.bind(s.as_str()),
            MetaValue::Int(i) => q.bind(*i),
            MetaValue::Float(f) => q.bind(*f),
            // json_extract yields 1/0 for JSON booleans
            MetaValue::Bool(b) => q.bind(*b as i64),
        };
    }
    q
}

fn parse_metadata(json: &str) -> Result<Metadata> {
    serde_json::from_str(json).with_context(|| format!("Invalid metadata_json: {}", json))
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn get_or_create(&self) -> Result<()> {
        self.ensure_schema().await?;

        let created = sqlx::query(
            "INSERT OR IGNORE INTO collections (name, metric, dims, created_at) VALUES (?, ?, NULL, ?)",
        )
        .bind(&self.collection)
        .bind(METRIC)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if created > 0 {
            tracing::info!(collection = %self.collection, metric = METRIC, "created collection");
        } else {
            tracing::debug!(collection = %self.collection, "using existing collection");
        }
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<()> {
        self.ensure().await?;
        let known = self.dims().await?;
        let dims = validate_add(ids, vectors, texts, metadatas, known)?;

        let mut tx = self.pool.begin().await?;

        if known.is_none() {
            if let Some(d) = dims {
                sqlx::query("UPDATE collections SET dims = ? WHERE name = ?")
                    .bind(d as i64)
                    .bind(&self.collection)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for (((id, vector), text), metadata) in ids.iter().zip(vectors).zip(texts).zip(metadatas) {
            let metadata_json = serde_json::to_string(metadata)?;
            sqlx::query(
                r#"
                INSERT INTO fragments (collection, id, text, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(id)
            .bind(text)
            .bind(metadata_json)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>> {
        self.ensure().await?;
        if let Some(d) = self.dims().await? {
            if d != vector.len() {
                bail!(IndexError::DimensionMismatch {
                    expected: d,
                    actual: vector.len()
                });
            }
        }

        let empty = Metadata::new();
        let filter = filter.unwrap_or(&empty);
        let sql = format!(
            "SELECT id, text, metadata_json, embedding FROM fragments WHERE collection = ?{}",
            filter_clause(filter)
        );
        let rows = bind_filter(sqlx::query(&sql).bind(&self.collection), filter)
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            hits.push(QueryHit {
                id: row.get("id"),
                text: row.get("text"),
                metadata: parse_metadata(&metadata_json)?,
                distance: cosine_distance(vector, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn ids(&self) -> Result<HashSet<String>> {
        self.ensure().await?;
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM fragments WHERE collection = ?")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn peek(&self, n: usize) -> Result<Vec<Metadata>> {
        self.ensure().await?;
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT metadata_json FROM fragments WHERE collection = ? ORDER BY rowid LIMIT ?",
        )
        .bind(&self.collection)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|j| parse_metadata(j)).collect()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.ensure().await?;
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for id in ids {
            removed += sqlx::query("DELETE FROM fragments WHERE collection = ? AND id = ?")
                .bind(&self.collection)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn delete_where(&self, filter: &Metadata) -> Result<usize> {
        if filter.is_empty() {
            bail!("delete_where requires a non-empty filter");
        }
        self.ensure().await?;
        let sql = format!(
            "DELETE FROM fragments WHERE collection = ?{}",
            filter_clause(filter)
        );
        let removed = bind_filter(sqlx::query(&sql).bind(&self.collection), filter)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed as usize)
    }

    async fn count(&self) -> Result<usize> {
        self.ensure().await?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fragments WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn reset(&self) -> Result<()> {
        self.ensure_schema().await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM fragments WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.ready.store(false, Ordering::Release);
        tracing::info!(collection = %self.collection, "collection reset");
        Ok(())
    }
}
