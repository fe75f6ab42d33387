//! SQLite-backed [`Store`] implementation.
//!
//! Chunks live in one `chunks` table keyed by
//! `UNIQUE(namespace, slot, source_id, chunk_no)`, mirrored into the
//! `chunks_fts` FTS5 table for lexical ranking. Dense similarity is
//! computed in-process over the embedding BLOBs of the rows in scope.
//!
//! Writes use SQLite's native upsert:
//!
//! ```sql
//! INSERT ... ON CONFLICT(namespace, slot, source_id, chunk_no)
//! DO UPDATE SET ... WHERE chunks.content_hash <> excluded.content_hash
//! RETURNING id
//! ```
//!
//! so two ingesters racing on the same key converge on one row, and an
//! equal hash never touches the row. The returned id tells the three
//! outcomes apart: the freshly generated id means inserted, another id
//! means updated, no row means unchanged.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use ragkit_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use ragkit_core::models::{
    Candidate, ChunkKey, ChunkRecord, ChunkWrite, Metadata, NamespaceMode, Slot, UpsertOutcome,
};
use ragkit_core::recency::age_days;
use ragkit_core::store::{truncate_candidates, CandidateQuery, SlotStats, Store};

use crate::config::Config;
use crate::{db, migrate};

const SECONDS_PER_DAY: f64 = 86_400.0;

const SELECT_COLUMNS: &str = "id, namespace, slot, source_id, chunk_no, content, embedding, \
     content_hash, published_at, created_at, updated_at, metadata_json";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Namespace, slot and TTL restriction shared by both candidate queries.
struct Scope {
    slot: &'static str,
    namespace: String,
    prefix: bool,
    prefix_len: i64,
    prefix_with_sep: String,
    cutoff: Option<i64>,
}

// Column references are qualified because the lexical query joins chunks_fts.
const SCOPE_SQL: &str = "chunks.slot = ? \
     AND (chunks.namespace = ? OR (? = 1 AND substr(chunks.namespace, 1, ?) = ?)) \
     AND (? IS NULL OR COALESCE(chunks.published_at, chunks.created_at) >= ?)";

impl Scope {
    fn new(query: &CandidateQuery<'_>) -> Self {
        let namespace = query.namespace.trim_end_matches('/').to_string();
        let prefix_with_sep = format!("{}/", namespace);
        let cutoff = query
            .ttl_days
            .map(|ttl| query.now.timestamp() - (ttl * SECONDS_PER_DAY) as i64);
        Self {
            slot: query.slot.as_str(),
            prefix: query.namespace_mode == NamespaceMode::Prefix,
            prefix_len: prefix_with_sep.chars().count() as i64,
            prefix_with_sep,
            namespace,
            cutoff,
        }
    }

    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.slot)
            .bind(&self.namespace)
            .bind(self.prefix as i64)
            .bind(self.prefix_len)
            .bind(&self.prefix_with_sep)
            .bind(self.cutoff)
            .bind(self.cutoff)
    }
}

/// Turn free text into an FTS5 expression: each alphanumeric term quoted,
/// joined with OR. `None` when the text has no usable terms.
fn fts_match_expr(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn ts_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("timestamp {} out of range", ts))
}

fn row_to_record(row: &SqliteRow) -> Result<ChunkRecord> {
    let id: String = row.get("id");
    let slot: String = row.get("slot");
    let blob: Vec<u8> = row.get("embedding");
    let published_at: Option<i64> = row.get("published_at");
    let metadata_json: String = row.get("metadata_json");
    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .with_context(|| format!("Corrupt metadata_json on chunk {}", id))?;
    let published_at = published_at
        .map(ts_to_datetime)
        .transpose()
        .with_context(|| format!("Corrupt published_at on chunk {}", id))?;
    let created_at = ts_to_datetime(row.get("created_at"))
        .with_context(|| format!("Corrupt created_at on chunk {}", id))?;
    let updated_at = ts_to_datetime(row.get("updated_at"))
        .with_context(|| format!("Corrupt updated_at on chunk {}", id))?;

    Ok(ChunkRecord {
        id,
        key: ChunkKey {
            namespace: row.get("namespace"),
            slot: slot.parse()?,
            source_id: row.get("source_id"),
            chunk_no: row.get("chunk_no"),
        },
        content: row.get("content"),
        embedding: blob_to_vec(&blob),
        content_hash: row.get("content_hash"),
        published_at,
        created_at,
        updated_at,
        metadata,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn existing_hashes(
        &self,
        namespace: &str,
        slot: Slot,
        source_id: &str,
    ) -> Result<HashMap<i64, String>> {
        let rows = sqlx::query(
            "SELECT chunk_no, content_hash FROM chunks \
             WHERE namespace = ? AND slot = ? AND source_id = ?",
        )
        .bind(namespace)
        .bind(slot.as_str())
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("chunk_no"), row.get("content_hash")))
            .collect())
    }

    async fn upsert_chunks(&self, writes: &[ChunkWrite]) -> Result<Vec<UpsertOutcome>> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(writes.len());

        for w in writes {
            let new_id = Uuid::new_v4().to_string();
            let metadata_json = serde_json::to_string(&w.metadata)?;
            let blob = vec_to_blob(&w.embedding);

            let returned: Option<(String,)> = sqlx::query_as(
                r#"
                INSERT INTO chunks (id, namespace, slot, source_id, chunk_no, content,
                                    embedding, content_hash, published_at,
                                    created_at, updated_at, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(namespace, slot, source_id, chunk_no) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    content_hash = excluded.content_hash,
                    published_at = excluded.published_at,
                    updated_at = excluded.updated_at,
                    metadata_json = excluded.metadata_json
                WHERE chunks.content_hash <> excluded.content_hash
                RETURNING id
                "#,
            )
            .bind(&new_id)
            .bind(&w.key.namespace)
            .bind(w.key.slot.as_str())
            .bind(&w.key.source_id)
            .bind(w.key.chunk_no)
            .bind(&w.content)
            .bind(&blob)
            .bind(&w.content_hash)
            .bind(w.published_at.map(|d| d.timestamp()))
            .bind(now)
            .bind(now)
            .bind(&metadata_json)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert chunk {}", w.key))?;

            let outcome = match returned {
                None => UpsertOutcome::Unchanged,
                Some((id,)) if id == new_id => UpsertOutcome::Inserted,
                Some((id,)) => {
                    sqlx::query("DELETE FROM chunks_fts WHERE chunk_id = ?")
                        .bind(&id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("INSERT INTO chunks_fts (chunk_id, content) VALUES (?, ?)")
                        .bind(&id)
                        .bind(&w.content)
                        .execute(&mut *tx)
                        .await?;
                    UpsertOutcome::Updated
                }
            };
            if outcome == UpsertOutcome::Inserted {
                sqlx::query("INSERT INTO chunks_fts (chunk_id, content) VALUES (?, ?)")
                    .bind(&new_id)
                    .bind(&w.content)
                    .execute(&mut *tx)
                    .await?;
            }
            outcomes.push(outcome);
        }

        tx.commit().await?;
        Ok(outcomes)
    }

    async fn query_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<Candidate>> {
        let scope = Scope::new(query);

        let mut lexical: HashMap<String, f64> = HashMap::new();
        if let Some(expr) = fts_match_expr(query.query_text) {
            let sql = format!(
                "SELECT chunks_fts.chunk_id AS chunk_id, chunks_fts.rank AS rank \
                 FROM chunks_fts JOIN chunks ON chunks.id = chunks_fts.chunk_id \
                 WHERE chunks_fts MATCH ? AND {}",
                SCOPE_SQL
            );
            let rows = scope
                .bind(sqlx::query(&sql).bind(&expr))
                .fetch_all(&self.pool)
                .await
                .context("Lexical candidate query failed")?;
            for row in &rows {
                let rank: f64 = row.get("rank");
                // FTS5 rank is bm25(), where more negative is better.
                lexical.insert(row.get("chunk_id"), -rank);
            }
        }

        let sql = format!("SELECT {} FROM chunks WHERE {}", SELECT_COLUMNS, SCOPE_SQL);
        let rows = scope
            .bind(sqlx::query(&sql))
            .fetch_all(&self.pool)
            .await
            .context("Dense candidate query failed")?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = row_to_record(row)?;
            let dense = cosine_similarity(query.query_vector, &r.embedding) as f64;
            candidates.push(Candidate {
                lexical: lexical.get(&r.id).copied().unwrap_or(0.0),
                age_days: age_days(r.published_at, r.created_at, query.now),
                dense,
                id: r.id,
                key: r.key,
                content: r.content,
                embedding: r.embedding,
                published_at: r.published_at,
                created_at: r.created_at,
                metadata: r.metadata,
            });
        }

        truncate_candidates(&mut candidates, query);

        Ok(candidates)
    }

    async fn get_chunk(&self, key: &ChunkKey) -> Result<Option<ChunkRecord>> {
        let sql = format!(
            "SELECT {} FROM chunks \
             WHERE namespace = ? AND slot = ? AND source_id = ? AND chunk_no = ?",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&key.namespace)
            .bind(key.slot.as_str())
            .bind(&key.source_id)
            .bind(key.chunk_no)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn hash_exists(&self, namespace: &str, slot: Slot, content_hash: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chunks \
             WHERE namespace = ? AND slot = ? AND content_hash = ?)",
        )
        .bind(namespace)
        .bind(slot.as_str())
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn delete_source(&self, namespace: &str, slot: Slot, source_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunks_fts WHERE chunk_id IN \
             (SELECT id FROM chunks WHERE namespace = ? AND slot = ? AND source_id = ?)",
        )
        .bind(namespace)
        .bind(slot.as_str())
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

        let result =
            sqlx::query("DELETE FROM chunks WHERE namespace = ? AND slot = ? AND source_id = ?")
                .bind(namespace)
                .bind(slot.as_str())
                .bind(source_id)
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn purge_slot(&self, namespace: &str, slot: Slot) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunks_fts WHERE chunk_id IN \
             (SELECT id FROM chunks WHERE namespace = ? AND slot = ?)",
        )
        .bind(namespace)
        .bind(slot.as_str())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM chunks WHERE namespace = ? AND slot = ?")
            .bind(namespace)
            .bind(slot.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<Vec<SlotStats>> {
        let rows = sqlx::query(
            r#"
            SELECT namespace, slot,
                   COUNT(DISTINCT source_id) AS sources,
                   COUNT(*) AS chunks
            FROM chunks
            GROUP BY namespace, slot
            ORDER BY namespace, CASE slot WHEN 'staging' THEN 0 ELSE 1 END
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let slot: String = row.get("slot");
                let sources: i64 = row.get("sources");
                let chunks: i64 = row.get("chunks");
                Ok(SlotStats {
                    namespace: row.get("namespace"),
                    slot: slot.parse()?,
                    sources: sources as u64,
                    chunks: chunks as u64,
                })
            })
            .collect()
    }
}
