//! Storage abstraction for ragkit.
//!
//! The [`Store`] trait is everything the ingestion and retrieval pipelines
//! need from a persistent backend: keyed idempotent writes, hash lookups,
//! and a candidate fetch that already combines dense similarity, lexical
//! rank, namespace/slot scoping, and the TTL cutoff.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Candidate, ChunkKey, ChunkRecord, ChunkWrite, NamespaceMode, Slot, UpsertOutcome};
use crate::scoring::clamp01;

/// Inputs to a single candidate fetch.
#[derive(Debug, Clone)]
pub struct CandidateQuery<'a> {
    pub namespace: &'a str,
    pub slot: Slot,
    pub namespace_mode: NamespaceMode,
    /// Raw query text for lexical ranking.
    pub query_text: &'a str,
    pub query_vector: &'a [f32],
    /// Maximum number of candidates to return.
    pub fetch_k: usize,
    /// Dense weight (α) used to pick which `fetch_k` candidates survive.
    pub dense_weight: f64,
    /// Lexical weight (γ) used to pick which `fetch_k` candidates survive.
    pub lexical_weight: f64,
    /// Chunks older than this are not returned at all.
    pub ttl_days: Option<f64>,
    /// Reference time for ages.
    pub now: DateTime<Utc>,
}

impl CandidateQuery<'_> {
    /// The dense and lexical terms of the fused score, clamped as the
    /// scorer clamps them.
    pub fn prerank(&self, dense: f64, lexical: f64) -> f64 {
        self.dense_weight * clamp01(dense) + self.lexical_weight * clamp01(lexical)
    }
}

/// Sort by [`CandidateQuery::prerank`] (desc), then key, and keep the
/// first `fetch_k`.
pub fn truncate_candidates(candidates: &mut Vec<Candidate>, query: &CandidateQuery<'_>) {
    candidates.sort_by(|a, b| {
        query
            .prerank(b.dense, b.lexical)
            .partial_cmp(&query.prerank(a.dense, a.lexical))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.key.cmp(&b.key))
    });
    candidates.truncate(query.fetch_k);
}

/// Chunk and source counts for one namespace/slot pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStats {
    pub namespace: String,
    pub slot: Slot,
    pub sources: u64,
    pub chunks: u64,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`existing_hashes`](Store::existing_hashes) | Stored content hashes for one source |
/// | [`upsert_chunks`](Store::upsert_chunks) | Transactional keyed insert-or-update |
/// | [`query_candidates`](Store::query_candidates) | Scoped, TTL-filtered hybrid candidate fetch |
/// | [`get_chunk`](Store::get_chunk) | Fetch one chunk by key |
/// | [`hash_exists`](Store::hash_exists) | Dedup check within a namespace/slot |
/// | [`delete_source`](Store::delete_source) | Remove every chunk of a source |
/// | [`purge_slot`](Store::purge_slot) | Remove a whole namespace/slot generation |
/// | [`stats`](Store::stats) | Per namespace/slot counts |
#[async_trait]
pub trait Store: Send + Sync {
    /// Map of `chunk_no → content_hash` for the chunks stored under
    /// `(namespace, slot, source_id)`.
    async fn existing_hashes(
        &self,
        namespace: &str,
        slot: Slot,
        source_id: &str,
    ) -> Result<HashMap<i64, String>>;

    /// Write all rows in one transaction, keyed by [`ChunkKey`].
    ///
    /// For each row: insert when the key is absent, update content,
    /// embedding, hash and `updated_at` when the stored hash differs, and
    /// leave the row untouched when it is equal. Returns one outcome per
    /// row, in order. On error nothing is committed.
    async fn upsert_chunks(&self, rows: &[ChunkWrite]) -> Result<Vec<UpsertOutcome>>;

    /// Fetch up to `fetch_k` candidates with `dense` and `lexical` filled in.
    async fn query_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<Candidate>>;

    async fn get_chunk(&self, key: &ChunkKey) -> Result<Option<ChunkRecord>>;

    /// Whether any chunk in `(namespace, slot)` carries `content_hash`.
    async fn hash_exists(&self, namespace: &str, slot: Slot, content_hash: &str) -> Result<bool>;

    /// Delete every chunk of one source. Returns the number of rows removed.
    async fn delete_source(&self, namespace: &str, slot: Slot, source_id: &str) -> Result<u64>;

    /// Delete every chunk of a namespace/slot generation.
    async fn purge_slot(&self, namespace: &str, slot: Slot) -> Result<u64>;

    async fn stats(&self) -> Result<Vec<SlotStats>>;
}
