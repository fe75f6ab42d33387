//! In-memory [`Store`] implementation for testing and embedding in-process.
//!
//! Rows live in a `BTreeMap` keyed by [`ChunkKey`] behind a
//! `std::sync::RwLock`, which gives both the unique-key constraint and
//! all-or-nothing batch writes for free. Dense similarity is brute-force
//! cosine; lexical rank is the number of distinct query terms found in
//! the chunk (unbounded, like a real ranking function).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::filter::namespace_matches;
use crate::models::{Candidate, ChunkKey, ChunkRecord, ChunkWrite, Slot, UpsertOutcome};
use crate::recency::{age_days, within_ttl};

use super::{truncate_candidates, CandidateQuery, SlotStats, Store};

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<BTreeMap<ChunkKey, ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ChunkKey, ChunkRecord>>> {
        self.rows
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<ChunkKey, ChunkRecord>>> {
        self.rows
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

fn lexical_rank(terms: &[String], text: &str) -> f64 {
    let text_lower = text.to_lowercase();
    terms
        .iter()
        .filter(|t| text_lower.contains(t.as_str()))
        .count() as f64
}

fn query_terms(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let unique: BTreeSet<&str> = lower.split_whitespace().collect();
    unique.into_iter().map(str::to_string).collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn existing_hashes(
        &self,
        namespace: &str,
        slot: Slot,
        source_id: &str,
    ) -> Result<HashMap<i64, String>> {
        let rows = self.read()?;
        Ok(rows
            .values()
            .filter(|r| {
                r.key.namespace == namespace && r.key.slot == slot && r.key.source_id == source_id
            })
            .map(|r| (r.key.chunk_no, r.content_hash.clone()))
            .collect())
    }

    async fn upsert_chunks(&self, writes: &[ChunkWrite]) -> Result<Vec<UpsertOutcome>> {
        let now = Utc::now();
        let mut rows = self.write()?;
        let mut outcomes = Vec::with_capacity(writes.len());

        for w in writes {
            match rows.get_mut(&w.key) {
                Some(existing) if existing.content_hash == w.content_hash => {
                    outcomes.push(UpsertOutcome::Unchanged);
                }
                Some(existing) => {
                    existing.content = w.content.clone();
                    existing.embedding = w.embedding.clone();
                    existing.content_hash = w.content_hash.clone();
                    existing.published_at = w.published_at;
                    existing.metadata = w.metadata.clone();
                    existing.updated_at = now;
                    outcomes.push(UpsertOutcome::Updated);
                }
                None => {
                    rows.insert(
                        w.key.clone(),
                        ChunkRecord {
                            id: Uuid::new_v4().to_string(),
                            key: w.key.clone(),
                            content: w.content.clone(),
                            embedding: w.embedding.clone(),
                            content_hash: w.content_hash.clone(),
                            published_at: w.published_at,
                            created_at: now,
                            updated_at: now,
                            metadata: w.metadata.clone(),
                        },
                    );
                    outcomes.push(UpsertOutcome::Inserted);
                }
            }
        }

        Ok(outcomes)
    }

    async fn query_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<Candidate>> {
        let terms = query_terms(query.query_text);
        let rows = self.read()?;

        let mut candidates: Vec<Candidate> = rows
            .values()
            .filter(|r| {
                r.key.slot == query.slot
                    && namespace_matches(&r.key.namespace, query.namespace, query.namespace_mode)
            })
            .filter_map(|r| {
                let age = age_days(r.published_at, r.created_at, query.now);
                if !within_ttl(age, query.ttl_days) {
                    return None;
                }
                Some(Candidate {
                    id: r.id.clone(),
                    key: r.key.clone(),
                    content: r.content.clone(),
                    embedding: r.embedding.clone(),
                    published_at: r.published_at,
                    created_at: r.created_at,
                    metadata: r.metadata.clone(),
                    dense: cosine_similarity(query.query_vector, &r.embedding) as f64,
                    lexical: lexical_rank(&terms, &r.content),
                    age_days: age,
                })
            })
            .collect();

        truncate_candidates(&mut candidates, query);
        Ok(candidates)
    }

    async fn get_chunk(&self, key: &ChunkKey) -> Result<Option<ChunkRecord>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn hash_exists(&self, namespace: &str, slot: Slot, content_hash: &str) -> Result<bool> {
        Ok(self.read()?.values().any(|r| {
            r.key.namespace == namespace && r.key.slot == slot && r.content_hash == content_hash
        }))
    }

    async fn delete_source(&self, namespace: &str, slot: Slot, source_id: &str) -> Result<u64> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|k, _| !(k.namespace == namespace && k.slot == slot && k.source_id == source_id));
        Ok((before - rows.len()) as u64)
    }

    async fn purge_slot(&self, namespace: &str, slot: Slot) -> Result<u64> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|k, _| !(k.namespace == namespace && k.slot == slot));
        Ok((before - rows.len()) as u64)
    }

    async fn stats(&self) -> Result<Vec<SlotStats>> {
        let rows = self.read()?;
        let mut grouped: BTreeMap<(String, Slot), (BTreeSet<&str>, u64)> = BTreeMap::new();
        for r in rows.values() {
            let entry = grouped
                .entry((r.key.namespace.clone(), r.key.slot))
                .or_default();
            entry.0.insert(r.key.source_id.as_str());
            entry.1 += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|((namespace, slot), (sources, chunks))| SlotStats {
                namespace,
                slot,
                sources: sources.len() as u64,
                chunks,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::key_hash;
    use crate::models::{Metadata, NamespaceMode};
    use chrono::Duration;

    fn write(ns: &str, slot: Slot, src: &str, no: i64, content: &str, emb: Vec<f32>) -> ChunkWrite {
        let key = ChunkKey {
            namespace: ns.into(),
            slot,
            source_id: src.into(),
            chunk_no: no,
        };
        ChunkWrite {
            content_hash: key_hash(&key, content),
            key,
            content: content.into(),
            embedding: emb,
            published_at: None,
            metadata: Metadata::new(),
        }
    }

    fn query<'a>(ns: &'a str, text: &'a str, v: &'a [f32]) -> CandidateQuery<'a> {
        CandidateQuery {
            namespace: ns,
            slot: Slot::Staging,
            namespace_mode: NamespaceMode::Strict,
            query_text: text,
            query_vector: v,
            fetch_k: 10,
            dense_weight: 0.6,
            lexical_weight: 0.3,
            ttl_days: None,
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_insert_update_unchanged() {
        let store = InMemoryStore::new();
        let w = write("n", Slot::Staging, "s", 0, "hello", vec![1.0, 0.0]);
        assert_eq!(
            store.upsert_chunks(&[w.clone()]).await.unwrap(),
            vec![UpsertOutcome::Inserted]
        );
        let first = store.get_chunk(&w.key).await.unwrap().unwrap();

        assert_eq!(
            store.upsert_chunks(&[w.clone()]).await.unwrap(),
            vec![UpsertOutcome::Unchanged]
        );
        let same = store.get_chunk(&w.key).await.unwrap().unwrap();
        assert_eq!(same.updated_at, first.updated_at);

        let changed = write("n", Slot::Staging, "s", 0, "hello again", vec![0.0, 1.0]);
        assert_eq!(
            store.upsert_chunks(&[changed]).await.unwrap(),
            vec![UpsertOutcome::Updated]
        );
        let after = store.get_chunk(&w.key).await.unwrap().unwrap();
        assert_eq!(after.id, first.id);
        assert_eq!(after.created_at, first.created_at);
        assert_eq!(after.content, "hello again");
        assert_eq!(after.embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_slots_are_isolated() {
        let store = InMemoryStore::new();
        store
            .upsert_chunks(&[
                write("n", Slot::Staging, "s", 0, "alpha", vec![1.0, 0.0]),
                write("n", Slot::Prod, "s", 0, "alpha", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let v = [1.0, 0.0];
        let got = store.query_candidates(&query("n", "alpha", &v)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].key.slot, Slot::Staging);
    }

    #[tokio::test]
    async fn test_query_prefix_mode_and_lexical() {
        let store = InMemoryStore::new();
        store
            .upsert_chunks(&[
                write("team", Slot::Staging, "a", 0, "rust cargo", vec![1.0, 0.0]),
                write("team/topic", Slot::Staging, "b", 0, "rust only", vec![1.0, 0.0]),
                write("teamwork", Slot::Staging, "c", 0, "rust cargo", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let v = [1.0, 0.0];

        let strict = store.query_candidates(&query("team", "rust cargo", &v)).await.unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].lexical, 2.0);

        let mut q = query("team", "rust cargo", &v);
        q.namespace_mode = NamespaceMode::Prefix;
        let prefix = store.query_candidates(&q).await.unwrap();
        let sources: Vec<&str> = prefix.iter().map(|c| c.key.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_query_ttl_and_fetch_k() {
        let store = InMemoryStore::new();
        let mut old = write("n", Slot::Staging, "old", 0, "news", vec![1.0, 0.0]);
        old.published_at = Some(Utc::now() - Duration::days(40));
        let fresh = write("n", Slot::Staging, "fresh", 0, "news", vec![0.5, 0.5]);
        let other = write("n", Slot::Staging, "other", 0, "news", vec![0.0, 1.0]);
        store.upsert_chunks(&[old, fresh, other]).await.unwrap();

        let v = [1.0, 0.0];
        let mut q = query("n", "news", &v);
        q.ttl_days = Some(30.0);
        let got = store.query_candidates(&q).await.unwrap();
        assert!(got.iter().all(|c| c.key.source_id != "old"));
        assert_eq!(got.len(), 2);

        q.fetch_k = 1;
        let got = store.query_candidates(&q).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].key.source_id, "fresh");
    }

    #[tokio::test]
    async fn test_fetch_k_keeps_best_semantic_match_over_term_hits() {
        let store = InMemoryStore::new();
        store
            .upsert_chunks(&[
                write("n", Slot::Staging, "semantic", 0, "zzz qqq", vec![1.0, 0.0]),
                write("n", Slot::Staging, "lexical", 0, "foo bar baz", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let v = [1.0, 0.0];
        let mut q = query("n", "foo bar baz", &v);

        let all = store.query_candidates(&q).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].lexical, 3.0);

        q.fetch_k = 1;
        let got = store.query_candidates(&q).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].key.source_id, "semantic");

        // With lexical weighted above dense the term hits win the cut.
        q.dense_weight = 0.2;
        q.lexical_weight = 0.7;
        let got = store.query_candidates(&q).await.unwrap();
        assert_eq!(got[0].key.source_id, "lexical");
    }

    #[tokio::test]
    async fn test_delete_purge_hash_exists_stats() {
        let store = InMemoryStore::new();
        let a0 = write("n", Slot::Staging, "a", 0, "one", vec![1.0]);
        let hash = a0.content_hash.clone();
        store
            .upsert_chunks(&[
                a0,
                write("n", Slot::Staging, "a", 1, "two", vec![1.0]),
                write("n", Slot::Staging, "b", 0, "three", vec![1.0]),
                write("n", Slot::Prod, "a", 0, "one", vec![1.0]),
            ])
            .await
            .unwrap();

        assert!(store.hash_exists("n", Slot::Staging, &hash).await.unwrap());
        assert!(!store.hash_exists("n", Slot::Prod, &hash).await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            vec![
                SlotStats {
                    namespace: "n".into(),
                    slot: Slot::Staging,
                    sources: 2,
                    chunks: 3
                },
                SlotStats {
                    namespace: "n".into(),
                    slot: Slot::Prod,
                    sources: 1,
                    chunks: 1
                },
            ]
        );

        assert_eq!(store.delete_source("n", Slot::Staging, "a").await.unwrap(), 2);
        assert_eq!(store.purge_slot("n", Slot::Prod).await.unwrap(), 1);
        assert_eq!(
            store.existing_hashes("n", Slot::Staging, "b").await.unwrap().len(),
            1
        );
        assert!(store
            .existing_hashes("n", Slot::Staging, "a")
            .await
            .unwrap()
            .is_empty());
    }
}
