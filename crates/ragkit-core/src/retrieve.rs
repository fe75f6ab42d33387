//! Query pipeline: embed, fetch, filter, score, diversify.
//!
//! ```text
//! query ─▶ embed_query ─▶ Store::query_candidates (namespace/slot/TTL, fetch_k)
//!       ─▶ DomainFilter ─▶ scoring::score ─▶ mmr::select ─▶ RetrievedItem
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::{embed_query, BatchLimits, Embedder};
use crate::error::{Error, Result};
use crate::filter::DomainFilter;
use crate::mmr::{self, DEFAULT_LAMBDA};
use crate::models::{NamespaceMode, Slot};
use crate::recency::RecencyTable;
use crate::scoring::{score, ScoredCandidate};
use crate::store::{CandidateQuery, Store};

pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_CANDIDATE_K: usize = 40;
/// Length of [`RetrievedItem::snippet`], in characters.
pub const SNIPPET_CHARS: usize = 240;

/// One retrieval request.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    pub namespace: String,
    pub slot: Slot,
    pub query: String,
    pub top_k: usize,
    /// Candidates fetched from the store before scoring; raised to
    /// `top_k` when smaller.
    pub candidate_k: usize,
    pub min_score: f64,
    pub namespace_mode: NamespaceMode,
    pub lambda: f64,
    pub domains: DomainFilter,
}

impl RetrieveRequest {
    pub fn new(namespace: &str, slot: Slot, query: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            slot,
            query: query.to_string(),
            top_k: DEFAULT_TOP_K,
            candidate_k: DEFAULT_CANDIDATE_K,
            min_score: 0.0,
            namespace_mode: NamespaceMode::Strict,
            lambda: DEFAULT_LAMBDA,
            domains: DomainFilter::default(),
        }
    }
}

/// A ranked result.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedItem {
    pub id: String,
    pub namespace: String,
    pub source_id: String,
    pub chunk_no: i64,
    pub url: Option<String>,
    pub title: Option<String>,
    pub snippet: String,
    /// Fused score.
    pub score: f64,
    /// Dense cosine similarity, clamped to `[0, 1]`.
    pub similarity: f64,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<ScoredCandidate> for RetrievedItem {
    fn from(s: ScoredCandidate) -> Self {
        let c = s.candidate;
        Self {
            url: c.url().map(str::to_string),
            title: c.title().map(str::to_string),
            snippet: c.content.chars().take(SNIPPET_CHARS).collect(),
            id: c.id,
            namespace: c.key.namespace,
            source_id: c.key.source_id,
            chunk_no: c.key.chunk_no,
            score: s.breakdown.fused,
            similarity: s.breakdown.dense,
            published_at: c.published_at,
        }
    }
}

/// Answers [`RetrieveRequest`]s against one store and one embedder.
pub struct Retriever<'a> {
    store: &'a dyn Store,
    embedder: &'a dyn Embedder,
    recency: &'a RecencyTable,
    limits: BatchLimits,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a dyn Store, embedder: &'a dyn Embedder, recency: &'a RecencyTable) -> Self {
        Self {
            store,
            embedder,
            recency,
            limits: BatchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Ranked, diversified results for `request`.
    ///
    /// Returns an empty list for a blank query or when nothing clears
    /// `min_score`.
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<RetrievedItem>> {
        Ok(self
            .retrieve_scored(request)
            .await?
            .into_iter()
            .map(RetrievedItem::from)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps the score breakdown.
    pub async fn retrieve_scored(&self, request: &RetrieveRequest) -> Result<Vec<ScoredCandidate>> {
        let query = request.query.trim();
        if query.is_empty() || request.top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = embed_query(self.embedder, query, &self.limits).await?;
        let config = self.recency.resolve(&request.namespace);
        let fetch_k = request.candidate_k.max(request.top_k);

        let candidates = self
            .store
            .query_candidates(&CandidateQuery {
                namespace: &request.namespace,
                slot: request.slot,
                namespace_mode: request.namespace_mode,
                query_text: query,
                query_vector: &query_vector,
                fetch_k,
                dense_weight: config.alpha,
                lexical_weight: config.gamma,
                ttl_days: config.ttl_days,
                now: Utc::now(),
            })
            .await
            .map_err(Error::Store)?;
        let fetched = candidates.len();

        let candidates: Vec<_> = if request.domains.is_empty() {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|c| request.domains.permits(c.url()))
                .collect()
        };

        let scored = score(candidates, config, request.min_score);
        debug!(fetched, scored = scored.len(), "candidates scored");

        let selected = mmr::select(&query_vector, scored, request.top_k, request.lambda);
        info!(
            namespace = %request.namespace,
            slot = %request.slot,
            results = selected.len(),
            "retrieve complete"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{IngestOptions, Ingestor};
    use crate::models::{DocumentInput, MetaValue};
    use crate::recency::RecencyConfig;
    use crate::store::memory::InMemoryStore;
    use crate::testing::KeywordEmbedder;
    use chrono::Duration;

    const KEYWORDS: &[&str] = &["alpha", "bravo", "charlie"];

    async fn seeded(store: &InMemoryStore, embedder: &KeywordEmbedder) {
        let doc = DocumentInput::new("n", Slot::Staging, "doc").with_chunks([
            "alpha alpha",
            "bravo bravo",
            "charlie charlie",
        ]);
        Ingestor::new(store, embedder, IngestOptions::default())
            .ingest(vec![doc])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_end_to_end_returns_matching_chunk() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        seeded(&store, &embedder).await;

        let table = RecencyTable::default();
        let retriever = Retriever::new(&store, &embedder, &table);
        let mut req = RetrieveRequest::new("n", Slot::Staging, "bravo");
        req.top_k = 1;
        let items = retriever.retrieve(&req).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].chunk_no, 1);
        assert_eq!(items[0].snippet, "bravo bravo");
        assert!((items[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        seeded(&store, &embedder).await;
        let before = embedder.embedded();

        let table = RecencyTable::default();
        let retriever = Retriever::new(&store, &embedder, &table);
        let items = retriever
            .retrieve(&RetrieveRequest::new("n", Slot::Staging, "   "))
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(embedder.embedded(), before);
    }

    #[tokio::test]
    async fn test_min_score_above_everything_is_empty_not_error() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        seeded(&store, &embedder).await;

        let table = RecencyTable::default();
        let retriever = Retriever::new(&store, &embedder, &table);
        let mut req = RetrieveRequest::new("n", Slot::Staging, "bravo");
        req.min_score = 5.0;
        assert!(retriever.retrieve(&req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_slot_not_visible() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        seeded(&store, &embedder).await;

        let table = RecencyTable::default();
        let retriever = Retriever::new(&store, &embedder, &table);
        let req = RetrieveRequest::new("n", Slot::Prod, "bravo");
        assert!(retriever.retrieve(&req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_sorted_by_score() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        seeded(&store, &embedder).await;

        let table = RecencyTable::default();
        let retriever = Retriever::new(&store, &embedder, &table);
        let items = retriever
            .retrieve(&RetrieveRequest::new("n", Slot::Staging, "alpha bravo"))
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_namespace_ttl_excludes_old_chunks() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        let mut old = DocumentInput::new("news", Slot::Prod, "old").with_chunks(["alpha story"]);
        old.published_at = Some(Utc::now() - Duration::days(90));
        let fresh = DocumentInput::new("news", Slot::Prod, "fresh").with_chunks(["bravo story"]);
        Ingestor::new(&store, &embedder, IngestOptions::default())
            .ingest(vec![old, fresh])
            .await
            .unwrap();

        let table = RecencyTable::default().with_namespace(
            "news",
            RecencyConfig {
                ttl_days: Some(30.0),
                ..RecencyConfig::default()
            },
        );
        let retriever = Retriever::new(&store, &embedder, &table);
        let items = retriever
            .retrieve(&RetrieveRequest::new("news", Slot::Prod, "alpha"))
            .await
            .unwrap();
        let sources: Vec<&str> = items.iter().map(|i| i.source_id.as_str()).collect();
        assert_eq!(sources, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_domain_filter_applied() {
        let store = InMemoryStore::new();
        let embedder = KeywordEmbedder::new(KEYWORDS);
        let mut a = DocumentInput::new("n", Slot::Staging, "a").with_chunks(["alpha one"]);
        a.url = Some("https://docs.example.com/a".into());
        let mut b = DocumentInput::new("n", Slot::Staging, "b").with_chunks(["alpha two"]);
        b.url = Some("https://blog.example.com/b".into());
        b.metadata.insert("lang".into(), MetaValue::from("en"));
        Ingestor::new(&store, &embedder, IngestOptions::default())
            .ingest(vec![a, b])
            .await
            .unwrap();

        let table = RecencyTable::default();
        let retriever = Retriever::new(&store, &embedder, &table);
        let mut req = RetrieveRequest::new("n", Slot::Staging, "alpha");
        req.domains = DomainFilter::new(["example.com"], ["blog."]);
        let items = retriever.retrieve(&req).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url.as_deref(), Some("https://docs.example.com/a"));
    }
}
