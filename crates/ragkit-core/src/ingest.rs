//! Ingestion engine: documents in, idempotent keyed writes out.
//!
//! # Pipeline (per document)
//!
//! ```text
//! chunks → sanitize → drop near-empty → identity hash
//!        → compare with stored hashes → embed changed chunks
//!        → Store::upsert_chunks (one transaction)
//! ```
//!
//! Every document in a call is validated before anything is embedded, so
//! a malformed batch fails fast without spending provider quota.
//! Documents then run on a bounded pool; a provider or store failure on
//! one document is recorded per chunk in [`IngestReport::failures`] and
//! does not stop the others.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embedding::{embed_many, BatchLimits, Embedder};
use crate::error::{Error, Result};
use crate::hash::identity_hash;
use crate::models::{ChunkKey, ChunkWrite, DocumentInput, UpsertOutcome};
use crate::sanitize::{is_near_empty, sanitize, DEFAULT_MAX_CHUNK_CHARS, DEFAULT_MIN_CHUNK_CHARS};
use crate::store::Store;

/// Tunables for [`Ingestor`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub max_chunk_chars: usize,
    pub min_chunk_chars: usize,
    /// Documents processed concurrently.
    pub concurrency: usize,
    pub batch: BatchLimits,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            min_chunk_chars: DEFAULT_MIN_CHUNK_CHARS,
            concurrency: 8,
            batch: BatchLimits::default(),
        }
    }
}

/// A chunk that could not be written, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub key: ChunkKey,
    pub message: String,
}

/// Outcome counts of one [`Ingestor::ingest`] call.
///
/// Counts cover committed writes only; chunks of a failed document appear
/// in `failures` and nowhere else.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Chunks discarded as near-empty after sanitization.
    pub dropped: usize,
    pub failures: Vec<ChunkFailure>,
}

impl IngestReport {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    fn merge(&mut self, other: IngestReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.dropped += other.dropped;
        self.failures.extend(other.failures);
    }
}

struct PreparedChunk {
    chunk_no: i64,
    content: String,
    hash: String,
}

/// Runs documents through the ingestion pipeline against one store and
/// one embedder.
pub struct Ingestor<'a> {
    store: &'a dyn Store,
    embedder: &'a dyn Embedder,
    options: IngestOptions,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn Store, embedder: &'a dyn Embedder, options: IngestOptions) -> Self {
        Self {
            store,
            embedder,
            options,
        }
    }

    /// Ingest `documents`, returning per-outcome counts.
    ///
    /// Returns [`Error::Validation`] without touching the store or the
    /// embedder if any document is malformed.
    pub async fn ingest(&self, documents: Vec<DocumentInput>) -> Result<IngestReport> {
        for doc in &documents {
            validate(doc)?;
        }

        let total = documents.len();
        let reports: Vec<IngestReport> = stream::iter(documents)
            .map(|doc| self.ingest_document(doc))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = IngestReport::default();
        for r in reports {
            report.merge(r);
        }

        info!(
            documents = total,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            dropped = report.dropped,
            failed = report.failures.len(),
            "ingest complete"
        );
        Ok(report)
    }

    async fn ingest_document(&self, doc: DocumentInput) -> IngestReport {
        let mut report = IngestReport::default();

        let mut prepared = Vec::with_capacity(doc.chunks.len());
        for chunk in &doc.chunks {
            let content = sanitize(&chunk.text, self.options.max_chunk_chars);
            if is_near_empty(&content, self.options.min_chunk_chars) {
                report.dropped += 1;
                continue;
            }
            let hash = identity_hash(
                &doc.namespace,
                doc.slot,
                &doc.source_id,
                chunk.chunk_no,
                &content,
            );
            prepared.push(PreparedChunk {
                chunk_no: chunk.chunk_no,
                content,
                hash,
            });
        }

        if prepared.is_empty() {
            return report;
        }

        match self.write_document(&doc, prepared).await {
            Ok((outcomes, skipped)) => {
                report.unchanged += skipped;
                for outcome in outcomes {
                    match outcome {
                        UpsertOutcome::Inserted => report.inserted += 1,
                        UpsertOutcome::Updated => report.updated += 1,
                        UpsertOutcome::Unchanged => report.unchanged += 1,
                    }
                }
            }
            Err((chunk_nos, err)) => {
                warn!(
                    namespace = %doc.namespace,
                    slot = %doc.slot,
                    source_id = %doc.source_id,
                    chunks = chunk_nos.len(),
                    error = %err,
                    "document ingest failed"
                );
                let message = err.to_string();
                report.dropped = 0;
                report.failures = chunk_nos
                    .into_iter()
                    .map(|no| ChunkFailure {
                        key: doc.key(no),
                        message: message.clone(),
                    })
                    .collect();
            }
        }

        report
    }

    /// Returns the store outcomes for written chunks plus the number of
    /// chunks skipped as unchanged before embedding. On failure, returns
    /// the chunk numbers affected.
    async fn write_document(
        &self,
        doc: &DocumentInput,
        prepared: Vec<PreparedChunk>,
    ) -> std::result::Result<(Vec<UpsertOutcome>, usize), (Vec<i64>, Error)> {
        let all_nos = || prepared.iter().map(|p| p.chunk_no).collect::<Vec<_>>();

        let existing = self
            .store
            .existing_hashes(&doc.namespace, doc.slot, &doc.source_id)
            .await
            .map_err(|e| (all_nos(), Error::Store(e)))?;

        let before = prepared.len();
        let changed: Vec<PreparedChunk> = prepared
            .into_iter()
            .filter(|p| existing.get(&p.chunk_no) != Some(&p.hash))
            .collect();
        let skipped = before - changed.len();

        if changed.is_empty() {
            debug!(source_id = %doc.source_id, skipped, "document unchanged");
            return Ok((Vec::new(), skipped));
        }

        let changed_nos = || changed.iter().map(|p| p.chunk_no).collect::<Vec<_>>();
        let texts: Vec<String> = changed.iter().map(|p| p.content.clone()).collect();
        let vectors = embed_many(self.embedder, &texts, &self.options.batch)
            .await
            .map_err(|e| (changed_nos(), e))?;

        let metadata = doc.chunk_metadata();
        let writes: Vec<ChunkWrite> = changed
            .iter()
            .zip(vectors)
            .map(|(p, embedding)| ChunkWrite {
                key: doc.key(p.chunk_no),
                content: p.content.clone(),
                embedding,
                content_hash: p.hash.clone(),
                published_at: doc.published_at,
                metadata: metadata.clone(),
            })
            .collect();

        let outcomes = self
            .store
            .upsert_chunks(&writes)
            .await
            .map_err(|e| (changed_nos(), Error::Store(e)))?;

        Ok((outcomes, skipped))
    }
}

fn validate(doc: &DocumentInput) -> Result<()> {
    if doc.namespace.trim().is_empty() {
        return Err(Error::validation(format!(
            "document '{}' has an empty namespace",
            doc.source_id
        )));
    }
    if doc.source_id.trim().is_empty() {
        return Err(Error::validation(format!(
            "document in namespace '{}' has an empty source_id",
            doc.namespace
        )));
    }
    if doc.chunks.is_empty() {
        return Err(Error::validation(format!(
            "document '{}' has no chunks",
            doc.source_id
        )));
    }
    let mut seen = HashSet::with_capacity(doc.chunks.len());
    for chunk in &doc.chunks {
        if chunk.chunk_no < 0 {
            return Err(Error::validation(format!(
                "document '{}' has negative chunk_no {}",
                doc.source_id, chunk.chunk_no
            )));
        }
        if !seen.insert(chunk.chunk_no) {
            return Err(Error::validation(format!(
                "document '{}' repeats chunk_no {}",
                doc.source_id, chunk.chunk_no
            )));
        }
    }
    Ok(())
}
