//! Embedding provider trait, batcher, and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! the [`embed_many`] batcher that groups texts under count and token
//! budgets, and pure helpers for vector serialization and similarity.
//!
//! Concrete providers (OpenAI, Ollama, local hashing) live in the
//! `ragkit` app crate.
//!
//! # Batching
//!
//! 1. Each text is truncated to `max_item_tokens` (see
//!    [`truncate_for_embedding`]).
//! 2. Texts are grouped greedily, in input order, into batches of at most
//!    `max_items` texts and `max_batch_tokens` estimated tokens.
//! 3. Batches are sent with at most `concurrency` requests in flight.
//! 4. Every returned vector is checked against [`Embedder::dims`]; any
//!    mismatch fails the call with [`Error::DimensionMismatch`].

use std::ops::Range;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sanitize::{estimate_tokens, truncate_for_embedding};

/// Trait for embedding providers.
///
/// `embed` must return exactly one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one batch of texts.
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Count and size limits for [`embed_many`].
#[derive(Debug, Clone)]
pub struct BatchLimits {
    pub max_items: usize,
    pub max_batch_tokens: usize,
    pub max_item_tokens: usize,
    /// Maximum batches in flight at once.
    pub concurrency: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_items: 64,
            max_batch_tokens: 8000,
            max_item_tokens: 2000,
            concurrency: 4,
        }
    }
}

/// Group texts into contiguous index ranges that respect `limits`.
///
/// A single text larger than `max_batch_tokens` still gets a batch of its
/// own; callers truncate to `max_item_tokens` first.
pub fn plan_batches<S: AsRef<str>>(texts: &[S], limits: &BatchLimits) -> Vec<Range<usize>> {
    let max_items = limits.max_items.max(1);
    let mut batches = Vec::new();
    let mut start = 0;
    let mut tokens = 0;

    for (i, text) in texts.iter().enumerate() {
        let t = estimate_tokens(text.as_ref());
        let items = i - start;
        if items > 0 && (items >= max_items || tokens + t > limits.max_batch_tokens) {
            batches.push(start..i);
            start = i;
            tokens = 0;
        }
        tokens += t;
    }
    if start < texts.len() {
        batches.push(start..texts.len());
    }
    batches
}

/// Embed `texts` in bounded batches, preserving input order.
///
/// Returns one vector per input text. Fails on the first provider error
/// or dimension mismatch; nothing is silently padded or dropped.
pub async fn embed_many<E>(
    embedder: &E,
    texts: &[String],
    limits: &BatchLimits,
) -> Result<Vec<Vec<f32>>>
where
    E: Embedder + ?Sized,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let prepared: Vec<String> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let cut = truncate_for_embedding(t, limits.max_item_tokens);
            if cut.len() < t.len() {
                debug!(
                    index = i,
                    from_tokens = estimate_tokens(t),
                    to_tokens = limits.max_item_tokens,
                    "truncating text for embedding"
                );
            }
            cut.to_string()
        })
        .collect();

    let batches = plan_batches(&prepared, limits);
    debug!(
        texts = prepared.len(),
        batches = batches.len(),
        model = embedder.model_name(),
        "embedding batches planned"
    );

    let dims = embedder.dims();
    let prepared = &prepared;
    let results: Vec<Vec<Vec<f32>>> = stream::iter(batches)
        .map(|range| async move {
            let vectors = embedder
                .embed(&prepared[range.clone()])
                .await
                .map_err(Error::Embedding)?;
            check_batch(&vectors, range, dims)?;
            Ok::<_, Error>(vectors)
        })
        .buffered(limits.concurrency.max(1))
        .try_collect()
        .await?;

    Ok(results.into_iter().flatten().collect())
}

/// Embed a single query text with dimension validation.
pub async fn embed_query<E>(embedder: &E, query: &str, limits: &BatchLimits) -> Result<Vec<f32>>
where
    E: Embedder + ?Sized,
{
    embed_many(embedder, &[query.to_string()], limits)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding(anyhow!("Empty embedding response")))
}

fn check_batch(vectors: &[Vec<f32>], range: Range<usize>, dims: usize) -> Result<()> {
    if vectors.len() != range.len() {
        return Err(Error::Embedding(anyhow!(
            "Embedding batch {}..{} returned {} vectors, expected {}",
            range.start,
            range.end,
            vectors.len(),
            range.len()
        )));
    }
    for (offset, v) in vectors.iter().enumerate() {
        if v.len() != dims {
            return Err(Error::DimensionMismatch {
                index: range.start + offset,
                expected: dims,
                actual: v.len(),
            });
        }
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use ragkit_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}
