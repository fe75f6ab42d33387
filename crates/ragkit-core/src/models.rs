//! Core data models shared by the ingestion and retrieval pipelines.
//!
//! A chunk is identified by its [`ChunkKey`], the
//! `(namespace, slot, source_id, chunk_no)` tuple that stores must treat
//! as a unique constraint. Everything else on a chunk is payload that is
//! replaced in place when the content hash changes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::chunk_text;
use crate::error::Error;

/// One of the two parallel generations of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Staging,
    Prod,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Staging => "staging",
            Slot::Prod => "prod",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staging" => Ok(Slot::Staging),
            "prod" => Ok(Slot::Prod),
            _ => Err(Error::InvalidSlot(s.to_string())),
        }
    }
}

/// How a requested namespace is matched against stored namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceMode {
    /// Exact equality.
    #[default]
    Strict,
    /// The namespace itself or anything beneath it on a `/` boundary.
    Prefix,
}

impl FromStr for NamespaceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(NamespaceMode::Strict),
            "prefix" => Ok(NamespaceMode::Prefix),
            _ => Err(Error::InvalidNamespaceMode(s.to_string())),
        }
    }
}

/// A scalar metadata value. Metadata is deliberately flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::String(s)
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        MetaValue::Number(n)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// Open key-value map attached to every chunk (title, url, path, language…).
pub type Metadata = BTreeMap<String, MetaValue>;

pub const META_TITLE: &str = "title";
pub const META_URL: &str = "url";

/// The unique upsert key of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkKey {
    pub namespace: String,
    pub slot: Slot,
    pub source_id: String,
    pub chunk_no: i64,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}#{}",
            self.namespace, self.slot, self.source_id, self.chunk_no
        )
    }
}

/// A positional chunk of a document, before sanitization.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInput {
    pub chunk_no: i64,
    pub text: String,
}

/// A source document submitted for ingestion.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub namespace: String,
    pub slot: Slot,
    pub source_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Logical content date; distinct from ingestion time.
    pub published_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub chunks: Vec<ChunkInput>,
}

impl DocumentInput {
    pub fn new(namespace: &str, slot: Slot, source_id: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            slot,
            source_id: source_id.to_string(),
            title: None,
            url: None,
            published_at: None,
            metadata: Metadata::new(),
            chunks: Vec::new(),
        }
    }

    /// Build a document by splitting `text` with the window chunker.
    pub fn from_text(
        namespace: &str,
        slot: Slot,
        source_id: &str,
        text: &str,
        chars: usize,
        overlap: Option<usize>,
    ) -> Self {
        let mut doc = Self::new(namespace, slot, source_id);
        doc.chunks = chunk_text(text, chars, overlap)
            .into_iter()
            .enumerate()
            .map(|(i, text)| ChunkInput {
                chunk_no: i as i64,
                text,
            })
            .collect();
        doc
    }

    pub fn with_chunks<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| ChunkInput {
                chunk_no: i as i64,
                text: t.into(),
            })
            .collect();
        self
    }

    pub fn key(&self, chunk_no: i64) -> ChunkKey {
        ChunkKey {
            namespace: self.namespace.clone(),
            slot: self.slot,
            source_id: self.source_id.clone(),
            chunk_no,
        }
    }

    /// Metadata with `title` and `url` folded in, as stored on each chunk.
    pub fn chunk_metadata(&self) -> Metadata {
        let mut meta = self.metadata.clone();
        if let Some(ref t) = self.title {
            meta.insert(META_TITLE.to_string(), MetaValue::from(t.as_str()));
        }
        if let Some(ref u) = self.url {
            meta.insert(META_URL.to_string(), MetaValue::from(u.as_str()));
        }
        meta
    }
}

/// A fully prepared row handed to [`Store::upsert_chunks`](crate::store::Store::upsert_chunks).
#[derive(Debug, Clone)]
pub struct ChunkWrite {
    pub key: ChunkKey,
    pub content: String,
    pub embedding: Vec<f32>,
    pub content_hash: String,
    pub published_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

/// Result of a single keyed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// A stored chunk.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub key: ChunkKey,
    pub content: String,
    pub embedding: Vec<f32>,
    pub content_hash: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
}

/// A chunk returned by the store's candidate fetch, with dense similarity
/// and lexical rank already computed. Lives only for one query.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub key: ChunkKey,
    pub content: String,
    pub embedding: Vec<f32>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
    /// Cosine similarity to the query vector.
    pub dense: f64,
    /// Raw lexical rank; may be unbounded.
    pub lexical: f64,
    /// Age from `published_at`, falling back to `created_at`.
    pub age_days: f64,
}

impl Candidate {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get(META_TITLE).and_then(MetaValue::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.metadata.get(META_URL).and_then(MetaValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_parse() {
        assert_eq!("staging".parse::<Slot>().unwrap(), Slot::Staging);
        assert_eq!("PROD".parse::<Slot>().unwrap(), Slot::Prod);
        assert!(matches!(
            "canary".parse::<Slot>(),
            Err(Error::InvalidSlot(s)) if s == "canary"
        ));
    }

    #[test]
    fn test_metadata_json_shape() {
        let mut meta = Metadata::new();
        meta.insert("title".into(), "Guide".into());
        meta.insert("pages".into(), 12.0.into());
        meta.insert("draft".into(), false.into());
        meta.insert("lang".into(), MetaValue::Null);
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(
            json,
            r#"{"draft":false,"lang":null,"pages":12.0,"title":"Guide"}"#
        );
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_from_text_numbers_chunks() {
        let text = "a".repeat(25);
        let doc = DocumentInput::from_text("n", Slot::Staging, "s", &text, 10, Some(2));
        let nos: Vec<i64> = doc.chunks.iter().map(|c| c.chunk_no).collect();
        assert_eq!(nos, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_chunk_metadata_folds_title_and_url() {
        let mut doc = DocumentInput::new("n", Slot::Prod, "s");
        doc.title = Some("T".into());
        doc.url = Some("https://example.com/a".into());
        let meta = doc.chunk_metadata();
        assert_eq!(meta.get(META_TITLE).and_then(MetaValue::as_str), Some("T"));
        assert_eq!(
            meta.get(META_URL).and_then(MetaValue::as_str),
            Some("https://example.com/a")
        );
    }
}
