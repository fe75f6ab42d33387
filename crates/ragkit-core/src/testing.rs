//! Test doubles shared by the pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use async_trait::async_trait;

use crate::embedding::Embedder;

/// Embeds text as keyword counts: dimension `i` is the number of times
/// `keywords[i]` occurs in the lowercased text.
///
/// Any batch containing `fail_on` is rejected, which lets tests fail one
/// document while others succeed.
pub(crate) struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    pub(crate) fail_on: Option<&'static str>,
    pub(crate) embedded: AtomicUsize,
}

impl KeywordEmbedder {
    pub(crate) fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            fail_on: None,
            embedded: AtomicUsize::new(0),
        }
    }

    pub(crate) fn embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }

    pub(crate) fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dims(&self) -> usize {
        self.keywords.len()
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if let Some(marker) = self.fail_on {
            if texts.iter().any(|t| t.contains(marker)) {
                bail!("provider rejected batch");
            }
        }
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}
