//! Configuration parsing and validation.
//!
//! ragkit is configured via a TOML file (default `config/ragkit.toml`).
//! Only `[db]` is required; every other section falls back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/ragkit.sqlite"
//!
//! [chunking]
//! chars = 1200
//! # overlap = 180
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [retrieval]
//! top_k = 8
//! candidate_k = 40
//! namespace_mode = "strict"
//!
//! [recency.default]
//! half_life_days = 30
//!
//! [recency.namespaces."news"]
//! half_life_days = 3
//! ttl_days = 30
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use ragkit_core::chunk::DEFAULT_CHUNK_CHARS;
use ragkit_core::embedding::BatchLimits;
use ragkit_core::ingest::IngestOptions;
use ragkit_core::mmr::DEFAULT_LAMBDA;
use ragkit_core::models::NamespaceMode;
use ragkit_core::recency::{RecencyConfig, RecencyTable};
use ragkit_core::retrieve::{DEFAULT_CANDIDATE_K, DEFAULT_TOP_K};
use ragkit_core::sanitize::{DEFAULT_MAX_CHUNK_CHARS, DEFAULT_MIN_CHUNK_CHARS};

pub const DEFAULT_CONFIG_PATH: &str = "./config/ragkit.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub recency: RecencySection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chars")]
    pub chars: usize,
    /// Defaults to 15% of `chars`.
    #[serde(default)]
    pub overlap: Option<usize>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chars: default_chars(),
            overlap: None,
        }
    }
}

fn default_chars() -> usize {
    DEFAULT_CHUNK_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_ingest_concurrency(),
            max_chunk_chars: default_max_chunk_chars(),
            min_chunk_chars: default_min_chunk_chars(),
        }
    }
}

fn default_ingest_concurrency() -> usize {
    8
}
fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}
fn default_min_chunk_chars() -> usize {
    DEFAULT_MIN_CHUNK_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_batch_tokens")]
    pub max_batch_tokens: usize,
    #[serde(default = "default_max_item_tokens")]
    pub max_item_tokens: usize,
    #[serde(default = "default_embed_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_items: default_max_items(),
            max_batch_tokens: default_max_batch_tokens(),
            max_item_tokens: default_max_item_tokens(),
            concurrency: default_embed_concurrency(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_items() -> usize {
    64
}
fn default_max_batch_tokens() -> usize {
    8000
}
fn default_max_item_tokens() -> usize {
    2000
}
fn default_embed_concurrency() -> usize {
    4
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_items: self.max_items,
            max_batch_tokens: self.max_batch_tokens,
            max_item_tokens: self.max_item_tokens,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f64,
    #[serde(default)]
    pub namespace_mode: NamespaceMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_k: default_candidate_k(),
            min_score: 0.0,
            mmr_lambda: default_mmr_lambda(),
            namespace_mode: NamespaceMode::default(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_candidate_k() -> usize {
    DEFAULT_CANDIDATE_K
}
fn default_mmr_lambda() -> f64 {
    DEFAULT_LAMBDA
}

/// `[recency.default]` plus `[recency.namespaces."<ns>"]` overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RecencySection {
    #[serde(default)]
    pub default: RecencyConfig,
    #[serde(default)]
    pub namespaces: HashMap<String, RecencyConfig>,
}

impl RecencySection {
    pub fn table(&self) -> RecencyTable {
        let mut table = RecencyTable::new(self.default.clone());
        for (ns, cfg) in &self.namespaces {
            table.insert(ns, cfg.clone());
        }
        table
    }
}

impl Config {
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            max_chunk_chars: self.ingest.max_chunk_chars,
            min_chunk_chars: self.ingest.min_chunk_chars,
            concurrency: self.ingest.concurrency,
            batch: self.embedding.batch_limits(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chars == 0 {
        bail!("chunking.chars must be > 0");
    }

    if config.ingest.concurrency == 0 {
        bail!("ingest.concurrency must be >= 1");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.candidate_k < 1 {
        bail!("retrieval.candidate_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.mmr_lambda) {
        bail!("retrieval.mmr_lambda must be in [0.0, 1.0]");
    }
    if !config.retrieval.min_score.is_finite() {
        bail!("retrieval.min_score must be finite");
    }

    validate_recency("recency.default", &config.recency.default)?;
    for (ns, cfg) in &config.recency.namespaces {
        if ns.trim_matches('/').is_empty() {
            bail!("recency.namespaces keys must be non-empty");
        }
        validate_recency(&format!("recency.namespaces.\"{}\"", ns), cfg)?;
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() && config.embedding.provider != "hash" {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.concurrency == 0 || config.embedding.max_items == 0 {
            bail!("embedding.concurrency and embedding.max_items must be >= 1");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or hash.",
            other
        ),
    }

    Ok(config)
}

fn validate_recency(section: &str, cfg: &RecencyConfig) -> Result<()> {
    if !(cfg.half_life_days.is_finite() && cfg.half_life_days > 0.0) {
        bail!("{}.half_life_days must be > 0", section);
    }
    if let Some(ttl) = cfg.ttl_days {
        if !(ttl.is_finite() && ttl > 0.0) {
            bail!("{}.ttl_days must be > 0", section);
        }
    }
    for (name, w) in [("alpha", cfg.alpha), ("beta", cfg.beta), ("gamma", cfg.gamma)] {
        if !w.is_finite() || w < 0.0 {
            bail!("{}.{} must be a non-negative number", section, name);
        }
    }
    Ok(())
}
