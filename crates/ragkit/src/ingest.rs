//! File and directory ingestion (`ragkit ingest`).
//!
//! A single file becomes one document. A directory is walked recursively;
//! every file matching the include globs becomes a document whose
//! `source_id` is its path relative to the directory, so re-running the
//! command on the same tree is idempotent.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use ragkit_core::ingest::{IngestReport, Ingestor};
use ragkit_core::models::{DocumentInput, MetaValue, Slot};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

pub fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

/// Arguments of one `ragkit ingest` invocation.
#[derive(Debug, Clone)]
pub struct IngestArgs {
    pub path: PathBuf,
    pub namespace: String,
    pub slot: Slot,
    /// Single-file only; defaults to the file name.
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Defaults to each file's modification time.
    pub published_at: Option<DateTime<Utc>>,
    pub include: Vec<String>,
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD.", s))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date '{}'", s))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Build documents for every file under `args.path`.
///
/// Files that are not valid UTF-8 or contain no text are skipped.
pub fn collect_documents(config: &Config, args: &IngestArgs) -> Result<Vec<DocumentInput>> {
    let path = &args.path;
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        let source_id = match &args.source_id {
            Some(id) => id.clone(),
            None => file_name(path),
        };
        return Ok(file_to_document(config, args, path, &source_id)?
            .into_iter()
            .collect());
    }

    if args.source_id.is_some() || args.url.is_some() {
        bail!("--source-id and --url apply to single files only");
    }

    let include_set = build_globset(&args.include)?;
    let exclude_set = build_globset(DEFAULT_EXCLUDES)?;

    let mut docs = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file = entry.path();
        let relative = file.strip_prefix(path).unwrap_or(file);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        if let Some(doc) = file_to_document(config, args, file, &rel_str)? {
            docs.push(doc);
        }
    }

    docs.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(docs)
}

fn file_to_document(
    config: &Config,
    args: &IngestArgs,
    path: &Path,
    source_id: &str,
) -> Result<Option<DocumentInput>> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return Ok(None);
        }
    };

    let mut doc = DocumentInput::from_text(
        &args.namespace,
        args.slot,
        source_id,
        &body,
        config.chunking.chars,
        config.chunking.overlap,
    );
    if doc.chunks.is_empty() {
        debug!(path = %path.display(), "skipping empty file");
        return Ok(None);
    }

    doc.title = Some(args.title.clone().unwrap_or_else(|| file_name(path)));
    doc.url = Some(match &args.url {
        Some(url) => url.clone(),
        None => format!("file://{}", absolute(path).display()),
    });
    doc.published_at = args.published_at.or_else(|| modified_at(path));
    doc.metadata.insert(
        "path".to_string(),
        MetaValue::from(path.to_string_lossy().to_string()),
    );

    Ok(Some(doc))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern.as_ref())?);
    }
    Ok(builder.build()?)
}

/// Run `ragkit ingest` and print the outcome counts.
pub async fn run_ingest(config: &Config, args: &IngestArgs) -> Result<IngestReport> {
    if !config.embedding.is_enabled() {
        bail!("Ingest requires embeddings. Set [embedding] provider in config.");
    }

    let docs = collect_documents(config, args)?;
    if docs.is_empty() {
        println!("No documents found under {}", args.path.display());
        return Ok(IngestReport::default());
    }
    let doc_count = docs.len();

    let embedder = create_provider(&config.embedding)?;
    let store = SqliteStore::open(config).await?;
    let ingestor = Ingestor::new(&store, embedder.as_ref(), config.ingest_options());
    let report = ingestor.ingest(docs).await?;
    store.close().await;

    println!(
        "Ingested {} document{} into {}@{}",
        doc_count,
        if doc_count == 1 { "" } else { "s" },
        args.namespace,
        args.slot
    );
    println!("  inserted:  {}", report.inserted);
    println!("  updated:   {}", report.updated);
    println!("  unchanged: {}", report.unchanged);
    println!("  dropped:   {}", report.dropped);
    println!("  failed:    {}", report.failures.len());
    for failure in &report.failures {
        println!("    {}: {}", failure.key, failure.message);
    }

    Ok(report)
}
