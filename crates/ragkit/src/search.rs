//! `ragkit search`: run the retrieval pipeline and print ranked results.

use anyhow::{bail, Result};

use ragkit_core::filter::DomainFilter;
use ragkit_core::models::{NamespaceMode, Slot};
use ragkit_core::retrieve::{RetrieveRequest, RetrievedItem, Retriever};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;

/// Arguments of one `ragkit search` invocation. `None` fields fall back to
/// the `[retrieval]` config section.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub namespace: String,
    pub slot: Option<Slot>,
    pub top_k: Option<usize>,
    pub candidate_k: Option<usize>,
    pub min_score: Option<f64>,
    /// Include namespaces beneath `namespace`.
    pub prefix: bool,
    pub allow_domains: Vec<String>,
    pub deny_domains: Vec<String>,
}

/// Build a [`RetrieveRequest`] from CLI arguments and config defaults.
pub fn build_request(config: &Config, args: &SearchArgs) -> RetrieveRequest {
    let retrieval = &config.retrieval;
    let mut request = RetrieveRequest::new(
        &args.namespace,
        args.slot.unwrap_or(Slot::Prod),
        &args.query,
    );
    request.top_k = args.top_k.unwrap_or(retrieval.top_k);
    request.candidate_k = args.candidate_k.unwrap_or(retrieval.candidate_k);
    request.min_score = args.min_score.unwrap_or(retrieval.min_score);
    request.lambda = retrieval.mmr_lambda;
    request.namespace_mode = if args.prefix {
        NamespaceMode::Prefix
    } else {
        retrieval.namespace_mode
    };
    request.domains = DomainFilter::new(&args.allow_domains, &args.deny_domains);
    request
}

/// Run the retrieval pipeline against the configured database.
pub async fn search(config: &Config, args: &SearchArgs) -> Result<Vec<RetrievedItem>> {
    if args.query.trim().is_empty() {
        return Ok(Vec::new());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let embedder = create_provider(&config.embedding)?;
    let store = SqliteStore::open(config).await?;
    let table = config.recency.table();
    let retriever = Retriever::new(&store, embedder.as_ref(), &table)
        .with_limits(config.embedding.batch_limits());

    let items = retriever.retrieve(&build_request(config, args)).await?;
    store.close().await;
    Ok(items)
}

/// Run `ragkit search` and print results as text or JSON.
pub async fn run_search(config: &Config, args: &SearchArgs, json: bool) -> Result<()> {
    let items = search(config, args).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, item) in items.iter().enumerate() {
        let title_display = item.title.as_deref().unwrap_or("(untitled)");
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            item.score,
            item.namespace,
            title_display
        );
        println!("    source: {}#{}", item.source_id, item.chunk_no);
        if let Some(published) = item.published_at {
            println!("    published: {}", published.format("%Y-%m-%d"));
        }
        if let Some(ref url) = item.url {
            println!("    url: {}", url);
        }
        println!("    similarity: {:.3}", item.similarity);
        println!("    excerpt: \"{}\"", item.snippet.replace('\n', " ").trim());
        println!("    id: {}", item.id);
        println!();
    }

    Ok(())
}
