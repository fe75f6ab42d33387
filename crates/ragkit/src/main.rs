//! # ragkit CLI
//!
//! ```bash
//! ragkit --config ./config/ragkit.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragkit init` | Create the SQLite database and schema |
//! | `ragkit ingest <PATH>` | Chunk, embed and upsert a file or directory |
//! | `ragkit search "<query>"` | Hybrid retrieval with recency and MMR |
//! | `ragkit get` | Print one stored chunk |
//! | `ragkit purge` | Remove a source or a namespace/slot generation |
//! | `ragkit stats` | Source and chunk counts per namespace/slot |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `ragkit=info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragkit::config::{self, DEFAULT_CONFIG_PATH};
use ragkit::ingest::{default_include_globs, parse_date, IngestArgs};
use ragkit::models::Slot;
use ragkit::search::SearchArgs;
use ragkit::{get, ingest, migrate, purge, search, stats};

/// ragkit: hybrid retrieval and content-addressed ingestion for RAG backends.
#[derive(Parser)]
#[command(name = "ragkit", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest a file, or every matching file under a directory.
    ///
    /// Unchanged chunks are skipped without calling the embedding provider.
    Ingest {
        path: PathBuf,

        #[arg(long)]
        namespace: String,

        /// `staging` or `prod`.
        #[arg(long, default_value = "staging")]
        slot: Slot,

        /// Source id for a single file. Defaults to the file name.
        #[arg(long)]
        source_id: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        url: Option<String>,

        /// Publication date (YYYY-MM-DD or RFC 3339). Defaults to file mtime.
        #[arg(long)]
        published_at: Option<String>,

        /// Include globs for directory walks. Repeatable.
        #[arg(long = "include")]
        include: Vec<String>,
    },

    /// Retrieve the most relevant chunks for a query.
    Search {
        query: String,

        #[arg(long)]
        namespace: String,

        #[arg(long, default_value = "prod")]
        slot: Slot,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        candidate_k: Option<usize>,

        #[arg(long)]
        min_score: Option<f64>,

        /// Also match namespaces beneath `--namespace`.
        #[arg(long)]
        prefix: bool,

        /// Keep only results whose URL contains this pattern. Repeatable.
        #[arg(long = "allow-domain")]
        allow_domain: Vec<String>,

        /// Drop results whose URL contains this pattern. Repeatable.
        #[arg(long = "deny-domain")]
        deny_domain: Vec<String>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one stored chunk.
    Get {
        #[arg(long)]
        namespace: String,

        #[arg(long, default_value = "prod")]
        slot: Slot,

        #[arg(long)]
        source_id: String,

        #[arg(long, default_value_t = 0)]
        chunk_no: i64,
    },

    /// Remove a source, or a whole namespace/slot generation.
    Purge {
        #[arg(long)]
        namespace: String,

        #[arg(long)]
        slot: Slot,

        #[arg(long)]
        source_id: Option<String>,
    },

    /// Show source and chunk counts per namespace/slot.
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ragkit=info,ragkit_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            namespace,
            slot,
            source_id,
            title,
            url,
            published_at,
            include,
        } => {
            let published_at = published_at.as_deref().map(parse_date).transpose()?;
            let args = IngestArgs {
                path,
                namespace,
                slot,
                source_id,
                title,
                url,
                published_at,
                include: if include.is_empty() {
                    default_include_globs()
                } else {
                    include
                },
            };
            let report = ingest::run_ingest(&cfg, &args).await?;
            if !report.failures.is_empty() {
                std::process::exit(2);
            }
        }
        Commands::Search {
            query,
            namespace,
            slot,
            top_k,
            candidate_k,
            min_score,
            prefix,
            allow_domain,
            deny_domain,
            json,
        } => {
            let args = SearchArgs {
                query,
                namespace,
                slot: Some(slot),
                top_k,
                candidate_k,
                min_score,
                prefix,
                allow_domains: allow_domain,
                deny_domains: deny_domain,
            };
            search::run_search(&cfg, &args, json).await?;
        }
        Commands::Get {
            namespace,
            slot,
            source_id,
            chunk_no,
        } => {
            get::run_get(&cfg, &namespace, slot, &source_id, chunk_no).await?;
        }
        Commands::Purge {
            namespace,
            slot,
            source_id,
        } => {
            purge::run_purge(&cfg, &namespace, slot, source_id.as_deref()).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
    }

    Ok(())
}
