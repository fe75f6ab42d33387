//! Chunk lookup by key (`ragkit get`).
//!
//! ```bash
//! ragkit get --namespace team/docs --slot prod --source-id guide.md --chunk-no 0
//! ```

use anyhow::{bail, Result};

use ragkit_core::models::{ChunkKey, ChunkRecord, Slot};
use ragkit_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Fetch one stored chunk. A missing chunk is an error.
pub async fn get_chunk(config: &Config, key: &ChunkKey) -> Result<ChunkRecord> {
    let store = SqliteStore::open(config).await?;
    let result = store.get_chunk(key).await?;
    store.close().await;

    match result {
        Some(record) => Ok(record),
        None => bail!("chunk not found: {}", key),
    }
}

/// CLI entry point for `ragkit get`.
pub async fn run_get(
    config: &Config,
    namespace: &str,
    slot: Slot,
    source_id: &str,
    chunk_no: i64,
) -> Result<()> {
    let key = ChunkKey {
        namespace: namespace.to_string(),
        slot,
        source_id: source_id.to_string(),
        chunk_no,
    };
    let record = get_chunk(config, &key).await?;

    println!("--- Chunk ---");
    println!("id:           {}", record.id);
    println!("key:          {}", record.key);
    println!("content_hash: {}", record.content_hash);
    if let Some(published) = record.published_at {
        println!("published_at: {}", published.to_rfc3339());
    }
    println!("created_at:   {}", record.created_at.to_rfc3339());
    println!("updated_at:   {}", record.updated_at.to_rfc3339());
    println!("dims:         {}", record.embedding.len());
    println!("metadata:     {}", serde_json::to_string(&record.metadata)?);
    println!();

    println!("--- Content ---");
    println!("{}", record.content);

    Ok(())
}
