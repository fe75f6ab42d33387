//! `ragkit purge`: remove one source or a whole namespace/slot generation.

use anyhow::{bail, Result};

use ragkit_core::models::Slot;
use ragkit_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Delete `source_id` from `namespace`@`slot`, or the entire generation
/// when no source is given. Returns the number of chunks removed.
pub async fn purge(
    config: &Config,
    namespace: &str,
    slot: Slot,
    source_id: Option<&str>,
) -> Result<u64> {
    if namespace.trim().is_empty() {
        bail!("--namespace must not be empty");
    }

    let store = SqliteStore::open(config).await?;
    let removed = match source_id {
        Some(source) => store.delete_source(namespace, slot, source).await?,
        None => store.purge_slot(namespace, slot).await?,
    };
    store.close().await;
    Ok(removed)
}

pub async fn run_purge(
    config: &Config,
    namespace: &str,
    slot: Slot,
    source_id: Option<&str>,
) -> Result<()> {
    let removed = purge(config, namespace, slot, source_id).await?;
    match source_id {
        Some(source) => println!(
            "Removed {} chunk{} of {} from {}@{}",
            removed,
            if removed == 1 { "" } else { "s" },
            source,
            namespace,
            slot
        ),
        None => println!(
            "Purged {} chunk{} from {}@{}",
            removed,
            if removed == 1 { "" } else { "s" },
            namespace,
            slot
        ),
    }
    Ok(())
}
