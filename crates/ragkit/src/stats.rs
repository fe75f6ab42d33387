//! Database statistics (`ragkit stats`).
//!
//! Prints the database size and a per namespace/slot breakdown of sources
//! and chunks, which is the quickest way to confirm a staging generation
//! is populated before switching readers to it.

use anyhow::Result;

use ragkit_core::store::{SlotStats, Store};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let rows = store.stats().await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let (sources, chunks) = totals(&rows);

    println!("ragkit database stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Sources:     {}", sources);
    println!("  Chunks:      {}", chunks);

    if !rows.is_empty() {
        println!();
        println!("  By namespace:");
        println!(
            "  {:<32} {:<8} {:>8} {:>8}",
            "NAMESPACE", "SLOT", "SOURCES", "CHUNKS"
        );
        println!("  {}", "-".repeat(60));
        for s in &rows {
            println!(
                "  {:<32} {:<8} {:>8} {:>8}",
                s.namespace, s.slot, s.sources, s.chunks
            );
        }
    }

    println!();
    Ok(())
}

fn totals(rows: &[SlotStats]) -> (u64, u64) {
    rows.iter()
        .fold((0, 0), |(src, ch), s| (src + s.sources, ch + s.chunks))
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::models::Slot;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_totals() {
        let rows = vec![
            SlotStats {
                namespace: "a".into(),
                slot: Slot::Staging,
                sources: 2,
                chunks: 7,
            },
            SlotStats {
                namespace: "a".into(),
                slot: Slot::Prod,
                sources: 1,
                chunks: 3,
            },
        ];
        assert_eq!(totals(&rows), (3, 10));
        assert_eq!(totals(&[]), (0, 0));
    }
}
