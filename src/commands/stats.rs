//! Stats command - corpus and index counts

use anyhow::Result;
use colored::Colorize;

use listing_search::search::embedding::EmbeddingProvider;
use listing_search::search::vectordb::ItemRepository;
use listing_search::store::{ListingStore, LAST_BACKFILL_KEY};

pub fn run(json: bool) -> Result<()> {
    let store = ListingStore::open_cwd()?;
    let provider = store.provider();
    let version = provider.model_version().as_str();
    let stats = store.db.stats(version)?;

    let last_backfill = store
        .db
        .get_meta(LAST_BACKFILL_KEY)?
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(chrono::DateTime::from_timestamp_millis);

    let file_size = std::fs::metadata(&store.paths.db)
        .map(|m| m.len())
        .unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "model_version": version,
                "dimension": provider.dimension(),
                "listing_count": stats.listing_count,
                "active_count": stats.active_count,
                "embedding_count": stats.embedding_count,
                "current_count": stats.current_count,
                "pending_count": stats.pending_count,
                "needs_indexing": stats.needs_indexing(),
                "last_updated": stats.last_updated.map(|t| t.to_rfc3339()),
                "last_backfill": last_backfill.map(|t| t.to_rfc3339()),
                "file_size_bytes": file_size,
            })
        );
        return Ok(());
    }

    println!("{}", "Index Status".bold());
    println!();
    println!(
        "  {} {} listings ({} active)",
        "→".dimmed(),
        stats.listing_count.to_string().cyan(),
        stats.active_count
    );
    println!(
        "  {} {} embeddings, {} current for {}",
        "→".dimmed(),
        stats.embedding_count.to_string().cyan(),
        stats.current_count,
        version
    );
    if stats.needs_indexing() > 0 {
        println!(
            "  {} {} listings need indexing ({} pending)",
            "!".yellow(),
            stats.needs_indexing(),
            stats.pending_count
        );
    }
    println!(
        "  {} Size: {:.2} KB",
        "→".dimmed(),
        file_size as f64 / 1024.0
    );
    if let Some(ts) = stats.last_updated {
        println!(
            "  {} Last write: {}",
            "→".dimmed(),
            ts.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Some(ts) = last_backfill {
        println!(
            "  {} Last backfill: {}",
            "→".dimmed(),
            ts.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
