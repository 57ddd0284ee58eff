//! Backfill command - embed every listing that lacks a current vector

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use listing_search::store::{ListingStore, LAST_BACKFILL_KEY};

/// Run backfill command
pub fn run(json: bool) -> Result<()> {
    let store = ListingStore::open_cwd()?;

    if !json {
        println!("{} Backfilling embeddings...", "→".dimmed());
    }

    let report = store.auditor().backfill()?;
    store
        .db
        .set_meta(LAST_BACKFILL_KEY, &Utc::now().timestamp_millis().to_string())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "{} Scanned {} listings in {:.2}s",
        "✓".green().bold(),
        report.scanned.to_string().cyan(),
        report.duration_ms as f64 / 1000.0
    );
    println!(
        "  {} {} listings indexed",
        "→".dimmed(),
        report.succeeded
    );
    if report.skipped > 0 {
        println!(
            "  {} {} listings skipped (no text): {:?}",
            "→".dimmed(),
            report.skipped,
            report.skipped_ids
        );
    }
    if report.failed > 0 {
        println!(
            "  {} {} listings failed: {:?}",
            "✗".red(),
            report.failed,
            report.failed_ids
        );
        println!("  {} Re-run once the embedding model is reachable", "→".dimmed());
    }

    Ok(())
}
