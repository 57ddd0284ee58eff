//! Import command - bulk-create listings from a JSON array of drafts

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use listing_search::core::listing::ListingDraft;
use listing_search::store::ListingStore;
use listing_search::SearchError;

pub fn run(file: &Path, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let drafts: Vec<ListingDraft> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of listings", file.display()))?;

    let store = ListingStore::open_cwd()?;
    let indexer = store.indexer();

    let mut created = Vec::new();
    let mut rejected = Vec::new();
    let mut deferred = 0;

    for (i, draft) in drafts.iter().enumerate() {
        match indexer.create(draft) {
            Ok(report) => {
                if report.index_error.is_some() {
                    deferred += 1;
                }
                created.push(report.listing.id);
            }
            Err(SearchError::InvalidInput(reason)) => {
                rejected.push(serde_json::json!({ "index": i, "error": reason }));
            }
            Err(e) => return Err(e).context(format!("Failed to import entry {}", i)),
        }
    }

    tracing::info!(created = created.len(), rejected = rejected.len(), "import finished");

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "created": created,
                "rejected": rejected,
                "index_failures": deferred,
            }))?
        );
    } else {
        println!(
            "{} Imported {} listings from {}",
            "✓".green().bold(),
            created.len().to_string().cyan(),
            file.display()
        );
        if !rejected.is_empty() {
            println!("  {} {} entries rejected", "✗".red(), rejected.len());
            for entry in &rejected {
                println!("    {}", entry.to_string().dimmed());
            }
        }
        if deferred > 0 {
            println!(
                "  {} {} listings saved without embeddings; run {}",
                "!".yellow(),
                deferred,
                "listings backfill".cyan()
            );
        }
    }

    Ok(())
}
