pub mod add;
pub mod backfill;
pub mod import;
pub mod init;
pub mod search;
pub mod stats;
pub mod suggest;
pub mod update;
pub mod verify;

use colored::*;
use listing_search::search::indexer::{IndexOutcome, WriteReport};

/// Human-readable line for a write outcome.
pub(crate) fn print_write_report(verb: &str, report: &WriteReport) {
    let listing = &report.listing;
    println!(
        "{} {} #{} {}",
        "✓".green().bold(),
        verb,
        listing.id.to_string().cyan(),
        listing.title
    );

    match (&report.index_error, report.outcome) {
        (_, IndexOutcome::Skipped) => println!(
            "  {} Not searchable by similarity: title and description have no words",
            "!".yellow().bold()
        ),
        (Some(e), _) => println!(
            "  {} Embedding deferred: {} (run {} later)",
            "!".yellow().bold(),
            e,
            "listings backfill".cyan()
        ),
        (None, IndexOutcome::Deferred) => println!(
            "  {} Queued for indexing (deferred mode)",
            "→".dimmed()
        ),
        (None, IndexOutcome::Cleared) => println!(
            "  {} Removed from search ({})",
            "→".dimmed(),
            listing.status
        ),
        (None, outcome) => println!(
            "  {} Index: {}",
            "→".dimmed(),
            format!("{:?}", outcome).to_lowercase()
        ),
    }
}

pub(crate) fn write_report_json(report: &WriteReport) -> serde_json::Value {
    let listing = &report.listing;
    serde_json::json!({
        "id": listing.id,
        "title": listing.title,
        "status": listing.status,
        "index_state": listing.index_state,
        "outcome": report.outcome,
        "index_error": report.index_error.as_ref().map(|e| e.to_string()),
        "updated_at": listing.updated_at.to_rfc3339(),
    })
}
