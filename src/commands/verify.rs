//! Verify command - read-only embedding health check

use anyhow::Result;
use colored::*;

use listing_search::store::ListingStore;

pub fn run(strict: bool, json: bool) -> Result<()> {
    let store = ListingStore::open_cwd()?;
    let report = store.auditor().verify()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "Index Verification".bold());
        println!("{}", "=".repeat(50));
        println!();
        println!("Checked: {} active listings", report.checked.to_string().cyan());
        println!();

        if report.violations.is_empty() {
            println!("{} No invariant violations", "✓".green());
        } else {
            println!("{} {} violations", "✗".red(), report.violations.len());
            for entry in &report.violations {
                println!(
                    "  {} #{} {}: {}",
                    "-".red(),
                    entry.id,
                    entry.violation.kind().yellow(),
                    entry.violation
                );
            }
        }

        print_ids("stale", &report.stale_ids);
        print_ids("missing", &report.missing_ids);

        println!();
        if report.is_healthy() {
            println!("{}", "✓ Index is consistent".green());
        } else {
            println!(
                "{}",
                "Run `listings backfill` to repair stale and missing embeddings.".yellow()
            );
        }
    }

    if strict && !report.is_healthy() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_ids(label: &str, ids: &[i64]) {
    if ids.is_empty() {
        return;
    }
    let shown: Vec<String> = ids.iter().take(20).map(|id| format!("#{}", id)).collect();
    let more = if ids.len() > shown.len() {
        format!(" (+{} more)", ids.len() - shown.len())
    } else {
        String::new()
    };
    println!(
        "{} {} {}: {}{}",
        "!".yellow(),
        ids.len(),
        label,
        shown.join(", "),
        more
    );
}
