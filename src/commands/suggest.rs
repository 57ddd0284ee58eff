use anyhow::Result;
use colored::Colorize;

use listing_search::store::ListingStore;

pub fn run(query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let store = ListingStore::open_cwd()?;
    let suggestions = store.autocomplete().suggest(query, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    if suggestions.is_empty() {
        println!("{} No titles match: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    for suggestion in &suggestions {
        println!(
            "{} {}",
            format!("#{}", suggestion.id).dimmed(),
            suggestion.title
        );
    }
    Ok(())
}
