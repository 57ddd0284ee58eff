//! Search command - hybrid listing search

use anyhow::Result;
use colored::Colorize;

use listing_search::search::engine::{SearchMode, SearchRequest};
use listing_search::store::ListingStore;

/// Run search command
pub fn run(request: SearchRequest, fallback: bool, json: bool) -> Result<()> {
    let mut store = ListingStore::open_cwd()?;
    if fallback {
        store = store.offline();
    }

    let page = store.engine().search(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    let query = request.query.trim();
    let label = if query.is_empty() { "(browse)" } else { query };

    if page.degraded() {
        println!(
            "{} Embedding model unavailable, using keyword search",
            "!".yellow()
        );
        println!();
    }

    if page.hits.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), label.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {} (page {}/{})",
        "→".dimmed(),
        page.total,
        label.cyan(),
        page.page + 1,
        page.pages.max(1)
    );
    println!();

    let offset = page.page * page.page_size;
    for (i, hit) in page.hits.iter().enumerate() {
        let rank = (offset + i + 1).to_string();
        if page.mode == SearchMode::Browse {
            println!("{}. {}", rank.bold(), hit.title.cyan());
        } else {
            let score_str = format!("{:.2}", hit.score);
            let score_colored = if hit.score > 0.7 {
                score_str.green()
            } else if hit.score > 0.4 {
                score_str.yellow()
            } else {
                score_str.dimmed()
            };
            println!("{}. [{}] {}", rank.bold(), score_colored, hit.title.cyan());
        }

        println!(
            "   #{} | {} | {:.2}",
            hit.id,
            hit.category.as_deref().unwrap_or("uncategorized"),
            hit.price
        );
        if let Some(similarity) = hit.similarity {
            println!(
                "   {}",
                format!("similarity {:.2}, keyword {:.2}", similarity, hit.keyword).dimmed()
            );
        }
        println!();
    }

    Ok(())
}
