use anyhow::{Context, Result};
use colored::*;
use std::fs;

use listing_search::core::config::SearchConfig;
use listing_search::core::paths::StorePaths;
use listing_search::search::embedding::EmbeddingProvider;
use listing_search::store::ListingStore;

pub fn run(force: bool) -> Result<()> {
    let paths = StorePaths::new()?;

    println!("{}", "Listing store setup".bold());
    println!("{}", "=".repeat(50));
    println!();

    paths.ensure_data_dir()?;
    println!("{} {} ready", "✓".green(), paths.data.display());

    if paths.config.exists() && !force {
        println!(
            "{} {} exists (use --force to reset)",
            "→".dimmed(),
            paths.config.display()
        );
    } else {
        let yaml = SearchConfig::default().to_yaml()?;
        fs::write(&paths.config, yaml)
            .with_context(|| format!("Failed to write {}", paths.config.display()))?;
        println!("{} Wrote default config to {}", "✓".green(), paths.config.display());
    }

    let existed = paths.db.exists();
    let store = ListingStore::create(paths)?;
    if existed {
        println!("{} Database {} exists", "→".dimmed(), store.paths.db.display());
    } else {
        println!("{} Created {}", "✓".green(), store.paths.db.display());
    }

    println!();
    println!(
        "Embedding model: {} ({} dims), index mode: {:?}",
        store.provider().model_version().to_string().cyan(),
        store.provider().dimension(),
        store.config.index_mode
    );

    Ok(())
}
