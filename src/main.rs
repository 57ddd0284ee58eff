mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use listing_search::core::filters::{BrowseSort, SearchFilters};
use listing_search::core::listing::{ListingDraft, ListingUpdate};
use listing_search::search::engine::SearchRequest;

#[derive(Parser)]
#[command(name = "listings")]
#[command(about = "Marketplace listing store with hybrid semantic search", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Store =====
    /// Create .listings/ with a default config and empty database
    Init {
        #[arg(long, help = "Overwrite an existing config.yaml with defaults")]
        force: bool,
    },
    /// Create listings from a JSON array of drafts
    Import {
        file: PathBuf,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Create a listing
    Add {
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        seller_type: Option<String>,
        #[arg(long)]
        condition: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long)]
        thumbnail: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Edit fields of a listing
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        seller_type: Option<String>,
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        thumbnail: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Change status (active, sold, removed)
    SetStatus {
        id: i64,
        status: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Search =====
    /// Hybrid search; an empty query with filters browses
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        seller_type: Option<String>,
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true, help = "Zero-based page")]
        page: i64,
        #[arg(long, allow_negative_numbers = true)]
        page_size: Option<i64>,
        #[arg(long, default_value = "newest", help = "Browse order: newest, oldest, price_low, price_high")]
        sort: String,
        #[arg(long, help = "Keyword scoring only (no embeddings)")]
        fallback: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Title autocomplete
    Suggest {
        query: String,
        #[arg(long, short)]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Index maintenance =====
    /// Embed listings that are missing or stale
    Backfill {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Check stored embeddings without modifying them
    Verify {
        #[arg(long, help = "Exit 1 if anything is stale, missing or invalid")]
        strict: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show index statistics
    Stats {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server over stdio
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn init_logging() {
    // stdout carries --json output and the MCP transport.
    let filter = EnvFilter::try_from_env("LISTINGS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => commands::init::run(force),
        Commands::Import { file, json } => commands::import::run(&file, json),
        Commands::Add {
            title,
            description,
            category,
            seller_type,
            condition,
            price,
            thumbnail,
            json,
        } => commands::add::run(
            ListingDraft {
                title,
                description,
                category,
                seller_type,
                condition,
                price,
                thumbnail,
            },
            json,
        ),
        Commands::Update {
            id,
            title,
            description,
            category,
            seller_type,
            condition,
            price,
            thumbnail,
            json,
        } => commands::update::run(
            id,
            ListingUpdate {
                title,
                description,
                category,
                seller_type,
                condition,
                price,
                thumbnail,
                status: None,
            },
            json,
        ),
        Commands::SetStatus { id, status, json } => {
            commands::update::run_set_status(id, &status, json)
        }

        Commands::Search {
            query,
            category,
            seller_type,
            condition,
            min_price,
            max_price,
            page,
            page_size,
            sort,
            fallback,
            json,
        } => {
            let request = SearchRequest {
                query,
                filters: SearchFilters {
                    category,
                    seller_type,
                    condition,
                    min_price,
                    max_price,
                },
                page,
                page_size,
                sort: sort.parse::<BrowseSort>()?,
            };
            commands::search::run(request, fallback, json)
        }
        Commands::Suggest { query, limit, json } => commands::suggest::run(&query, limit, json),

        Commands::Backfill { json } => commands::backfill::run(json),
        Commands::Verify { strict, json } => commands::verify::run(strict, json),
        Commands::Stats { json } => commands::stats::run(json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions();
                Ok(())
            } else {
                run_mcp_server()
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server() -> anyhow::Result<()> {
    let root = std::env::current_dir()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(root))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions() {
    use colored::Colorize;

    let root = std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "/path/to/your/store".to_string());

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "listings".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "listing-search": {{
      "command": "{}",
      "args": ["mcp"],
      "cwd": "{}"
    }}
  }}
}}"#, binary_path, root);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Hybrid search with filters and paging", "listing_search".green());
    println!("  • {} - Title autocomplete", "listing_suggest".green());
    println!("  • {} - Get one listing by id", "listing_get".green());
    println!("  • {} - Embedding health report", "listing_verify".green());
}
