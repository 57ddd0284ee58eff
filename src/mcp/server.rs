//! Listing MCP Server implementation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use listing_search::core::filters::{BrowseSort, SearchFilters};
use listing_search::core::listing::Listing;
use listing_search::core::paths::StorePaths;
use listing_search::search::engine::SearchRequest;
use listing_search::search::vectordb::ItemRepository;
use listing_search::store::ListingStore;
use listing_search::SearchError;

/// Parameters for listing_search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Free-text query; may be empty when a filter is given")]
    #[serde(default)]
    pub query: String,
    #[schemars(description = "Exact category (case-insensitive)")]
    #[serde(default)]
    pub category: Option<String>,
    #[schemars(description = "Seller type filter")]
    #[serde(default)]
    pub seller_type: Option<String>,
    #[schemars(description = "Item condition filter")]
    #[serde(default)]
    pub condition: Option<String>,
    #[schemars(description = "Minimum price (inclusive)")]
    #[serde(default)]
    pub min_price: Option<f64>,
    #[schemars(description = "Maximum price (inclusive)")]
    #[serde(default)]
    pub max_price: Option<f64>,
    #[schemars(description = "Zero-based page index (default: 0)")]
    #[serde(default)]
    pub page: i64,
    #[schemars(description = "Results per page (default from config, max 100)")]
    #[serde(default)]
    pub page_size: Option<i64>,
    #[schemars(description = "Browse order for empty queries: newest, oldest, price_low, price_high")]
    #[serde(default)]
    pub sort: Option<String>,
}

/// Parameters for listing_suggest tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestParams {
    #[schemars(description = "Partial title typed so far")]
    pub query: String,
    #[schemars(description = "Maximum suggestions (default: 8, max 50)")]
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parameters for listing_get tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetListingParams {
    #[schemars(description = "Listing id")]
    pub id: i64,
}

/// Listing detail for JSON output (no raw vector)
#[derive(Debug, Serialize)]
struct ListingJson {
    id: i64,
    title: String,
    description: String,
    category: Option<String>,
    seller_type: Option<String>,
    condition: Option<String>,
    price: f64,
    thumbnail: Option<String>,
    status: String,
    index_state: String,
    embedding_model_version: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Listing> for ListingJson {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            description: listing.description,
            category: listing.category,
            seller_type: listing.seller_type,
            condition: listing.condition,
            price: listing.price,
            thumbnail: listing.thumbnail,
            status: listing.status.to_string(),
            index_state: listing.index_state.to_string(),
            embedding_model_version: listing.embedding_model_version,
            created_at: listing.created_at.to_rfc3339(),
            updated_at: listing.updated_at.to_rfc3339(),
        }
    }
}

/// Listing MCP Service
#[derive(Clone)]
pub struct ListingService {
    store: Arc<ListingStore>,
    tool_router: ToolRouter<Self>,
}

impl ListingService {
    pub fn new(store: ListingStore) -> Self {
        Self {
            store: Arc::new(store),
            tool_router: Self::tool_router(),
        }
    }
}

fn to_mcp_error(e: SearchError) -> McpError {
    match e {
        SearchError::InvalidInput(_)
        | SearchError::InvalidQuery(_)
        | SearchError::InvalidPage { .. }
        | SearchError::NotFound(_) => McpError::invalid_params(e.to_string(), None),
        other => McpError::internal_error(format!("{} failed: {}", other.kind(), other), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl ListingService {
    #[tool(description = "Search active marketplace listings. Fuses semantic similarity with keyword overlap; falls back to keyword scoring (mode=keyword_fallback) when the embedding model is unavailable. An empty query with filters browses by recency.")]
    async fn listing_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let sort = match params.sort.as_deref() {
            Some(raw) => raw.parse::<BrowseSort>().map_err(to_mcp_error)?,
            None => BrowseSort::default(),
        };

        let request = SearchRequest {
            query: params.query,
            filters: SearchFilters {
                category: params.category,
                seller_type: params.seller_type,
                condition: params.condition,
                min_price: params.min_price,
                max_price: params.max_price,
            },
            page: params.page,
            page_size: params.page_size,
            sort,
        };

        let page = self.store.engine().search(&request).map_err(to_mcp_error)?;
        json_result(&page)
    }

    #[tool(description = "Autocomplete listing titles by case-insensitive substring. Returns {id, title, thumbnail} records, earliest match first.")]
    async fn listing_suggest(
        &self,
        params: Parameters<SuggestParams>,
    ) -> Result<CallToolResult, McpError> {
        let suggestions = self
            .store
            .autocomplete()
            .suggest(&params.0.query, params.0.limit)
            .map_err(to_mcp_error)?;
        json_result(&suggestions)
    }

    #[tool(description = "Get one listing by id, including status and index state.")]
    async fn listing_get(
        &self,
        params: Parameters<GetListingParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = params.0.id;
        match self.store.db.get(id).map_err(to_mcp_error)? {
            Some(listing) => json_result(&ListingJson::from(listing)),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "Listing not found: {}",
                id
            ))])),
        }
    }

    #[tool(description = "Read-only embedding health check: invariant violations plus stale and missing listing ids.")]
    async fn listing_verify(&self) -> Result<CallToolResult, McpError> {
        let report = self.store.auditor().verify().map_err(to_mcp_error)?;
        json_result(&serde_json::json!({
            "healthy": report.is_healthy(),
            "report": report,
        }))
    }
}

#[tool_handler]
impl ServerHandler for ListingService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Marketplace listing search. Hybrid semantic/keyword search, title autocomplete, listing lookup and index health.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(root: PathBuf) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let store = ListingStore::open(StorePaths::from_root(root))?;
    tracing::info!(db = %store.paths.db.display(), "starting MCP server");

    let service = ListingService::new(store);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
