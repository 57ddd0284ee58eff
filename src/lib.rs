//! listing-search library
//!
//! Hybrid semantic/keyword search over marketplace listings.
//!
//! # Modules
//!
//! - `core`: Listing model, filters, validation, configuration, errors
//! - `search`: Embeddings, repository, indexing, ranking, autocomplete, audit
//! - `store`: On-disk store wiring shared by the CLI and MCP server

pub mod core;
pub mod search;
pub mod store;

// Re-exports for convenience
pub use self::core::config::{IndexMode, SearchConfig};
pub use self::core::error::{Result, SearchError};
pub use self::core::filters::{BrowseSort, SearchFilters};
pub use self::core::listing::{IndexState, Listing, ListingDraft, ListingStatus, ListingUpdate, Suggestion};
pub use self::core::paths::StorePaths;
pub use store::ListingStore;
