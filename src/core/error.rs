use thiserror::Error;

/// Errors produced by the search subsystem.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid page: page={page}, page_size={page_size}")]
    InvalidPage { page: i64, page_size: i64 },

    #[error("Malformed vector: {0}")]
    MalformedVector(String),

    #[error("Listing not found: {0}")]
    NotFound(i64),

    #[error("Repository error: {0}")]
    Repository(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SearchError {
    /// Provider outages are repaired locally (fallback scoring, stale marking).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }

    /// Short machine-readable kind, used in reports and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidQuery(_) => "invalid_query",
            Self::InvalidPage { .. } => "invalid_page",
            Self::MalformedVector(_) => "malformed_vector",
            Self::NotFound(_) => "not_found",
            Self::Repository(_) => "repository",
            Self::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
