//! Search Engine - query orchestration
//!
//! Candidate fetch (structural filters) → query embedding → hybrid scoring
//! → deterministic ranking → pagination. When the embedding provider is
//! down the same candidates are scored by keyword overlap alone and the
//! page is flagged as degraded.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::embedding::{cosine_similarity, normalize_text, EmbeddingProvider};
use super::ranking::{
    keyword_overlap, page_window, paginate, query_terms, rank, sort_browse, FusionWeights,
    ScoredListing,
};
use super::vectordb::ItemRepository;
use crate::core::config::SearchConfig;
use crate::core::error::{Result, SearchError};
use crate::core::filters::{BrowseSort, SearchFilters};
use crate::core::listing::Listing;

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub filters: SearchFilters,
    /// Zero-based page index
    pub page: i64,
    /// `None` uses the configured default
    pub page_size: Option<i64>,
    /// Only applies to filter-only browsing
    pub sort: BrowseSort,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Similarity and keyword overlap fused
    Hybrid,
    /// Provider unavailable; keyword overlap only
    KeywordFallback,
    /// Blank query with filters; recency (or requested) order
    Browse,
}

/// Search result with listing metadata and score components
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub category: Option<String>,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub score: f32,
    pub similarity: Option<f32>,
    pub keyword: f32,
}

impl From<ScoredListing> for SearchResult {
    fn from(scored: ScoredListing) -> Self {
        let listing = scored.listing;
        Self {
            id: listing.id,
            title: listing.title,
            category: listing.category,
            price: listing.price,
            thumbnail: listing.thumbnail,
            updated_at: listing.updated_at,
            score: scored.score,
            similarity: scored.similarity,
            keyword: scored.keyword,
        }
    }
}

impl From<Listing> for SearchResult {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            category: listing.category,
            price: listing.price,
            thumbnail: listing.thumbnail,
            updated_at: listing.updated_at,
            score: 0.0,
            similarity: None,
            keyword: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub hits: Vec<SearchResult>,
    /// Matches across all pages
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub pages: usize,
    pub mode: SearchMode,
}

impl SearchPage {
    pub fn degraded(&self) -> bool {
        self.mode == SearchMode::KeywordFallback
    }
}

/// Search engine combining the embedding provider and listing repository
pub struct SearchEngine {
    repo: Arc<dyn ItemRepository>,
    provider: Arc<dyn EmbeddingProvider>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        repo: Arc<dyn ItemRepository>,
        provider: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            repo,
            provider,
            config,
        }
    }

    fn weights(&self) -> FusionWeights {
        FusionWeights {
            semantic: self.config.semantic_weight,
            keyword: self.config.keyword_weight,
        }
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let start = Instant::now();
        let query = request.query.trim();
        let filters = request.filters.normalized();
        filters.validate()?;

        if query.is_empty() && filters.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query is empty and no filters were given".to_string(),
            ));
        }

        let (page, page_size) = page_window(
            request.page,
            request.page_size.unwrap_or(self.config.default_page_size),
            self.config.max_page_size,
        )?;

        // Punctuation-only text carries no terms; with filters it browses.
        let terms = query_terms(query);
        if terms.is_empty() && !filters.is_empty() {
            return self.browse(&filters, request.sort, page, page_size);
        }
        if terms.is_empty() {
            return Err(SearchError::InvalidQuery(format!(
                "query '{}' has no searchable terms",
                query
            )));
        }

        let candidates = self.repo.find_active(&filters)?;
        let query_vector = self.embed_query(query)?;
        let mode = if query_vector.is_some() {
            SearchMode::Hybrid
        } else {
            SearchMode::KeywordFallback
        };

        let weights = self.weights();
        let version = self.provider.model_version().as_str();
        let candidate_count = candidates.len();

        let mut hits: Vec<ScoredListing> = candidates
            .into_iter()
            .filter_map(|listing| {
                let keyword = keyword_overlap(&terms, &listing.title, &listing.description);
                let similarity = match (&query_vector, &listing.embedding) {
                    (Some(q), Some(v)) if listing.has_current_embedding(version) => {
                        Some(cosine_similarity(q, v))
                    }
                    _ => None,
                };

                let semantic_match = similarity
                    .map(|s| s >= self.config.similarity_threshold)
                    .unwrap_or(false);
                if keyword <= 0.0 && !semantic_match {
                    return None;
                }

                Some(ScoredListing {
                    score: weights.fuse(similarity, keyword),
                    listing,
                    similarity,
                    keyword,
                })
            })
            .collect();

        rank(&mut hits);
        let total = hits.len();

        tracing::debug!(
            query,
            candidates = candidate_count,
            matches = total,
            mode = ?mode,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );

        Ok(SearchPage {
            hits: paginate(hits, page, page_size)
                .into_iter()
                .map(SearchResult::from)
                .collect(),
            total,
            page,
            page_size,
            pages: total.div_ceil(page_size),
            mode,
        })
    }

    /// `Ok(None)` means degrade to keyword scoring.
    fn embed_query(&self, query: &str) -> Result<Option<Vec<f32>>> {
        let text = normalize_text(query)?;
        match self.provider.embed(&text) {
            Ok(vector) if vector.len() == self.provider.dimension() => Ok(Some(vector)),
            Ok(vector) => {
                tracing::warn!(
                    got = vector.len(),
                    expected = self.provider.dimension(),
                    "query vector has wrong dimension, using keyword fallback"
                );
                Ok(None)
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "embedding provider unavailable, using keyword fallback");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn browse(
        &self,
        filters: &SearchFilters,
        sort: BrowseSort,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        let mut listings = self.repo.find_active(filters)?;
        sort_browse(&mut listings, sort);
        let total = listings.len();

        Ok(SearchPage {
            hits: paginate(listings, page, page_size)
                .into_iter()
                .map(SearchResult::from)
                .collect(),
            total,
            page,
            page_size,
            pages: total.div_ceil(page_size),
            mode: SearchMode::Browse,
        })
    }
}
