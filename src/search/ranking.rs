//! Scoring, ordering and pagination for search results.
//!
//! `final = semantic_weight * similarity + keyword_weight * keyword_overlap`.
//! Listings without a usable vector contribute only the keyword term.
//! Ordering is total: score desc, `updated_at` desc, `id` asc.

use std::cmp::Ordering;

use super::embedding::tokenize;
use crate::core::error::{Result, SearchError};
use crate::core::filters::BrowseSort;
use crate::core::listing::Listing;

/// Keyword credit for a term found only in the description
const DESCRIPTION_MATCH_CREDIT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl FusionWeights {
    pub fn fuse(&self, similarity: Option<f32>, keyword: f32) -> f32 {
        self.semantic * similarity.unwrap_or(0.0) + self.keyword * keyword
    }
}

#[derive(Debug, Clone)]
pub struct ScoredListing {
    pub listing: Listing,
    pub score: f32,
    pub similarity: Option<f32>,
    pub keyword: f32,
}

/// Unique lower-case query tokens in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(query) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Mean per-term credit: 1.0 for a title hit, 0.5 for a description-only
/// hit. Result is in [0, 1].
pub fn keyword_overlap(terms: &[String], title: &str, description: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }

    let title = title.to_lowercase();
    let description = description.to_lowercase();

    let credit: f32 = terms
        .iter()
        .map(|term| {
            if title.contains(term.as_str()) {
                1.0
            } else if description.contains(term.as_str()) {
                DESCRIPTION_MATCH_CREDIT
            } else {
                0.0
            }
        })
        .sum();

    credit / terms.len() as f32
}

fn by_rank(a: &ScoredListing, b: &ScoredListing) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.listing.updated_at.cmp(&a.listing.updated_at))
        .then_with(|| a.listing.id.cmp(&b.listing.id))
}

pub fn rank(hits: &mut [ScoredListing]) {
    hits.sort_by(by_rank);
}

/// Order for filter-only browsing; ties by `id` ascending.
pub fn sort_browse(listings: &mut [Listing], sort: BrowseSort) {
    listings.sort_by(|a, b| {
        let primary = match sort {
            BrowseSort::Newest => b.updated_at.cmp(&a.updated_at),
            BrowseSort::Oldest => a.created_at.cmp(&b.created_at),
            BrowseSort::PriceLow => a.price.total_cmp(&b.price),
            BrowseSort::PriceHigh => b.price.total_cmp(&a.price),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}

/// Validate `page`/`page_size`, clamp the size to `max_page_size`.
pub fn page_window(page: i64, page_size: i64, max_page_size: i64) -> Result<(usize, usize)> {
    if page < 0 || page_size <= 0 {
        return Err(SearchError::InvalidPage { page, page_size });
    }
    Ok((page as usize, page_size.min(max_page_size) as usize))
}

/// Slice `[page * size, (page + 1) * size)`; past-the-end pages are empty.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Vec<T> {
    let start = page.saturating_mul(page_size);
    items.into_iter().skip(start).take(page_size).collect()
}
