//! Shared fixtures for the search tests.

use std::sync::atomic::{AtomicBool, Ordering};

use super::embedding::{EmbeddingProvider, HtpEmbedder, ModelVersion};
use crate::core::error::{Result, SearchError};
use crate::core::listing::ListingDraft;

/// HTP embedder that can be switched off mid-test.
pub struct ToggleProvider {
    inner: HtpEmbedder,
    available: AtomicBool,
}

impl ToggleProvider {
    pub fn new() -> Self {
        Self {
            inner: HtpEmbedder::new(),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl EmbeddingProvider for ToggleProvider {
    fn model_version(&self) -> &ModelVersion {
        self.inner.model_version()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SearchError::ProviderUnavailable("switched off".to_string()));
        }
        self.inner.embed(text)
    }
}

pub fn draft(title: &str, description: &str) -> ListingDraft {
    ListingDraft {
        title: title.to_string(),
        description: description.to_string(),
        ..Default::default()
    }
}

pub fn draft_in(title: &str, category: &str) -> ListingDraft {
    ListingDraft {
        title: title.to_string(),
        category: Some(category.to_string()),
        ..Default::default()
    }
}
