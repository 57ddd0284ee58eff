//! Wiring for an on-disk listing store: paths, config, database and the
//! embedding provider, shared by the CLI and the MCP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::core::config::SearchConfig;
use crate::core::paths::StorePaths;
use crate::search::auditor::ConsistencyAuditor;
use crate::search::autocomplete::AutocompleteService;
use crate::search::embedding::{
    DeadlineProvider, EmbeddingProvider, HtpEmbedder, OfflineProvider, EMBEDDING_DIM,
};
use crate::search::engine::SearchEngine;
use crate::search::indexer::IndexingService;
use crate::search::vectordb::VectorDB;

/// Metadata key for the completion time of the last backfill.
pub const LAST_BACKFILL_KEY: &str = "last_backfill";

pub struct ListingStore {
    pub paths: StorePaths,
    pub config: SearchConfig,
    pub db: Arc<VectorDB>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl ListingStore {
    /// Open the store under the current directory.
    pub fn open_cwd() -> Result<Self> {
        Self::open(StorePaths::new()?)
    }

    /// Open an initialized store. Fails if `listings init` has not run.
    pub fn open(paths: StorePaths) -> Result<Self> {
        if !paths.db.exists() {
            bail!(
                "No listing store at {}. Run `listings init` first.",
                paths.data.display()
            );
        }
        Self::create(paths)
    }

    /// Open, creating the data directory and database if needed.
    pub fn create(paths: StorePaths) -> Result<Self> {
        paths.ensure_data_dir()?;
        let config = SearchConfig::load(&paths.config)
            .with_context(|| format!("Failed to load {}", paths.config.display()))?;
        let db = VectorDB::open(&paths.db, EMBEDDING_DIM)
            .with_context(|| format!("Failed to open {}", paths.db.display()))?;

        let provider = DeadlineProvider::new(
            HtpEmbedder::new(),
            Duration::from_millis(config.embed_timeout_ms),
        );

        Ok(Self {
            paths,
            config,
            db: Arc::new(db),
            provider: Arc::new(provider),
        })
    }

    /// Swap in a provider that is always unavailable (keyword-only search).
    pub fn offline(mut self) -> Self {
        let version = self.provider.model_version().clone();
        self.provider = Arc::new(OfflineProvider::new(version, EMBEDDING_DIM));
        self
    }

    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        self.provider.clone()
    }

    pub fn indexer(&self) -> IndexingService {
        IndexingService::new(self.db.clone(), self.provider.clone(), self.config.index_mode)
    }

    pub fn engine(&self) -> SearchEngine {
        SearchEngine::new(self.db.clone(), self.provider.clone(), self.config.clone())
    }

    pub fn autocomplete(&self) -> AutocompleteService {
        AutocompleteService::new(self.db.clone(), &self.config)
    }

    pub fn auditor(&self) -> ConsistencyAuditor {
        ConsistencyAuditor::new(
            self.db.clone(),
            Arc::new(self.indexer()),
            self.config.backfill_batch_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::listing::ListingDraft;
    use crate::search::engine::{SearchMode, SearchRequest};

    #[test]
    fn test_open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::from_root(dir.path().to_path_buf());
        assert!(ListingStore::open(paths).is_err());
    }

    #[test]
    fn test_create_then_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ListingStore::create(StorePaths::from_root(dir.path().to_path_buf())).unwrap();
        let draft = ListingDraft {
            title: "Desk lamp".to_string(),
            ..Default::default()
        };
        store.indexer().create(&draft).unwrap();
        drop(store);

        let store = ListingStore::open(StorePaths::from_root(dir.path().to_path_buf())).unwrap();
        let page = store.engine().search(&SearchRequest::new("lamp")).unwrap();
        assert_eq!(page.total, 1);
        assert!(store.auditor().verify().unwrap().is_healthy());

        let page = store.offline().engine().search(&SearchRequest::new("lamp")).unwrap();
        assert_eq!(page.mode, SearchMode::KeywordFallback);
    }
}
