//! Indexing service - the only writer of listing embeddings.
//!
//! Every write path (create, edit, status change, backfill) goes through
//! here. Writes to one listing are serialized by a per-id lock and re-read
//! the row inside it, so the stored vector always belongs to the stored text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;

use super::embedding::{listing_text, EmbeddingProvider};
use super::vectordb::ItemRepository;
use crate::core::config::IndexMode;
use crate::core::error::{Result, SearchError};
use crate::core::listing::{IndexState, Listing, ListingDraft, ListingStatus, ListingUpdate};
use crate::core::schema::{validate_draft, validate_update};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    /// A new vector was stored
    Indexed,
    /// Recomputed vector identical to the stored one
    Unchanged,
    /// Listing is not active; vector removed
    Cleared,
    /// Left `pending` for backfill (deferred mode)
    Deferred,
    /// Provider failed; existing vector kept and flagged stale
    MarkedStale,
    /// Text has no embeddable tokens; vector dropped, left `pending`
    Skipped,
}

/// Result of a write. The listing row is durable whenever this is returned;
/// `index_error` carries a recoverable embedding failure.
#[derive(Debug)]
pub struct WriteReport {
    pub listing: Listing,
    pub outcome: IndexOutcome,
    pub index_error: Option<SearchError>,
}

pub struct IndexingService {
    repo: Arc<dyn ItemRepository>,
    provider: Arc<dyn EmbeddingProvider>,
    mode: IndexMode,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl IndexingService {
    pub fn new(
        repo: Arc<dyn ItemRepository>,
        provider: Arc<dyn EmbeddingProvider>,
        mode: IndexMode,
    ) -> Self {
        Self {
            repo,
            provider,
            mode,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Compute and attach the embedding for `listing` in memory.
    ///
    /// On `ProviderUnavailable` the existing vector is kept, the listing is
    /// marked stale and the error is returned for the caller to persist.
    pub fn index(&self, listing: &mut Listing) -> Result<IndexOutcome> {
        let now = Utc::now();

        if !listing.is_active() {
            if listing.embedding.is_none()
                && listing.embedding_model_version.is_none()
                && listing.index_state == IndexState::Pending
            {
                return Ok(IndexOutcome::Unchanged);
            }
            listing.embedding = None;
            listing.embedding_model_version = None;
            listing.index_state = IndexState::Pending;
            listing.updated_at = now;
            return Ok(IndexOutcome::Cleared);
        }

        let text = listing_text(&listing.title, &listing.description)?;
        let vector = match self.embed_checked(&text) {
            Ok(vector) => vector,
            Err(e) if e.is_recoverable() => {
                listing.index_state = IndexState::Stale;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let version = self.provider.model_version().as_str();
        if listing.index_state == IndexState::Current
            && listing.embedding_model_version.as_deref() == Some(version)
            && listing.embedding.as_deref() == Some(vector.as_slice())
        {
            return Ok(IndexOutcome::Unchanged);
        }

        listing.embedding = Some(vector);
        listing.embedding_model_version = Some(version.to_string());
        listing.index_state = IndexState::Current;
        listing.updated_at = now;
        Ok(IndexOutcome::Indexed)
    }

    fn embed_checked(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.provider.embed(text)?;
        if vector.len() != self.provider.dimension() {
            return Err(SearchError::ProviderUnavailable(format!(
                "provider returned {} components, expected {}",
                vector.len(),
                self.provider.dimension()
            )));
        }
        Ok(vector)
    }

    /// Persist a new listing and index it.
    pub fn create(&self, draft: &ListingDraft) -> Result<WriteReport> {
        validate_draft(draft)?;
        let listing = self.repo.insert(draft, Utc::now())?;
        tracing::debug!(listing_id = listing.id, "listing created");

        let id = listing.id;
        self.with_listing_lock(id, || {
            let mut listing = self.repo.get(id)?.ok_or(SearchError::NotFound(id))?;
            self.index_and_save(&mut listing, true)
        })
    }

    /// Apply an edit. Re-embeds when the text or status changed, or when
    /// the listing was not current to begin with.
    pub fn update(&self, id: i64, changes: &ListingUpdate) -> Result<WriteReport> {
        validate_update(changes)?;

        self.with_listing_lock(id, || {
            let mut listing = self.repo.get(id)?.ok_or(SearchError::NotFound(id))?;
            let (dirty, reindex) = apply_changes(&mut listing, changes);
            if dirty {
                listing.updated_at = Utc::now();
            }

            let version = self.provider.model_version().as_str();
            if reindex || listing.needs_indexing(version) {
                return self.index_and_save(&mut listing, dirty);
            }

            if dirty {
                self.persist(&mut listing)?;
            }
            Ok(WriteReport {
                listing,
                outcome: IndexOutcome::Unchanged,
                index_error: None,
            })
        })
    }

    pub fn set_status(&self, id: i64, status: ListingStatus) -> Result<WriteReport> {
        self.update(
            id,
            &ListingUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Recompute one listing from its stored content. Used by backfill;
    /// a provider failure is persisted as `stale` and returned.
    pub fn reindex(&self, id: i64) -> Result<IndexOutcome> {
        self.with_listing_lock(id, || {
            let mut listing = self.repo.get(id)?.ok_or(SearchError::NotFound(id))?;
            match self.index(&mut listing) {
                Ok(IndexOutcome::Unchanged) => Ok(IndexOutcome::Unchanged),
                Ok(outcome) => {
                    self.persist(&mut listing)?;
                    Ok(outcome)
                }
                Err(e) if e.is_recoverable() => {
                    self.persist(&mut listing)?;
                    Err(e)
                }
                Err(e) => Err(e),
            }
        })
    }

    fn index_and_save(&self, listing: &mut Listing, dirty: bool) -> Result<WriteReport> {
        let (outcome, index_error) = if self.mode == IndexMode::Deferred && listing.is_active() {
            listing.index_state = IndexState::Pending;
            (IndexOutcome::Deferred, None)
        } else {
            match self.index(listing) {
                Ok(outcome) => (outcome, None),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(
                        listing_id = listing.id,
                        error = %e,
                        "embedding failed, listing saved as stale"
                    );
                    (IndexOutcome::MarkedStale, Some(e))
                }
                Err(e @ SearchError::InvalidInput(_)) => {
                    listing.embedding = None;
                    listing.embedding_model_version = None;
                    listing.index_state = IndexState::Pending;
                    (IndexOutcome::Skipped, Some(e))
                }
                Err(e) => return Err(e),
            }
        };

        if dirty || outcome != IndexOutcome::Unchanged {
            self.persist(listing)?;
        }

        Ok(WriteReport {
            listing: listing.clone(),
            outcome,
            index_error,
        })
    }

    /// Every indexer write goes through here. A vector that could not be
    /// read back is gone, so its model version goes with it.
    fn persist(&self, listing: &mut Listing) -> Result<()> {
        if listing.embedding.is_none() && listing.embedding_model_version.take().is_some() {
            tracing::debug!(listing_id = listing.id, "dropping model version of unreadable vector");
        }
        self.repo.save(listing)
    }

    fn with_listing_lock<T>(&self, id: i64, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut table = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            table.entry(id).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            f()
        };

        // Clones are only handed out under the table lock, so two owners
        // (table + us) means nobody else is waiting on this id.
        let mut table = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if Arc::strong_count(&lock) == 2 {
            table.remove(&id);
        }
        result
    }
}

/// Returns `(dirty, reindex)`: whether any field changed, and whether the
/// change touches what the embedding depends on.
fn apply_changes(listing: &mut Listing, changes: &ListingUpdate) -> (bool, bool) {
    let mut dirty = false;
    let mut reindex = false;

    if let Some(title) = &changes.title {
        let title = title.trim();
        if listing.title != title {
            listing.title = title.to_string();
            dirty = true;
            reindex = true;
        }
    }
    if let Some(description) = &changes.description {
        let description = description.trim();
        if listing.description != description {
            listing.description = description.to_string();
            dirty = true;
            reindex = true;
        }
    }
    if let Some(status) = changes.status {
        if listing.status != status {
            listing.status = status;
            dirty = true;
            reindex = true;
        }
    }

    let mut set = |field: &mut Option<String>, value: &Option<String>| {
        if value.is_some() && *field != *value {
            *field = value.clone();
            dirty = true;
        }
    };
    set(&mut listing.category, &changes.category);
    set(&mut listing.seller_type, &changes.seller_type);
    set(&mut listing.condition, &changes.condition);
    set(&mut listing.thumbnail, &changes.thumbnail);

    if let Some(price) = changes.price {
        if listing.price != price {
            listing.price = price;
            dirty = true;
        }
    }

    (dirty, reindex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::{HtpEmbedder, EMBEDDING_DIM};
    use crate::search::auditor::ConsistencyAuditor;
    use crate::search::testkit::{draft, ToggleProvider};
    use crate::search::vectordb::VectorDB;

    fn service(mode: IndexMode) -> (IndexingService, Arc<VectorDB>, Arc<ToggleProvider>) {
        let db = Arc::new(VectorDB::open_in_memory(EMBEDDING_DIM).unwrap());
        let provider = Arc::new(ToggleProvider::new());
        let service = IndexingService::new(db.clone(), provider.clone(), mode);
        (service, db, provider)
    }

    fn expected_vector(title: &str, description: &str) -> Vec<f32> {
        HtpEmbedder::new()
            .embed(&listing_text(title, description).unwrap())
            .unwrap()
    }

    #[test]
    fn test_create_indexes_synchronously() {
        let (service, db, provider) = service(IndexMode::Sync);
        let report = service.create(&draft("Blue mountain bike", "21 gears")).unwrap();

        assert_eq!(report.outcome, IndexOutcome::Indexed);
        assert!(report.index_error.is_none());

        let stored = db.get(report.listing.id).unwrap().unwrap();
        assert_eq!(stored.index_state, IndexState::Current);
        assert_eq!(
            stored.embedding_model_version.as_deref(),
            Some(provider.model_version().as_str())
        );
        assert_eq!(stored.embedding, Some(expected_vector("Blue mountain bike", "21 gears")));
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let (service, db, _) = service(IndexMode::Sync);
        assert!(matches!(service.create(&draft("  ", "")), Err(SearchError::InvalidInput(_))));
        assert_eq!(db.stats("any").unwrap().listing_count, 0);
    }

    #[test]
    fn test_provider_outage_still_saves_listing() {
        let (service, db, provider) = service(IndexMode::Sync);
        provider.set_available(false);

        let report = service.create(&draft("Desk lamp", "")).unwrap();
        assert_eq!(report.outcome, IndexOutcome::MarkedStale);
        assert!(matches!(report.index_error, Some(SearchError::ProviderUnavailable(_))));

        let stored = db.get(report.listing.id).unwrap().unwrap();
        assert_eq!(stored.title, "Desk lamp");
        assert_eq!(stored.index_state, IndexState::Stale);
        assert!(stored.embedding.is_none());
    }

    #[test]
    fn test_failed_update_keeps_old_vector_marked_stale() {
        let (service, db, provider) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;
        let before = db.get(id).unwrap().unwrap().embedding;

        provider.set_available(false);
        let changes = ListingUpdate {
            description: Some("with LED bulb".to_string()),
            ..Default::default()
        };
        let report = service.update(id, &changes).unwrap();
        assert!(report.index_error.is_some());

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.description, "with LED bulb");
        assert_eq!(stored.embedding, before);
        assert_eq!(stored.index_state, IndexState::Stale);
        assert!(!stored.has_current_embedding(provider.model_version().as_str()));
    }

    #[test]
    fn test_unreadable_vector_drops_version_during_outage() {
        let (service, db, provider) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;
        db.write_raw_embedding(id, Some(vec![1, 2, 3])).unwrap();

        provider.set_available(false);
        let changes = ListingUpdate {
            price: Some(3.0),
            ..Default::default()
        };
        let report = service.update(id, &changes).unwrap();
        assert_eq!(report.outcome, IndexOutcome::MarkedStale);

        let stored = db.get(id).unwrap().unwrap();
        assert!(stored.embedding.is_none());
        assert!(stored.embedding_model_version.is_none());
        assert_eq!(stored.index_state, IndexState::Stale);

        let service = Arc::new(service);
        let auditor = ConsistencyAuditor::new(db.clone(), service.clone(), 16);
        let report = auditor.verify().unwrap();
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        assert_eq!(report.missing_ids, vec![id]);

        assert!(service.reindex(id).is_err());
        assert!(db.get(id).unwrap().unwrap().embedding_model_version.is_none());

        provider.set_available(true);
        assert_eq!(service.reindex(id).unwrap(), IndexOutcome::Indexed);
        assert!(auditor.verify().unwrap().is_healthy());
    }

    #[test]
    fn test_deferred_mode_drops_version_of_unreadable_vector() {
        let db = Arc::new(VectorDB::open_in_memory(EMBEDDING_DIM).unwrap());
        let sync = IndexingService::new(db.clone(), Arc::new(HtpEmbedder::new()), IndexMode::Sync);
        let id = sync.create(&draft("Desk lamp", "")).unwrap().listing.id;
        db.write_raw_embedding(id, Some(vec![9, 9])).unwrap();

        let deferred =
            IndexingService::new(db.clone(), Arc::new(HtpEmbedder::new()), IndexMode::Deferred);
        let changes = ListingUpdate {
            price: Some(4.0),
            ..Default::default()
        };
        assert_eq!(deferred.update(id, &changes).unwrap().outcome, IndexOutcome::Deferred);

        let stored = db.get(id).unwrap().unwrap();
        assert!(stored.embedding.is_none());
        assert!(stored.embedding_model_version.is_none());
        assert_eq!(stored.index_state, IndexState::Pending);
    }

    #[test]
    fn test_update_recomputes_embedding() {
        let (service, db, _) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;

        let changes = ListingUpdate {
            description: Some("brass, adjustable arm".to_string()),
            ..Default::default()
        };
        let report = service.update(id, &changes).unwrap();
        assert_eq!(report.outcome, IndexOutcome::Indexed);

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(
            stored.embedding,
            Some(expected_vector("Desk lamp", "brass, adjustable arm"))
        );
    }

    #[test]
    fn test_price_only_update_skips_embedding() {
        let (service, db, provider) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;

        provider.set_available(false);
        let changes = ListingUpdate {
            price: Some(9.5),
            ..Default::default()
        };
        let report = service.update(id, &changes).unwrap();
        assert_eq!(report.outcome, IndexOutcome::Unchanged);
        assert!(report.index_error.is_none());

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.price, 9.5);
        assert_eq!(stored.index_state, IndexState::Current);
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let (service, db, _) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;
        let before = db.get(id).unwrap().unwrap();

        assert_eq!(service.reindex(id).unwrap(), IndexOutcome::Unchanged);
        let after = db.get(id).unwrap().unwrap();
        assert_eq!(before.embedding, after.embedding);
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[test]
    fn test_deactivation_clears_and_reactivation_restores() {
        let (service, db, provider) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;

        let report = service.set_status(id, ListingStatus::Sold).unwrap();
        assert_eq!(report.outcome, IndexOutcome::Cleared);
        let sold = db.get(id).unwrap().unwrap();
        assert!(sold.embedding.is_none());
        assert!(sold.embedding_model_version.is_none());

        let report = service.set_status(id, ListingStatus::Active).unwrap();
        assert_eq!(report.outcome, IndexOutcome::Indexed);
        let active = db.get(id).unwrap().unwrap();
        assert!(active.has_current_embedding(provider.model_version().as_str()));
    }

    #[test]
    fn test_deferred_mode_leaves_pending() {
        let (service, db, _) = service(IndexMode::Deferred);
        let report = service.create(&draft("Desk lamp", "")).unwrap();
        assert_eq!(report.outcome, IndexOutcome::Deferred);

        let stored = db.get(report.listing.id).unwrap().unwrap();
        assert_eq!(stored.index_state, IndexState::Pending);
        assert!(stored.embedding.is_none());

        assert_eq!(service.reindex(stored.id).unwrap(), IndexOutcome::Indexed);
        assert_eq!(db.get(stored.id).unwrap().unwrap().index_state, IndexState::Current);
    }

    #[test]
    fn test_unembeddable_title_is_saved_without_vector() {
        let (service, db, _) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;

        let changes = ListingUpdate {
            title: Some("!!!".to_string()),
            ..Default::default()
        };
        let report = service.update(id, &changes).unwrap();
        assert_eq!(report.outcome, IndexOutcome::Skipped);
        assert!(matches!(report.index_error, Some(SearchError::InvalidInput(_))));

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.title, "!!!");
        assert!(stored.embedding.is_none());
        assert_eq!(stored.index_state, IndexState::Pending);
    }

    #[test]
    fn test_update_unknown_listing() {
        let (service, _, _) = service(IndexMode::Sync);
        let changes = ListingUpdate {
            title: Some("Lamp".to_string()),
            ..Default::default()
        };
        assert!(matches!(service.update(42, &changes), Err(SearchError::NotFound(42))));
        assert!(matches!(service.reindex(42), Err(SearchError::NotFound(42))));
    }

    #[test]
    fn test_concurrent_edits_keep_text_and_vector_paired() {
        let (service, db, _) = service(IndexMode::Sync);
        let id = service.create(&draft("Desk lamp", "")).unwrap().listing.id;

        std::thread::scope(|scope| {
            for i in 0..8 {
                let service = &service;
                scope.spawn(move || {
                    let changes = ListingUpdate {
                        title: Some(format!("Desk lamp edition {}", i)),
                        description: Some(format!("revision {}", i)),
                        ..Default::default()
                    };
                    service.update(id, &changes).unwrap();
                });
            }
        });

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(
            stored.embedding,
            Some(expected_vector(&stored.title, &stored.description))
        );
        assert!(service.locks.lock().unwrap().is_empty());
    }
}
