//! Backfill and verify over the whole corpus.
//!
//! Both walk active listings in id order, one bounded batch at a time, so
//! neither holds the repository for long nor loads the corpus at once.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::indexer::{IndexOutcome, IndexingService};
use super::vectordb::ItemRepository;
use crate::core::error::{Result, SearchError};
use crate::core::listing::IndexState;
use crate::core::schema::Violation;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failed_ids: Vec<i64>,
    pub skipped_ids: Vec<i64>,
    pub duration_ms: u64,
}

impl BackfillReport {
    /// Listings whose stored state was changed by this run.
    pub fn changed(&self) -> usize {
        self.succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationEntry {
    pub id: i64,
    #[serde(flatten)]
    pub violation: Violation,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub violations: Vec<ViolationEntry>,
    /// Vector present but from another model version, or flagged stale
    pub stale_ids: Vec<i64>,
    /// No vector yet
    pub missing_ids: Vec<i64>,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.violations.is_empty() && self.stale_ids.is_empty() && self.missing_ids.is_empty()
    }
}

pub struct ConsistencyAuditor {
    repo: Arc<dyn ItemRepository>,
    indexer: Arc<IndexingService>,
    batch_size: usize,
}

impl ConsistencyAuditor {
    pub fn new(
        repo: Arc<dyn ItemRepository>,
        indexer: Arc<IndexingService>,
        batch_size: usize,
    ) -> Self {
        Self {
            repo,
            indexer,
            batch_size: batch_size.max(1),
        }
    }

    /// Re-embed every active listing without a current vector.
    pub fn backfill(&self) -> Result<BackfillReport> {
        let start = Instant::now();
        let version = self.indexer.provider().model_version().as_str().to_string();
        let mut report = BackfillReport::default();
        let mut cursor = 0;

        loop {
            let batch = self.repo.scan_active(cursor, self.batch_size)?;
            let Some(last) = batch.last() else { break };
            cursor = last.id;

            for listing in batch {
                report.scanned += 1;
                if !listing.needs_indexing(&version) {
                    continue;
                }

                match self.indexer.reindex(listing.id) {
                    Ok(IndexOutcome::Unchanged) => {}
                    Ok(_) => report.succeeded += 1,
                    Err(SearchError::InvalidInput(reason)) => {
                        tracing::warn!(listing_id = listing.id, %reason, "skipping listing");
                        report.skipped += 1;
                        report.skipped_ids.push(listing.id);
                    }
                    // Deleted between scan and reindex.
                    Err(SearchError::NotFound(_)) => {
                        report.skipped += 1;
                        report.skipped_ids.push(listing.id);
                    }
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(listing_id = listing.id, error = %e, "backfill failed");
                        report.failed += 1;
                        report.failed_ids.push(listing.id);
                    }
                    Err(e) => return Err(e),
                }
            }

            tracing::debug!(cursor, scanned = report.scanned, "backfill batch done");
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            scanned = report.scanned,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "backfill complete"
        );
        Ok(report)
    }

    /// Read-only invariant check over active listings.
    pub fn verify(&self) -> Result<VerifyReport> {
        let version = self.indexer.provider().model_version().as_str();
        let mut report = VerifyReport::default();
        let mut cursor = 0;

        loop {
            let batch = self.repo.scan_index_records(cursor, self.batch_size)?;
            let Some(last) = batch.last() else { break };
            cursor = last.id;

            for record in batch {
                report.checked += 1;

                let violation = match (&record.fault, &record.embedding_model_version) {
                    (Some(fault), _) => Some(fault.clone()),
                    (None, None) if record.has_embedding => Some(Violation::MissingModelVersion),
                    (None, Some(orphan)) if !record.has_embedding => {
                        Some(Violation::OrphanModelVersion(orphan.clone()))
                    }
                    _ => None,
                };

                if let Some(violation) = violation {
                    report.violations.push(ViolationEntry {
                        id: record.id,
                        violation,
                    });
                } else if !record.has_embedding || record.index_state == IndexState::Pending {
                    report.missing_ids.push(record.id);
                } else if record.index_state != IndexState::Current
                    || record.embedding_model_version.as_deref() != Some(version)
                {
                    report.stale_ids.push(record.id);
                }
            }
        }

        Ok(report)
    }
}
