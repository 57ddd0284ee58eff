//! Listing repository backed by SQLite
//!
//! Stores embeddings as BLOBs next to the listing text and computes
//! similarity in Rust. Text, vector, model version and index state live in
//! one row and are written by one statement, so readers never observe a
//! vector paired with text from another revision.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::codec::VectorCodec;
use crate::core::error::{Result, SearchError};
use crate::core::filters::SearchFilters;
use crate::core::listing::{IndexState, Listing, ListingDraft, ListingStatus, ListingSummary};
use crate::core::schema::Violation;

const LISTING_COLUMNS: &str = "id, title, description, category, seller_type, condition, price, \
     thumbnail, status, embedding, embedding_model_version, index_state, created_at, updated_at";

/// Persistence boundary for listings.
pub trait ItemRepository: Send + Sync {
    /// Persist a new listing (no embedding, state `pending`).
    fn insert(&self, draft: &ListingDraft, now: DateTime<Utc>) -> Result<Listing>;

    fn get(&self, id: i64) -> Result<Option<Listing>>;

    /// Active listings matching the structural filters.
    fn find_active(&self, filters: &SearchFilters) -> Result<Vec<Listing>>;

    /// Write every mutable column of `listing` in one statement.
    fn save(&self, listing: &Listing) -> Result<()>;

    /// Active listings with `id > after_id`, ascending, at most `limit`.
    fn scan_active(&self, after_id: i64, limit: usize) -> Result<Vec<Listing>>;

    /// Blob-free projection of active listings for autocomplete.
    fn active_summaries(&self) -> Result<Vec<ListingSummary>>;

    fn stats(&self, model_version: &str) -> Result<IndexStats>;

    /// Embedding diagnostics for active listings with `id > after_id`,
    /// ascending, at most `limit`. Read-only.
    fn scan_index_records(&self, after_id: i64, limit: usize) -> Result<Vec<IndexRecord>>;
}

/// What `verify` needs to know about one stored embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: i64,
    pub has_embedding: bool,
    pub embedding_model_version: Option<String>,
    pub index_state: IndexState,
    pub fault: Option<Violation>,
}

/// SQLite listing store
pub struct VectorDB {
    conn: Mutex<Connection>,
    codec: VectorCodec,
}

impl VectorDB {
    /// Open or create database at path
    pub fn open(db_path: &Path, dimension: usize) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, dimension)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory(dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, dimension)
    }

    fn with_connection(conn: Connection, dimension: usize) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
            codec: VectorCodec::new(dimension),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic elsewhere does not invalidate the connection itself.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT,
                seller_type TEXT,
                condition TEXT,
                price REAL NOT NULL DEFAULT 0,
                thumbnail TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                embedding BLOB,
                embedding_model_version TEXT,
                index_state TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_listings_status ON listings(status);
            CREATE INDEX IF NOT EXISTS idx_listings_category ON listings(category);
            CREATE INDEX IF NOT EXISTS idx_listings_updated ON listings(updated_at);
            "#,
        )?;

        Ok(())
    }

    fn row_to_listing(&self, row: &Row<'_>) -> rusqlite::Result<Listing> {
        let id: i64 = row.get(0)?;
        let status_raw: String = row.get(8)?;
        let status = status_raw
            .parse::<ListingStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
        let blob: Option<Vec<u8>> = row.get(9)?;
        let state_raw: String = row.get(11)?;
        let mut index_state = IndexState::from_stored(&state_raw);

        let embedding = match blob {
            Some(bytes) => match self.codec.inspect(&bytes) {
                None => Some(self.codec.decode(&bytes).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(9, Type::Blob, Box::new(e))
                })?),
                Some(fault) => {
                    tracing::warn!(listing_id = id, %fault, "excluding malformed embedding");
                    index_state = IndexState::Malformed;
                    None
                }
            },
            None => None,
        };

        Ok(Listing {
            id,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            seller_type: row.get(4)?,
            condition: row.get(5)?,
            price: row.get(6)?,
            thumbnail: row.get(7)?,
            status,
            embedding,
            embedding_model_version: row.get(10)?,
            index_state,
            created_at: from_millis(row.get(12)?),
            updated_at: from_millis(row.get(13)?),
        })
    }

    fn query_listings(&self, sql: &str, values: &[&dyn ToSql]) -> Result<Vec<Listing>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| self.row_to_listing(row))?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }

    /// Set index metadata
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get index metadata
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Overwrite a stored blob without validation. Only used to simulate
    /// storage corruption in tests.
    #[cfg(test)]
    pub(crate) fn write_raw_embedding(&self, id: i64, blob: Option<Vec<u8>>) -> Result<()> {
        self.conn().execute(
            "UPDATE listings SET embedding = ?1 WHERE id = ?2",
            params![blob, id],
        )?;
        Ok(())
    }
}

impl ItemRepository for VectorDB {
    fn insert(&self, draft: &ListingDraft, now: DateTime<Utc>) -> Result<Listing> {
        let millis = now.timestamp_millis();
        let id = {
            let conn = self.conn();
            conn.execute(
                r#"
                INSERT INTO listings (title, description, category, seller_type, condition, price,
                                      thumbnail, status, index_state, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', 'pending', ?8, ?8)
                "#,
                params![
                    draft.title.trim(),
                    draft.description.trim(),
                    draft.category,
                    draft.seller_type,
                    draft.condition,
                    draft.price,
                    draft.thumbnail,
                    millis,
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get(id)?.ok_or(SearchError::NotFound(id))
    }

    fn get(&self, id: i64) -> Result<Option<Listing>> {
        let sql = format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS);
        let conn = self.conn();
        let listing = conn
            .query_row(&sql, params![id], |row| self.row_to_listing(row))
            .optional()?;
        Ok(listing)
    }

    fn find_active(&self, filters: &SearchFilters) -> Result<Vec<Listing>> {
        let filters = filters.normalized();
        let mut clauses = vec!["status = 'active'"];
        let mut values: Vec<&dyn ToSql> = Vec::new();

        if let Some(category) = &filters.category {
            clauses.push("category = ? COLLATE NOCASE");
            values.push(category);
        }
        if let Some(seller_type) = &filters.seller_type {
            clauses.push("seller_type = ? COLLATE NOCASE");
            values.push(seller_type);
        }
        if let Some(condition) = &filters.condition {
            clauses.push("condition = ? COLLATE NOCASE");
            values.push(condition);
        }
        if let Some(min_price) = &filters.min_price {
            clauses.push("price >= ?");
            values.push(min_price);
        }
        if let Some(max_price) = &filters.max_price {
            clauses.push("price <= ?");
            values.push(max_price);
        }

        // Linear scan over the filtered set; an ANN index would slot in here.
        let sql = format!(
            "SELECT {} FROM listings WHERE {} ORDER BY id",
            LISTING_COLUMNS,
            clauses.join(" AND ")
        );
        self.query_listings(&sql, &values)
    }

    fn save(&self, listing: &Listing) -> Result<()> {
        let blob = match &listing.embedding {
            Some(vector) => Some(self.codec.encode(vector)?),
            None => None,
        };
        // Malformed is a read-side diagnosis; persisting it would hide the row from repair.
        let state = match listing.index_state {
            IndexState::Malformed => IndexState::Stale,
            state => state,
        };

        let changed = self.conn().execute(
            r#"
            UPDATE listings SET
                title = ?1,
                description = ?2,
                category = ?3,
                seller_type = ?4,
                condition = ?5,
                price = ?6,
                thumbnail = ?7,
                status = ?8,
                embedding = ?9,
                embedding_model_version = ?10,
                index_state = ?11,
                updated_at = ?12
            WHERE id = ?13
            "#,
            params![
                listing.title,
                listing.description,
                listing.category,
                listing.seller_type,
                listing.condition,
                listing.price,
                listing.thumbnail,
                listing.status.as_str(),
                blob,
                listing.embedding_model_version,
                state.as_str(),
                listing.updated_at.timestamp_millis(),
                listing.id,
            ],
        )?;

        if changed == 0 {
            return Err(SearchError::NotFound(listing.id));
        }
        Ok(())
    }

    fn scan_active(&self, after_id: i64, limit: usize) -> Result<Vec<Listing>> {
        let sql = format!(
            "SELECT {} FROM listings WHERE status = 'active' AND id > ?1 ORDER BY id LIMIT ?2",
            LISTING_COLUMNS
        );
        let limit = limit as i64;
        self.query_listings(&sql, &[&after_id as &dyn ToSql, &limit])
    }

    fn active_summaries(&self) -> Result<Vec<ListingSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, category, price, thumbnail, updated_at FROM listings WHERE status = 'active'",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ListingSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                price: row.get(3)?,
                thumbnail: row.get(4)?,
                updated_at: from_millis(row.get(5)?),
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    fn stats(&self, model_version: &str) -> Result<IndexStats> {
        let conn = self.conn();
        let active = "status = 'active'";

        let listing_count = count_rows(&conn, "SELECT COUNT(*) FROM listings", &[])?;
        let active_count = count_rows(
            &conn,
            &format!("SELECT COUNT(*) FROM listings WHERE {}", active),
            &[],
        )?;
        let embedding_count = count_rows(
            &conn,
            &format!("SELECT COUNT(*) FROM listings WHERE {} AND embedding IS NOT NULL", active),
            &[],
        )?;
        let current_count = count_rows(
            &conn,
            &format!(
                "SELECT COUNT(*) FROM listings WHERE {} AND embedding IS NOT NULL \
                 AND index_state = 'current' AND embedding_model_version = ?1",
                active
            ),
            &[&model_version as &dyn ToSql],
        )?;
        let pending_count = count_rows(
            &conn,
            &format!("SELECT COUNT(*) FROM listings WHERE {} AND index_state = 'pending'", active),
            &[],
        )?;

        let last_updated: Option<i64> = conn
            .query_row("SELECT MAX(updated_at) FROM listings", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(IndexStats {
            listing_count,
            active_count,
            embedding_count,
            current_count,
            pending_count,
            last_updated: last_updated.map(from_millis),
        })
    }

    fn scan_index_records(&self, after_id: i64, limit: usize) -> Result<Vec<IndexRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, embedding, embedding_model_version, index_state FROM listings \
             WHERE status = 'active' AND id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![after_id, limit as i64], |row| {
            let blob: Option<Vec<u8>> = row.get(1)?;
            let state_raw: String = row.get(3)?;
            Ok(IndexRecord {
                id: row.get(0)?,
                has_embedding: blob.is_some(),
                embedding_model_version: row.get(2)?,
                index_state: IndexState::from_stored(&state_raw),
                fault: blob.as_deref().and_then(|bytes| self.codec.inspect(bytes)),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

/// Index statistics
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub listing_count: usize,
    pub active_count: usize,
    pub embedding_count: usize,
    pub current_count: usize,
    pub pending_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

impl IndexStats {
    /// Active listings that backfill would touch.
    pub fn needs_indexing(&self) -> usize {
        self.active_count.saturating_sub(self.current_count)
    }
}

fn count_rows(conn: &Connection, sql: &str, values: &[&dyn ToSql]) -> Result<usize> {
    let n: i64 = conn.query_row(sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(n as usize)
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, category: &str, price: f64) -> ListingDraft {
        ListingDraft {
            title: title.to_string(),
            description: format!("{} in good condition", title),
            category: Some(category.to_string()),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_get() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let created = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;

        let retrieved = db.get(created.id)?.unwrap();
        assert_eq!(retrieved.title, "Desk lamp");
        assert_eq!(retrieved.status, ListingStatus::Active);
        assert_eq!(retrieved.index_state, IndexState::Pending);
        assert!(retrieved.embedding.is_none());
        assert!(db.get(created.id + 100)?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_writes_text_and_vector_together() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let mut listing = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;

        listing.title = "LED desk lamp".to_string();
        listing.embedding = Some(vec![0.5, 0.5, 0.5, 0.5]);
        listing.embedding_model_version = Some("v1".to_string());
        listing.index_state = IndexState::Current;
        db.save(&listing)?;

        let stored = db.get(listing.id)?.unwrap();
        assert_eq!(stored.title, "LED desk lamp");
        assert_eq!(stored.embedding, Some(vec![0.5, 0.5, 0.5, 0.5]));
        assert_eq!(stored.embedding_model_version.as_deref(), Some("v1"));
        assert_eq!(stored.index_state, IndexState::Current);
        Ok(())
    }

    #[test]
    fn test_save_rejects_wrong_dimension() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let mut listing = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;
        listing.embedding = Some(vec![1.0, 2.0]);
        assert!(matches!(db.save(&listing), Err(SearchError::MalformedVector(_))));
        Ok(())
    }

    #[test]
    fn test_save_unknown_id_is_not_found() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let mut listing = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;
        listing.id = 999;
        assert!(matches!(db.save(&listing), Err(SearchError::NotFound(999))));
        Ok(())
    }

    #[test]
    fn test_find_active_applies_filters() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        db.insert(&draft("Mountain bike", "sports", 300.0), Utc::now())?;
        db.insert(&draft("Bike helmet", "sports", 40.0), Utc::now())?;
        let mut sold = db.insert(&draft("Road bike", "sports", 500.0), Utc::now())?;
        db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;

        sold.status = ListingStatus::Sold;
        db.save(&sold)?;

        let sports = db.find_active(&SearchFilters::category("Sports"))?;
        assert_eq!(sports.len(), 2);

        let cheap_sports = db.find_active(&SearchFilters {
            category: Some("sports".to_string()),
            max_price: Some(100.0),
            ..Default::default()
        })?;
        assert_eq!(cheap_sports.len(), 1);
        assert_eq!(cheap_sports[0].title, "Bike helmet");

        assert_eq!(db.find_active(&SearchFilters::default())?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_malformed_blob_reads_as_malformed_state() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let listing = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;
        db.write_raw_embedding(listing.id, Some(vec![1, 2, 3]))?;

        let stored = db.get(listing.id)?.unwrap();
        assert!(stored.embedding.is_none());
        assert_eq!(stored.index_state, IndexState::Malformed);

        // The rest of the corpus still reads fine.
        db.insert(&draft("Lamp shade", "home", 5.0), Utc::now())?;
        assert_eq!(db.find_active(&SearchFilters::default())?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_non_finite_blob_reads_as_malformed() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let listing = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;
        let blob = VectorCodec::new(4).encode(&[0.5, f32::INFINITY, 0.5, 0.5])?;
        db.write_raw_embedding(listing.id, Some(blob))?;

        let stored = db.get(listing.id)?.unwrap();
        assert!(stored.embedding.is_none());
        assert_eq!(stored.index_state, IndexState::Malformed);

        let records = db.scan_index_records(0, 10)?;
        assert_eq!(records.len(), 1);
        assert!(records[0].has_embedding);
        assert_eq!(records[0].fault, Some(Violation::NonFiniteComponent { index: 1 }));
        Ok(())
    }

    #[test]
    fn test_scan_active_pages_by_id() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        for i in 0..5 {
            db.insert(&draft(&format!("Item {}", i), "misc", 1.0), Utc::now())?;
        }

        let first = db.scan_active(0, 2)?;
        assert_eq!(first.len(), 2);
        let second = db.scan_active(first[1].id, 2)?;
        assert_eq!(second.len(), 2);
        assert!(second[0].id > first[1].id);
        let last = db.scan_active(second[1].id, 2)?;
        assert_eq!(last.len(), 1);
        Ok(())
    }

    #[test]
    fn test_stats_and_meta() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        let mut listing = db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;
        db.insert(&draft("Lamp shade", "home", 5.0), Utc::now())?;

        listing.embedding = Some(vec![0.0, 1.0, 0.0, 0.0]);
        listing.embedding_model_version = Some("v1".to_string());
        listing.index_state = IndexState::Current;
        db.save(&listing)?;

        let stats = db.stats("v1")?;
        assert_eq!(stats.listing_count, 2);
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.embedding_count, 1);
        assert_eq!(stats.current_count, 1);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.needs_indexing(), 1);
        assert_eq!(db.stats("v2")?.current_count, 0);

        db.set_meta("last_backfill", "123")?;
        assert_eq!(db.get_meta("last_backfill")?.as_deref(), Some("123"));
        assert!(db.get_meta("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_active_summaries_skip_inactive() -> Result<()> {
        let db = VectorDB::open_in_memory(4)?;
        db.insert(&draft("Desk lamp", "home", 12.0), Utc::now())?;
        let mut removed = db.insert(&draft("Lamp shade", "home", 5.0), Utc::now())?;
        removed.status = ListingStatus::Removed;
        db.save(&removed)?;

        let summaries = db.active_summaries()?;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "Desk lamp");
        Ok(())
    }
}
