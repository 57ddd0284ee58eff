use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Sold,
    Removed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Sold => "sold",
            Self::Removed => "removed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "sold" => Ok(Self::Sold),
            "removed" => Ok(Self::Removed),
            other => Err(SearchError::InvalidInput(format!(
                "unknown status '{}' (must be: active|sold|removed)",
                other
            ))),
        }
    }
}

/// Where a listing stands with respect to its embedding.
///
/// `Malformed` is never persisted: the repository derives it on read when
/// the stored blob does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Current,
    Stale,
    Pending,
    Malformed,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Stale => "stale",
            Self::Pending => "pending",
            Self::Malformed => "malformed",
        }
    }

    /// Parse a stored state. Unknown values read as `Pending` so the
    /// auditor picks the row up again.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "current" => Self::Current,
            "stale" => Self::Stale,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub seller_type: Option<String>,
    pub condition: Option<String>,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub status: ListingStatus,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model_version: Option<String>,
    pub index_state: IndexState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// True when the stored vector can be used for similarity against
    /// vectors produced by `model_version`.
    pub fn has_current_embedding(&self, model_version: &str) -> bool {
        self.index_state == IndexState::Current
            && self.embedding.is_some()
            && self.embedding_model_version.as_deref() == Some(model_version)
    }

    /// Whether backfill should recompute this listing.
    pub fn needs_indexing(&self, model_version: &str) -> bool {
        self.is_active() && !self.has_current_embedding(model_version)
    }

    pub fn summary(&self) -> ListingSummary {
        ListingSummary {
            id: self.id,
            title: self.title.clone(),
            category: self.category.clone(),
            price: self.price,
            thumbnail: self.thumbnail.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Input for creating a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub seller_type: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Partial edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub seller_type: Option<String>,
    pub condition: Option<String>,
    pub price: Option<f64>,
    pub thumbnail: Option<String>,
    pub status: Option<ListingStatus>,
}

impl ListingUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.seller_type.is_none()
            && self.condition.is_none()
            && self.price.is_none()
            && self.thumbnail.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSummary {
    pub id: i64,
    pub title: String,
    pub category: Option<String>,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Autocomplete record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: i64,
    pub title: String,
    pub thumbnail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("Active".parse::<ListingStatus>().unwrap(), ListingStatus::Active);
        assert_eq!(" SOLD ".parse::<ListingStatus>().unwrap(), ListingStatus::Sold);
        assert!("archived".parse::<ListingStatus>().is_err());
    }

    #[test]
    fn test_unknown_stored_state_reads_as_pending() {
        assert_eq!(IndexState::from_stored("current"), IndexState::Current);
        assert_eq!(IndexState::from_stored("stale"), IndexState::Stale);
        assert_eq!(IndexState::from_stored("malformed"), IndexState::Pending);
        assert_eq!(IndexState::from_stored(""), IndexState::Pending);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ListingUpdate::default().is_empty());
        let update = ListingUpdate {
            price: Some(3.0),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
