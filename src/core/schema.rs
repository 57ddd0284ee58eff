use serde::Serialize;

use super::error::SearchError;
use super::listing::{ListingDraft, ListingUpdate};

pub const MAX_TITLE_CHARS: usize = 150;

/// Invariant breaches reported by `verify`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    MalformedVector,
    WrongDimension { expected: usize, actual: usize },
    MissingModelVersion,
    OrphanModelVersion(String),
    NonFiniteComponent { index: usize },
}

impl Violation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedVector => "malformed_vector",
            Self::WrongDimension { .. } => "wrong_dimension",
            Self::MissingModelVersion => "missing_model_version",
            Self::OrphanModelVersion(_) => "orphan_model_version",
            Self::NonFiniteComponent { .. } => "non_finite_component",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedVector => write!(f, "Stored embedding blob does not decode"),
            Self::WrongDimension { expected, actual } => {
                write!(f, "Embedding has {} dimensions (expected {})", actual, expected)
            }
            Self::MissingModelVersion => write!(f, "Embedding present without a model version"),
            Self::OrphanModelVersion(v) => {
                write!(f, "Model version '{}' recorded without an embedding", v)
            }
            Self::NonFiniteComponent { index } => {
                write!(f, "Embedding component {} is NaN or infinite", index)
            }
        }
    }
}

pub fn validate_title(title: &str) -> Result<(), SearchError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(SearchError::InvalidInput("title is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(SearchError::InvalidInput(format!(
            "title exceeds {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

pub fn validate_price(price: f64) -> Result<(), SearchError> {
    if !price.is_finite() || price < 0.0 {
        return Err(SearchError::InvalidInput(format!(
            "price must be a non-negative number, got {}",
            price
        )));
    }
    Ok(())
}

pub fn validate_draft(draft: &ListingDraft) -> Result<(), SearchError> {
    validate_title(&draft.title)?;
    validate_price(draft.price)
}

pub fn validate_update(update: &ListingUpdate) -> Result<(), SearchError> {
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, price: f64) -> ListingDraft {
        ListingDraft {
            title: title.to_string(),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn test_title_required() {
        assert!(validate_draft(&draft("   ", 1.0)).is_err());
        assert!(validate_draft(&draft("Winter jacket", 1.0)).is_ok());
    }

    #[test]
    fn test_title_length_limit() {
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(validate_draft(&draft(&long, 1.0)).is_err());
        let exact = "é".repeat(MAX_TITLE_CHARS);
        assert!(validate_draft(&draft(&exact, 1.0)).is_ok());
    }

    #[test]
    fn test_price_must_be_finite_and_non_negative() {
        assert!(validate_draft(&draft("Lamp", -0.5)).is_err());
        assert!(validate_draft(&draft("Lamp", f64::NAN)).is_err());
        assert!(validate_draft(&draft("Lamp", 0.0)).is_ok());
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        assert!(validate_update(&ListingUpdate::default()).is_ok());
        let bad = ListingUpdate {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_update(&bad).is_err());
    }
}
