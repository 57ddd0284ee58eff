use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SearchError;

/// Structural filters applied before any scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub seller_type: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

impl SearchFilters {
    pub fn category(category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    /// Blank strings count as "not supplied".
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        }

        Self {
            category: clean(&self.category),
            seller_type: clean(&self.seller_type),
            condition: clean(&self.condition),
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.seller_type.is_none()
            && self.condition.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        for bound in [self.min_price, self.max_price].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(SearchError::InvalidQuery(format!(
                    "price bound must be finite, got {}",
                    bound
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(SearchError::InvalidQuery(format!(
                    "min_price {} exceeds max_price {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

/// Ordering for filter-only browsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseSort {
    #[default]
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
}

impl FromStr for BrowseSort {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "price_low" => Ok(Self::PriceLow),
            "price_high" => Ok(Self::PriceHigh),
            other => Err(SearchError::InvalidQuery(format!(
                "unknown sort '{}' (must be: newest|oldest|price_low|price_high)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filters_are_empty() {
        let filters = SearchFilters {
            category: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!filters.is_empty());
        assert!(filters.normalized().is_empty());
    }

    #[test]
    fn test_inverted_price_range_rejected() {
        let filters = SearchFilters {
            min_price: Some(50.0),
            max_price: Some(10.0),
            ..Default::default()
        };
        assert!(matches!(filters.validate(), Err(SearchError::InvalidQuery(_))));
    }

    #[test]
    fn test_browse_sort_parse() {
        assert_eq!("price_low".parse::<BrowseSort>().unwrap(), BrowseSort::PriceLow);
        assert_eq!(BrowseSort::default(), BrowseSort::Newest);
        assert!("cheapest".parse::<BrowseSort>().is_err());
    }
}
