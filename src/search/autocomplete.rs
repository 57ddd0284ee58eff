//! Title autocomplete.
//!
//! Case-insensitive substring match over active titles. No embeddings are
//! involved, so this stays fast while the provider is slow or down.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::RegexBuilder;

use super::vectordb::ItemRepository;
use crate::core::config::SearchConfig;
use crate::core::error::{Result, SearchError};
use crate::core::listing::{ListingSummary, Suggestion};

pub struct AutocompleteService {
    repo: Arc<dyn ItemRepository>,
    default_limit: usize,
    max_limit: usize,
}

impl AutocompleteService {
    pub fn new(repo: Arc<dyn ItemRepository>, config: &SearchConfig) -> Self {
        Self {
            repo,
            default_limit: config.suggest_default_limit,
            max_limit: config.suggest_max_limit,
        }
    }

    /// Limits outside `1..=max` fall back to the default.
    pub fn effective_limit(&self, limit: Option<usize>) -> usize {
        match limit {
            Some(n) if (1..=self.max_limit).contains(&n) => n,
            _ => self.default_limit,
        }
    }

    pub fn suggest(&self, query: &str, limit: Option<usize>) -> Result<Vec<Suggestion>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.effective_limit(limit);

        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))?;

        let mut matches: Vec<(usize, ListingSummary)> = self
            .repo
            .active_summaries()?
            .into_iter()
            .filter_map(|summary| {
                let found = pattern.find(&summary.title)?;
                let position = summary.title[..found.start()].chars().count();
                Some((position, summary))
            })
            .collect();

        matches.sort_by(|(pos_a, a), (pos_b, b)| by_position(*pos_a, a, *pos_b, b));

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, summary)| Suggestion {
                id: summary.id,
                title: summary.title,
                thumbnail: summary.thumbnail,
            })
            .collect())
    }
}

fn by_position(pos_a: usize, a: &ListingSummary, pos_b: usize, b: &ListingSummary) -> Ordering {
    pos_a
        .cmp(&pos_b)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::core::listing::ListingStatus;
    use crate::search::testkit::draft;
    use crate::search::vectordb::VectorDB;

    fn service(titles: &[&str]) -> (AutocompleteService, Arc<VectorDB>) {
        let db = Arc::new(VectorDB::open_in_memory(4).unwrap());
        let base = Utc::now();
        for (i, title) in titles.iter().enumerate() {
            db.insert(&draft(title, ""), base + Duration::seconds(i as i64)).unwrap();
        }
        let service = AutocompleteService::new(db.clone(), &SearchConfig::default());
        (service, db)
    }

    fn titles(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_substring_match_ordered_by_position() {
        let (service, _) = service(&["Navy blazer", "Blue bike", "Table lamp", "Bluetooth speaker"]);
        let results = service.suggest("bl", None).unwrap();

        // "Bluetooth speaker" is newer than "Blue bike"; both match at 0.
        assert_eq!(
            titles(&results),
            vec!["Bluetooth speaker", "Blue bike", "Table lamp", "Navy blazer"]
        );
    }

    #[test]
    fn test_case_insensitive_and_escaped() {
        let (service, _) = service(&["C++ Primer (5th ed.)", "Cello"]);
        assert_eq!(titles(&service.suggest("c++", None).unwrap()), vec!["C++ Primer (5th ed.)"]);
        assert_eq!(titles(&service.suggest("(5TH", None).unwrap()), vec!["C++ Primer (5th ed.)"]);
        assert!(service.suggest(".*", None).unwrap().is_empty());
    }

    #[test]
    fn test_position_counts_characters() {
        let (service, _) = service(&["Élan bike", "Ebike"]);
        let results = service.suggest("bike", None).unwrap();
        assert_eq!(titles(&results), vec!["Ebike", "Élan bike"]);
    }

    #[test]
    fn test_blank_query_is_empty() {
        let (service, _) = service(&["Blue bike"]);
        assert!(service.suggest("   ", None).unwrap().is_empty());
    }

    #[test]
    fn test_limit_fallback_and_cap() {
        let names: Vec<String> = (0..12).map(|i| format!("Lamp {}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (service, _) = service(&refs);

        assert_eq!(service.suggest("lamp", None).unwrap().len(), 8);
        assert_eq!(service.suggest("lamp", Some(3)).unwrap().len(), 3);
        assert_eq!(service.suggest("lamp", Some(0)).unwrap().len(), 8);
        assert_eq!(service.suggest("lamp", Some(500)).unwrap().len(), 8);
        assert_eq!(service.effective_limit(Some(50)), 50);
    }

    #[test]
    fn test_inactive_listings_excluded() {
        let (service, db) = service(&["Blue bike", "Blue helmet"]);
        let mut sold = db.get(1).unwrap().unwrap();
        sold.status = ListingStatus::Sold;
        db.save(&sold).unwrap();

        assert_eq!(titles(&service.suggest("blue", None).unwrap()), vec!["Blue helmet"]);
    }
}
