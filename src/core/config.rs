//! Search configuration loaded from `.listings/config.yaml`.
//!
//! Every field has a default so a partial (or missing) file is valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SearchError;

/// Weight of cosine similarity in the fused score.
const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.5;
/// Weight of keyword overlap in the fused score. Keeping it >= the semantic
/// weight means a full title keyword match is never outranked by similarity alone.
const DEFAULT_KEYWORD_WEIGHT: f32 = 0.5;
/// Minimum similarity for a semantic-only hit
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.25;
const DEFAULT_PAGE_SIZE: i64 = 20;
const DEFAULT_MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_SUGGEST_LIMIT: usize = 8;
const DEFAULT_SUGGEST_MAX_LIMIT: usize = 50;
const DEFAULT_BACKFILL_BATCH_SIZE: usize = 64;
const DEFAULT_EMBED_TIMEOUT_MS: u64 = 2_000;

/// When the write path computes embeddings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Embed before the write returns.
    #[default]
    Sync,
    /// Persist content as `pending`; backfill embeds later.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,

    #[serde(default = "default_suggest_limit")]
    pub suggest_default_limit: usize,

    #[serde(default = "default_suggest_max_limit")]
    pub suggest_max_limit: usize,

    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,

    /// An `embed` call slower than this counts as provider unavailable
    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,

    #[serde(default)]
    pub index_mode: IndexMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            suggest_default_limit: DEFAULT_SUGGEST_LIMIT,
            suggest_max_limit: DEFAULT_SUGGEST_MAX_LIMIT,
            backfill_batch_size: DEFAULT_BACKFILL_BATCH_SIZE,
            embed_timeout_ms: DEFAULT_EMBED_TIMEOUT_MS,
            index_mode: IndexMode::Sync,
        }
    }
}

fn default_semantic_weight() -> f32 {
    DEFAULT_SEMANTIC_WEIGHT
}

fn default_keyword_weight() -> f32 {
    DEFAULT_KEYWORD_WEIGHT
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> i64 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_suggest_limit() -> usize {
    DEFAULT_SUGGEST_LIMIT
}

fn default_suggest_max_limit() -> usize {
    DEFAULT_SUGGEST_MAX_LIMIT
}

fn default_backfill_batch_size() -> usize {
    DEFAULT_BACKFILL_BATCH_SIZE
}

fn default_embed_timeout_ms() -> u64 {
    DEFAULT_EMBED_TIMEOUT_MS
}

impl SearchConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, SearchError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(raw).map_err(|e| SearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, SearchError> {
        serde_yaml::to_string(self).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// True when a full keyword match (1.0) can never be outranked by
    /// similarity alone.
    pub fn title_match_dominates(&self) -> bool {
        self.semantic_weight <= self.keyword_weight
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        for (name, weight) in [
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SearchError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if self.semantic_weight + self.keyword_weight <= 0.0 {
            return Err(SearchError::Config(
                "semantic_weight and keyword_weight cannot both be zero".to_string(),
            ));
        }
        if !self.title_match_dominates() {
            tracing::warn!(
                semantic_weight = self.semantic_weight,
                keyword_weight = self.keyword_weight,
                "semantic_weight exceeds keyword_weight; similarity alone can outrank a full title match"
            );
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SearchError::Config(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.default_page_size <= 0 || self.max_page_size < self.default_page_size {
            return Err(SearchError::Config(format!(
                "page sizes must satisfy 0 < default_page_size ({}) <= max_page_size ({})",
                self.default_page_size, self.max_page_size
            )));
        }
        if self.suggest_default_limit == 0 || self.suggest_max_limit < self.suggest_default_limit
        {
            return Err(SearchError::Config(format!(
                "suggest limits must satisfy 0 < suggest_default_limit ({}) <= suggest_max_limit ({})",
                self.suggest_default_limit, self.suggest_max_limit
            )));
        }
        if self.backfill_batch_size == 0 {
            return Err(SearchError::Config(
                "backfill_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.title_match_dominates());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = SearchConfig::from_yaml("semantic_weight: 0.3\nindex_mode: deferred\n").unwrap();
        assert!((config.semantic_weight - 0.3).abs() < f32::EPSILON);
        assert!((config.keyword_weight - DEFAULT_KEYWORD_WEIGHT).abs() < f32::EPSILON);
        assert_eq!(config.index_mode, IndexMode::Deferred);
        assert_eq!(config.suggest_default_limit, 8);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(SearchConfig::from_yaml("").unwrap(), SearchConfig::default());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(SearchConfig::from_yaml("semantic_weight: -1.0").is_err());
        assert!(SearchConfig::from_yaml("semantic_weight: 0.0\nkeyword_weight: 0.0").is_err());
        assert!(SearchConfig::from_yaml("similarity_threshold: 1.5").is_err());
        assert!(SearchConfig::from_yaml("backfill_batch_size: 0").is_err());
    }

    #[test]
    fn test_semantic_heavy_weights_load_but_lose_title_dominance() {
        let config =
            SearchConfig::from_yaml("semantic_weight: 0.8\nkeyword_weight: 0.2\n").unwrap();
        assert!(!config.title_match_dominates());
        assert!(SearchConfig::default().title_match_dominates());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SearchConfig::load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = SearchConfig {
            keyword_weight: 0.7,
            ..Default::default()
        };
        std::fs::write(&path, config.to_yaml().unwrap()).unwrap();
        assert_eq!(SearchConfig::load(&path).unwrap(), config);
    }
}
