//! Listing search engine
//!
//! Embedding, storage, hybrid ranking, autocomplete and corpus audit.
//! Similarity is an exact linear scan over the filtered candidate set.

pub mod auditor;
pub mod autocomplete;
pub mod codec;
pub mod embedding;
pub mod engine;
pub mod indexer;
pub mod ranking;
pub mod vectordb;

#[cfg(test)]
mod testkit;

pub use auditor::{BackfillReport, ConsistencyAuditor, VerifyReport};
pub use autocomplete::AutocompleteService;
pub use embedding::{DeadlineProvider, EmbeddingProvider, HtpEmbedder, ModelVersion, OfflineProvider};
pub use engine::{SearchEngine, SearchMode, SearchPage, SearchRequest, SearchResult};
pub use indexer::{IndexOutcome, IndexingService, WriteReport};
pub use vectordb::{IndexStats, ItemRepository, VectorDB};
