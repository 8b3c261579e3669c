//! Knowledge base domain module
//!
//! Reference text the tutoring bot draws on:
//!
//! - **Entries**: titled, categorized text, global or scoped to a course
//! - **Similarity**: cosine scoring of embeddings
//! - **Retrieval**: semantic top-K with a usage/recency fallback
//! - **Indexing**: embeddings computed when entries are written
//!
//! ```rust,ignore
//! let retriever = KnowledgeRetriever::new(store, embedder);
//! let outcome = retriever
//!     .retrieve("how do I prepare for the midterm", &RetrievalScope::course("x"), 5)
//!     .await?;
//! ```

mod entry;
mod repository;
mod search;
mod service;
mod similarity;

pub use entry::{
    KnowledgeCategory, KnowledgeEntry, KnowledgeFilter, RetrievalResult, RetrievalScope,
    RetrievalStrategy, RetrievedKnowledge,
};
pub use repository::{KnowledgeOrder, KnowledgeStore};
pub use search::{CANDIDATE_CAP, FALLBACK_SCORE, KnowledgeRetriever, rank_candidates};
pub use service::{KnowledgeIndexer, KnowledgeUpdate, NewKnowledgeEntry};
pub use similarity::cosine_similarity;
