//! Repository trait for knowledge base persistence

use async_trait::async_trait;

use crate::error::Result;

use super::entry::{KnowledgeEntry, KnowledgeFilter};

/// Ordering applied by [`KnowledgeStore::find`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnowledgeOrder {
    /// Most recently updated first (candidate fetch)
    #[default]
    RecentlyUpdated,
    /// `usage_count desc, created_at desc` (fallback ranking)
    MostUsed,
}

/// Knowledge base storage
///
/// The retrieval core never deletes entries; deletion belongs to the admin CRUD layer.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Fetch entries matching the filter, at most `filter.limit` of them
    async fn find(&self, filter: &KnowledgeFilter, order: KnowledgeOrder)
    -> Result<Vec<KnowledgeEntry>>;

    /// Get an entry by ID
    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>>;

    /// Insert or update an entry
    async fn save(&self, entry: &KnowledgeEntry) -> Result<()>;

    /// Increment `usage_count` and stamp `last_used`
    ///
    /// Returns false when the entry does not exist.
    async fn increment_usage(&self, id: &str) -> Result<bool>;

    /// Count entries (active and inactive)
    async fn count(&self) -> Result<u64>;
}
