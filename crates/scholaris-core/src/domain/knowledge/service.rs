//! Knowledge indexing
//!
//! Creates and updates knowledge entries, computing each entry's embedding
//! at write time. An embedding failure never blocks the write: the entry is
//! saved without a vector and only shows up through the fallback ranking
//! until `reindex_missing` succeeds.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::llm::EmbeddingProvider;

use super::entry::{KnowledgeCategory, KnowledgeEntry, KnowledgeFilter};
use super::repository::{KnowledgeOrder, KnowledgeStore};

/// Entries fetched per reindex batch
const REINDEX_BATCH: usize = 500;

/// Input for creating an entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKnowledgeEntry {
    pub title: String,
    pub content: String,
    pub category: KnowledgeCategory,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub relevance_score: Option<f32>,
}

/// Partial update of an entry; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<KnowledgeCategory>,
    /// `Some(None)` makes the entry global
    pub course_id: Option<Option<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub relevance_score: Option<f32>,
    pub is_active: Option<bool>,
}

impl KnowledgeUpdate {
    /// Whether the update changes text that feeds the embedding
    fn touches_embedded_text(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.tags.is_some()
    }
}

/// Writes knowledge entries and keeps their embeddings current
pub struct KnowledgeIndexer {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl KnowledgeIndexer {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Create and persist a new entry
    pub async fn create(&self, input: NewKnowledgeEntry) -> Result<KnowledgeEntry> {
        validate_text("title", &input.title)?;
        validate_text("content", &input.content)?;
        if let Some(relevance_score) = input.relevance_score {
            validate_relevance(relevance_score)?;
        }

        let mut entry = KnowledgeEntry::new(input.title.trim(), input.content.trim(), input.category)
            .with_tags(input.tags)
            .with_relevance_score(input.relevance_score.unwrap_or(1.0));
        entry.course_id = input.course_id.filter(|c| !c.trim().is_empty());

        self.refresh_embedding(&mut entry).await;
        self.store.save(&entry).await?;

        info!(
            knowledge_id = %entry.id,
            category = %entry.category,
            embedded = entry.has_embedding(),
            "Knowledge entry created"
        );
        Ok(entry)
    }

    /// Apply an update and re-embed when the embedded text changed
    pub async fn update(&self, id: &str, update: KnowledgeUpdate) -> Result<KnowledgeEntry> {
        let mut entry = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::KnowledgeEntryNotFound(id.to_string()))?;

        let reembed = update.touches_embedded_text() || !entry.has_embedding();

        if let Some(title) = update.title {
            validate_text("title", &title)?;
            entry.title = title.trim().to_string();
        }
        if let Some(content) = update.content {
            validate_text("content", &content)?;
            entry.content = content.trim().to_string();
        }
        if let Some(category) = update.category {
            entry.category = category;
        }
        if let Some(course_id) = update.course_id {
            entry.course_id = course_id.filter(|c| !c.trim().is_empty());
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        if let Some(relevance_score) = update.relevance_score {
            validate_relevance(relevance_score)?;
            entry.relevance_score = relevance_score;
        }
        if let Some(is_active) = update.is_active {
            entry.is_active = is_active;
        }
        entry.updated_at = Utc::now();

        if reembed {
            self.refresh_embedding(&mut entry).await;
        }
        self.store.save(&entry).await?;

        info!(knowledge_id = %entry.id, reembedded = reembed, "Knowledge entry updated");
        Ok(entry)
    }

    /// Embed every entry whose embedding is missing
    ///
    /// Returns how many entries gained an embedding.
    pub async fn reindex_missing(&self) -> Result<usize> {
        let filter = KnowledgeFilter::new(REINDEX_BATCH)
            .including_inactive()
            .missing_embedding();

        let mut indexed = 0;
        loop {
            let batch = self.store.find(&filter, KnowledgeOrder::RecentlyUpdated).await?;
            let fetched = batch.len();

            let mut progressed = 0;
            for mut entry in batch {
                if self.refresh_embedding(&mut entry).await {
                    self.store.save(&entry).await?;
                    progressed += 1;
                }
            }
            indexed += progressed;

            // Entries that failed to embed come back in the next batch
            if fetched < REINDEX_BATCH || progressed == 0 {
                break;
            }
        }

        info!(indexed, "Knowledge reindex completed");
        Ok(indexed)
    }

    /// Recompute the entry's embedding; on failure clear it and return false
    async fn refresh_embedding(&self, entry: &mut KnowledgeEntry) -> bool {
        match self.embedder.embed(&entry.embedding_text()).await {
            Ok(vector) if !vector.is_empty() => {
                entry.embedding = Some(vector);
                entry.embedding_model = Some(self.embedder.embedding_model().to_string());
                true
            }
            Ok(_) => {
                warn!(knowledge_id = %entry.id, "Embedding provider returned an empty vector");
                entry.embedding = None;
                entry.embedding_model = None;
                false
            }
            Err(e) => {
                warn!(knowledge_id = %entry.id, error = %e, "Embedding failed, saving entry without vector");
                entry.embedding = None;
                entry.embedding_model = None;
                false
            }
        }
    }
}

fn validate_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidQuery(format!("knowledge {} cannot be empty", field)));
    }
    Ok(())
}

fn validate_relevance(relevance_score: f32) -> Result<()> {
    if !relevance_score.is_finite() || relevance_score < 0.0 {
        return Err(Error::InvalidQuery(format!(
            "knowledge relevance must be a finite, non-negative number (got {})",
            relevance_score
        )));
    }
    Ok(())
}
