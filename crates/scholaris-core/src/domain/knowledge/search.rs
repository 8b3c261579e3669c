//! Semantic knowledge retrieval
//!
//! Ranks knowledge entries against a query embedding. When the query cannot
//! be embedded, or no candidate carries an embedding, the retriever falls
//! back to the most-used entries so the tutor never loses its context to an
//! embedding outage.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::outcome::{FallbackReason, Outcome};
use crate::error::{Error, Result};
use crate::llm::EmbeddingProvider;

use super::entry::{
    KnowledgeEntry, KnowledgeFilter, RetrievalResult, RetrievalScope, RetrievalStrategy,
    RetrievedKnowledge,
};
use super::repository::{KnowledgeOrder, KnowledgeStore};
use super::similarity::cosine_similarity;

/// Upper bound on entries scored per query.
///
/// Ranking is exact only for knowledge bases up to this size.
pub const CANDIDATE_CAP: usize = 100;

/// Score given to every entry returned by the fallback ranking
pub const FALLBACK_SCORE: f32 = 0.5;

/// Default deadline for embedding a query
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 15;

/// Retrieves the knowledge most relevant to a query
pub struct KnowledgeRetriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_timeout: Duration,
}

impl KnowledgeRetriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            embedding_timeout: Duration::from_secs(DEFAULT_EMBEDDING_TIMEOUT_SECS),
        }
    }

    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout = timeout;
        self
    }

    /// Retrieve up to `limit` entries for `query` within `scope`
    ///
    /// `Outcome::Ok` carries a semantic ranking, `Outcome::Fallback` the
    /// usage/recency ranking. Store failures and empty queries are errors.
    pub async fn retrieve(
        &self,
        query: &str,
        scope: &RetrievalScope,
        limit: usize,
    ) -> Result<Outcome<RetrievalResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        }
        if limit == 0 {
            return Ok(Outcome::Ok(RetrievalResult::empty(RetrievalStrategy::Semantic)));
        }

        let query_embedding = match self.embed_query(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, code = e.code(), "Query embedding failed, using fallback ranking");
                return self
                    .fallback(scope, limit, FallbackReason::EmbeddingUnavailable(e.to_string()))
                    .await;
            }
        };

        let filter = KnowledgeFilter::new(CANDIDATE_CAP)
            .with_course(scope.course_id.clone())
            .with_category(scope.category)
            .embedded_only();
        let candidates = self
            .store
            .find(&filter, KnowledgeOrder::RecentlyUpdated)
            .await?;

        let items = rank_candidates(&query_embedding, &candidates, limit);
        if items.is_empty() {
            debug!(candidates = candidates.len(), "No embedded candidates, using fallback ranking");
            return self
                .fallback(scope, limit, FallbackReason::NoEmbeddedCandidates)
                .await;
        }

        debug!(
            candidates = candidates.len(),
            results = items.len(),
            top_score = items.first().map(|i| i.score),
            "Semantic retrieval completed"
        );

        Ok(Outcome::Ok(RetrievalResult {
            strategy: RetrievalStrategy::Semantic,
            items,
        }))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedding = tokio::time::timeout(self.embedding_timeout, self.embedder.embed(query))
            .await
            .map_err(|_| Error::ProviderTimeout(self.embedding_timeout.as_secs()))??;

        if embedding.is_empty() {
            return Err(Error::ProviderError("Zero-length query embedding".to_string()));
        }
        Ok(embedding)
    }

    /// Most-used, then most-recent matching entries with a neutral score
    async fn fallback(
        &self,
        scope: &RetrievalScope,
        limit: usize,
        reason: FallbackReason,
    ) -> Result<Outcome<RetrievalResult>> {
        let filter = KnowledgeFilter::new(limit)
            .with_course(scope.course_id.clone())
            .with_category(scope.category);
        let entries = self.store.find(&filter, KnowledgeOrder::MostUsed).await?;

        let items: Vec<RetrievedKnowledge> = entries
            .iter()
            .take(limit)
            .map(|entry| RetrievedKnowledge::from_entry(entry, FALLBACK_SCORE))
            .collect();

        debug!(results = items.len(), reason = %reason, "Fallback retrieval completed");

        Ok(Outcome::Fallback(
            RetrievalResult {
                strategy: RetrievalStrategy::Recency,
                items,
            },
            reason,
        ))
    }

    /// Record that entries were used in a generated response
    ///
    /// Only call this for entries that actually went into a reply. The
    /// counter is approximate: failures are logged, never propagated.
    /// Returns how many entries were updated.
    pub async fn record_usage(&self, knowledge_ids: &[String]) -> usize {
        let mut seen = HashSet::new();
        let mut updated = 0;

        for id in knowledge_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.store.increment_usage(id).await {
                Ok(true) => updated += 1,
                Ok(false) => warn!(knowledge_id = %id, "Usage recorded for unknown entry"),
                Err(e) => warn!(knowledge_id = %id, error = %e, "Failed to record knowledge usage"),
            }
        }

        if updated > 0 {
            info!(entries = updated, "Knowledge usage recorded");
        }
        updated
    }
}

/// Score candidates against the query and keep the best `limit`
///
/// Entries without an embedding are skipped. Score is cosine similarity
/// times the entry's relevance multiplier.
pub fn rank_candidates(
    query_embedding: &[f32],
    candidates: &[KnowledgeEntry],
    limit: usize,
) -> Vec<RetrievedKnowledge> {
    let mut scored: Vec<RetrievedKnowledge> = candidates
        .iter()
        .filter_map(|entry| {
            let embedding = entry.embedding.as_deref().filter(|e| !e.is_empty())?;
            let score = cosine_similarity(query_embedding, embedding) * entry.relevance_score;
            let score = if score.is_finite() { score } else { 0.0 };
            Some(RetrievedKnowledge::from_entry(entry, score))
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}
