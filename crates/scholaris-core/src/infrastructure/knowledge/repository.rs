//! SQLite implementation of the KnowledgeStore
//!
//! Embeddings are stored as little-endian f32 BLOBs, tags as a JSON array
//! and timestamps as fixed-width RFC 3339 strings so they sort as text.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::domain::knowledge::{
    KnowledgeCategory, KnowledgeEntry, KnowledgeFilter, KnowledgeOrder, KnowledgeStore,
};
use crate::error::{Error, Result};
use crate::llm::{embedding_from_bytes, embedding_to_bytes};

const SELECT_COLUMNS: &str = "SELECT id, title, content, category, course_id, tags, embedding, \
     embedding_model, relevance_score, usage_count, last_used, is_active, created_at, updated_at \
     FROM knowledge_entries";

/// SQLite-backed knowledge base
#[derive(Clone)]
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
}

impl SqliteKnowledgeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn find(
        &self,
        filter: &KnowledgeFilter,
        order: KnowledgeOrder,
    ) -> Result<Vec<KnowledgeEntry>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        query.push(" WHERE 1 = 1");

        if !filter.include_inactive {
            query.push(" AND is_active = 1");
        }
        if let Some(course_id) = &filter.course_id {
            query
                .push(" AND (course_id IS NULL OR course_id = ")
                .push_bind(course_id.clone())
                .push(")");
        }
        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category.as_str());
        }
        if filter.embedded_only {
            query.push(" AND embedding IS NOT NULL AND length(embedding) > 0");
        }
        if filter.missing_embedding_only {
            query.push(" AND (embedding IS NULL OR length(embedding) = 0)");
        }

        query.push(match order {
            KnowledgeOrder::RecentlyUpdated => " ORDER BY updated_at DESC, id",
            KnowledgeOrder::MostUsed => " ORDER BY usage_count DESC, created_at DESC, id",
        });
        query
            .push(" LIMIT ")
            .push_bind(i64::try_from(filter.limit).unwrap_or(i64::MAX));

        let rows = query
            .build_query_as::<KnowledgeRow>()
            .fetch_all(&self.pool)
            .await?;
        debug!(rows = rows.len(), ?order, "Knowledge entries fetched");

        rows.into_iter().map(KnowledgeRow::into_entry).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let row: Option<KnowledgeRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(KnowledgeRow::into_entry).transpose()
    }

    async fn save(&self, entry: &KnowledgeEntry) -> Result<()> {
        let tags_json = serde_json::to_string(&entry.tags)?;
        let embedding = entry
            .embedding
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(embedding_to_bytes);

        sqlx::query(
            r#"
            INSERT INTO knowledge_entries (
                id, title, content, category, course_id, tags, embedding, embedding_model,
                relevance_score, usage_count, last_used, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                category = excluded.category,
                course_id = excluded.course_id,
                tags = excluded.tags,
                embedding = excluded.embedding,
                embedding_model = excluded.embedding_model,
                relevance_score = excluded.relevance_score,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(entry.category.as_str())
        .bind(&entry.course_id)
        .bind(&tags_json)
        .bind(embedding)
        .bind(&entry.embedding_model)
        .bind(f64::from(entry.relevance_score))
        .bind(i64::try_from(entry.usage_count).unwrap_or(i64::MAX))
        .bind(entry.last_used.map(timestamp))
        .bind(entry.is_active)
        .bind(timestamp(entry.created_at))
        .bind(timestamp(entry.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(knowledge_id = %entry.id, title = %entry.title, "Knowledge entry saved");
        Ok(())
    }

    async fn increment_usage(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE knowledge_entries SET usage_count = usage_count + 1, last_used = ? WHERE id = ?",
        )
        .bind(timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM knowledge_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid timestamp '{}': {}", value, e)))
}

#[derive(Debug, FromRow)]
struct KnowledgeRow {
    id: String,
    title: String,
    content: String,
    category: String,
    course_id: Option<String>,
    tags: String,
    embedding: Option<Vec<u8>>,
    embedding_model: Option<String>,
    relevance_score: f64,
    usage_count: i64,
    last_used: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl KnowledgeRow {
    fn into_entry(self) -> Result<KnowledgeEntry> {
        let category = KnowledgeCategory::parse(&self.category)
            .ok_or_else(|| Error::Other(format!("Invalid knowledge category: {}", self.category)))?;

        let embedding = match self.embedding.as_deref() {
            Some(bytes) if !bytes.is_empty() => Some(embedding_from_bytes(bytes).ok_or_else(
                || Error::Other(format!("Corrupt embedding for knowledge entry {}", self.id)),
            )?),
            _ => None,
        };

        Ok(KnowledgeEntry {
            category,
            tags: serde_json::from_str(&self.tags)?,
            embedding,
            embedding_model: self.embedding_model,
            relevance_score: self.relevance_score as f32,
            usage_count: self.usage_count.max(0) as u64,
            last_used: self.last_used.as_deref().map(parse_timestamp).transpose()?,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            title: self.title,
            content: self.content,
            course_id: self.course_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn setup() -> SqliteKnowledgeStore {
        let db = Database::in_memory().await.expect("Failed to create database");
        SqliteKnowledgeStore::new(db.pool().clone())
    }

    fn entry(title: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(title, format!("{} body", title), KnowledgeCategory::StudyGuide)
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let store = setup().await;
        let original = entry("Midterm Tips")
            .with_course("math")
            .with_tags(["exam", "midterm"])
            .with_embedding(vec![0.25, -1.5, 3.0], "text-embedding-3-small")
            .with_relevance_score(1.5);
        store.save(&original).await.unwrap();

        let loaded = store.get(&original.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Midterm Tips");
        assert_eq!(loaded.course_id.as_deref(), Some("math"));
        assert_eq!(loaded.tags, original.tags);
        assert_eq!(loaded.embedding, Some(vec![0.25, -1.5, 3.0]));
        assert_eq!(loaded.relevance_score, 1.5);
        assert!(loaded.is_active);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_updates_existing_entry() {
        let store = setup().await;
        let mut e = entry("Draft");
        store.save(&e).await.unwrap();

        e.title = "Final".to_string();
        e.is_active = false;
        store.save(&e).await.unwrap();

        let loaded = store.get(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Final");
        assert!(!loaded.is_active);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_applies_scope_and_flags() {
        let store = setup().await;
        store.save(&entry("Global").with_embedding(vec![1.0], "m")).await.unwrap();
        store.save(&entry("Mine").with_course("x")).await.unwrap();
        store.save(&entry("Theirs").with_course("y")).await.unwrap();
        store.save(&entry("Retired").inactive()).await.unwrap();

        let scoped = store
            .find(
                &KnowledgeFilter::new(10).with_course(Some("x".into())),
                KnowledgeOrder::RecentlyUpdated,
            )
            .await
            .unwrap();
        let mut titles: Vec<&str> = scoped.iter().map(|e| e.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Global", "Mine"]);

        let embedded = store
            .find(&KnowledgeFilter::new(10).embedded_only(), KnowledgeOrder::RecentlyUpdated)
            .await
            .unwrap();
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].title, "Global");

        let missing = store
            .find(
                &KnowledgeFilter::new(10).missing_embedding().including_inactive(),
                KnowledgeOrder::RecentlyUpdated,
            )
            .await
            .unwrap();
        let mut titles: Vec<&str> = missing.iter().map(|e| e.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Mine", "Retired", "Theirs"]);

        let all = store
            .find(&KnowledgeFilter::new(10).including_inactive(), KnowledgeOrder::RecentlyUpdated)
            .await
            .unwrap();
        assert_eq!(all.len(), 4);

        let limited = store
            .find(&KnowledgeFilter::new(2).including_inactive(), KnowledgeOrder::RecentlyUpdated)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_most_used_order_and_increment() {
        let store = setup().await;
        let a = entry("A");
        let b = entry("B");
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        assert!(store.increment_usage(&b.id).await.unwrap());
        assert!(store.increment_usage(&b.id).await.unwrap());
        assert!(!store.increment_usage("missing").await.unwrap());

        let ranked = store
            .find(&KnowledgeFilter::new(10), KnowledgeOrder::MostUsed)
            .await
            .unwrap();
        assert_eq!(ranked[0].title, "B");
        assert_eq!(ranked[0].usage_count, 2);
        assert!(ranked[0].last_used.is_some());
    }

    #[tokio::test]
    async fn test_increment_does_not_clobber_on_save() {
        let store = setup().await;
        let e = entry("Counted");
        store.save(&e).await.unwrap();
        store.increment_usage(&e.id).await.unwrap();

        // A stale copy saved later keeps the stored counter
        store.save(&e).await.unwrap();
        let loaded = store.get(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded.usage_count, 1);
    }
}
