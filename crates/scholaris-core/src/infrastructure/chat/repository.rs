//! Chat history repository
//!
//! Stores tutor conversations keyed by student and optional course.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::tutor::{ChatMessage, ChatRepository, Intent};
use crate::error::{Error, Result};
use crate::llm::MessageRole;

/// SQLite-backed chat history
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: SqliteRow) -> Result<ChatMessage> {
        let role: String = row.get("role");
        let intent: String = row.get("intent");
        let sources: String = row.get("knowledge_sources");
        let created_at: String = row.get("created_at");
        let tokens_used: Option<i64> = row.get("tokens_used");

        Ok(ChatMessage {
            id: row.get("id"),
            student_id: row.get("student_id"),
            course_id: row.get("course_id"),
            role: MessageRole::parse(&role)
                .ok_or_else(|| Error::Other(format!("Invalid message role: {}", role)))?,
            text: row.get("content"),
            knowledge_sources: serde_json::from_str(&sources)?,
            intent: Intent::parse(&intent).unwrap_or_default(),
            tokens_used: tokens_used.and_then(|t| u32::try_from(t).ok()),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::Other(format!("Invalid timestamp '{}': {}", created_at, e)))?,
        })
    }
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (
                id, student_id, course_id, role, content, knowledge_sources, intent, tokens_used, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.student_id)
        .bind(&message.course_id)
        .bind(message.role.as_str())
        .bind(&message.text)
        .bind(serde_json::to_string(&message.knowledge_sources)?)
        .bind(message.intent.as_str())
        .bind(message.tokens_used.map(i64::from))
        .bind(message.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(
        &self,
        student_id: &str,
        course_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, course_id, role, content, knowledge_sources, intent, tokens_used, created_at
            FROM chat_messages
            WHERE student_id = ? AND course_id IS ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }
}
