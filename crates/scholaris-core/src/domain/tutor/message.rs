//! Chat messages exchanged with the tutoring bot

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::llm::MessageRole;

use super::intent::Intent;

/// A knowledge entry cited by an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub knowledge_id: String,
    pub title: String,
    pub score: f32,
}

/// One message of a student's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub student_id: String,
    pub course_id: Option<String>,
    pub role: MessageRole,
    pub text: String,
    pub knowledge_sources: Vec<KnowledgeSource>,
    pub intent: Intent,
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        student_id: impl Into<String>,
        course_id: Option<String>,
        role: MessageRole,
        text: impl Into<String>,
        intent: Intent,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            course_id,
            role,
            text: text.into(),
            knowledge_sources: Vec::new(),
            intent,
            tokens_used: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<KnowledgeSource>) -> Self {
        self.knowledge_sources = sources;
        self
    }

    pub fn with_tokens_used(mut self, tokens_used: Option<u32>) -> Self {
        self.tokens_used = tokens_used;
        self
    }
}

/// Persistence for chat history
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<()>;

    /// The latest `limit` messages of a conversation, oldest first
    async fn history(
        &self,
        student_id: &str,
        course_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;
}
