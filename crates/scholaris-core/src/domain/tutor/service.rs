//! Tutor turn orchestration
//!
//! Wraps the generator with the bookkeeping around a turn: usage counters
//! for cited knowledge and the persisted chat history.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::outcome::Outcome;
use crate::error::{Error, Result};
use crate::llm::MessageRole;

use super::generator::{GenerationContext, ResponseGenerator};
use super::intent::Intent;
use super::message::{ChatMessage, ChatRepository, KnowledgeSource};

/// What the student sees after one turn
#[derive(Debug, Clone, Serialize)]
pub struct TutorReply {
    pub text: String,
    /// `ok`, `fallback` or `failed`
    pub outcome: &'static str,
    pub sources: Vec<KnowledgeSource>,
    pub tokens_used: Option<u32>,
    /// Stable error code when the turn failed
    pub error_code: Option<&'static str>,
    /// Persisted assistant message, when one was stored
    pub message_id: Option<String>,
}

pub struct TutorService {
    generator: ResponseGenerator,
    chats: Arc<dyn ChatRepository>,
}

impl TutorService {
    pub fn new(generator: ResponseGenerator, chats: Arc<dyn ChatRepository>) -> Self {
        Self { generator, chats }
    }

    /// Answer one student message and record the exchange
    ///
    /// Generation failures become an apology reply. Only storage failures
    /// are returned as errors.
    pub async fn ask(
        &self,
        student_id: &str,
        course_id: Option<&str>,
        intent: Intent,
        message: &str,
    ) -> Result<TutorReply> {
        let context = GenerationContext::new(student_id)
            .with_course(course_id.map(str::to_string))
            .with_intent(intent);

        let outcome = self.generator.generate(message, &context).await;
        let kind = outcome.kind();

        let reply = match outcome {
            Outcome::Ok(response) | Outcome::Fallback(response, _) => {
                self.record_question(&context, message).await?;

                let ids: Vec<String> = response
                    .knowledge_sources
                    .iter()
                    .map(|s| s.knowledge_id.clone())
                    .collect();
                self.generator.retriever().record_usage(&ids).await;

                let answer = ChatMessage::new(
                    student_id,
                    context.course_id.clone(),
                    MessageRole::Assistant,
                    response.text.clone(),
                    intent,
                )
                .with_sources(response.knowledge_sources.clone())
                .with_tokens_used(response.tokens_used);
                self.chats.append(&answer).await?;

                TutorReply {
                    text: response.text,
                    outcome: kind,
                    sources: response.knowledge_sources,
                    tokens_used: response.tokens_used,
                    error_code: None,
                    message_id: Some(answer.id),
                }
            }
            Outcome::Failed(e) => {
                let mut reply = TutorReply {
                    text: e.user_message().to_string(),
                    outcome: kind,
                    sources: Vec::new(),
                    tokens_used: None,
                    error_code: Some(e.code()),
                    message_id: None,
                };
                if !should_record(&e) {
                    return Ok(reply);
                }

                self.record_question(&context, message).await?;
                let apology = ChatMessage::new(
                    student_id,
                    context.course_id.clone(),
                    MessageRole::Assistant,
                    reply.text.clone(),
                    intent,
                );
                self.chats.append(&apology).await?;
                reply.message_id = Some(apology.id);
                reply
            }
        };

        debug!(student_id, outcome = reply.outcome, "Tutor turn recorded");
        Ok(reply)
    }

    async fn record_question(&self, context: &GenerationContext, message: &str) -> Result<()> {
        let question = ChatMessage::new(
            context.student_id.clone(),
            context.course_id.clone(),
            MessageRole::User,
            message.trim(),
            context.intent,
        );
        self.chats.append(&question).await
    }

    /// Latest messages of a conversation, oldest first
    pub async fn history(
        &self,
        student_id: &str,
        course_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        self.chats.history(student_id, course_id, limit).await
    }
}

/// Whether a failed turn belongs in the chat history
fn should_record(e: &Error) -> bool {
    match e {
        Error::InvalidQuery(_) | Error::StudentNotFound(_) | Error::CourseNotFound(_) => {
            warn!(error = %e, "Turn rejected, nothing recorded");
            false
        }
        _ => true,
    }
}
