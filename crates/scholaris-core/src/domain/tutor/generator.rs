//! Retrieval-augmented response generation
//!
//! One turn runs through a fixed sequence of stages:
//!
//! ```text
//! Pending -> Retrieving -> Composing -> Invoking -> Succeeded
//!                 \             \            \
//!                  +-------------+------------+-> FailedSoft
//! ```
//!
//! `Retrieving` covers the knowledge retriever and the context assembler,
//! which run concurrently. There are no retries; a failed turn ends in
//! `FailedSoft` and the caller shows [`Error::user_message`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::TutorConfig;
use crate::domain::knowledge::{
    KnowledgeRetriever, RetrievalResult, RetrievalScope, RetrievalStrategy,
};
use crate::domain::outcome::Outcome;
use crate::domain::student::StudentContextAssembler;
use crate::error::Error;
use crate::llm::{LanguageModelProvider, ModelFamily};

use super::intent::Intent;
use super::message::KnowledgeSource;
use super::prompt;

/// Stage of a generation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Pending,
    /// Knowledge retrieval and context assembly, in parallel
    Retrieving,
    Composing,
    Invoking,
    Succeeded,
    FailedSoft,
}

impl GenerationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedSoft)
    }

    pub fn can_advance_to(&self, next: GenerationStage) -> bool {
        use GenerationStage::*;
        match (self, next) {
            (Pending, Retrieving) => true,
            (Retrieving, Composing) => true,
            (Composing, Invoking) => true,
            (Invoking, Succeeded) => true,
            (from, FailedSoft) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks the stage of one turn and logs every transition
#[derive(Debug)]
struct StageTracker {
    stage: GenerationStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: GenerationStage::Pending,
        }
    }

    fn advance(&mut self, next: GenerationStage) {
        if !self.stage.can_advance_to(next) {
            warn!(from = ?self.stage, to = ?next, "Unexpected generation stage transition");
        }
        debug!(from = ?self.stage, to = ?next, "Generation stage");
        self.stage = next;
    }
}

/// Who is asking and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub student_id: String,
    pub course_id: Option<String>,
    pub intent: Intent,
}

impl GenerationContext {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            course_id: None,
            intent: Intent::General,
        }
    }

    pub fn with_course(mut self, course_id: Option<String>) -> Self {
        self.course_id = course_id;
        self
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }
}

/// A validated tutor answer and its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorResponse {
    pub text: String,
    pub knowledge_sources: Vec<KnowledgeSource>,
    pub tokens_used: Option<u32>,
    pub model: String,
    pub retrieval: RetrievalStrategy,
}

/// Budgets and deadlines for generation
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_output_tokens: usize,
    pub reasoning_max_output_tokens: usize,
    pub request_timeout: Duration,
    pub knowledge_limit: usize,
    pub language: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&TutorConfig::default())
    }
}

impl GenerationSettings {
    pub fn from_config(config: &TutorConfig) -> Self {
        Self {
            max_output_tokens: config.max_output_tokens,
            reasoning_max_output_tokens: config.reasoning_max_output_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            knowledge_limit: config.knowledge_limit,
            language: config.language.clone(),
        }
    }

    /// Output budget for a model family
    pub fn budget_for(&self, family: ModelFamily) -> usize {
        match family {
            ModelFamily::Standard => self.max_output_tokens,
            ModelFamily::Reasoning => self.reasoning_max_output_tokens,
        }
    }
}

/// Generates tutor answers grounded in knowledge and student context
pub struct ResponseGenerator {
    retriever: Arc<KnowledgeRetriever>,
    assembler: Arc<StudentContextAssembler>,
    model: Arc<dyn LanguageModelProvider>,
    settings: GenerationSettings,
}

impl ResponseGenerator {
    pub fn new(
        retriever: Arc<KnowledgeRetriever>,
        assembler: Arc<StudentContextAssembler>,
        model: Arc<dyn LanguageModelProvider>,
    ) -> Self {
        Self {
            retriever,
            assembler,
            model,
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn retriever(&self) -> &KnowledgeRetriever {
        &self.retriever
    }

    /// Produce an answer to `message`
    ///
    /// `Outcome::Fallback` means the answer is grounded in the usage-ranked
    /// knowledge because semantic retrieval was unavailable.
    pub async fn generate(&self, message: &str, context: &GenerationContext) -> Outcome<TutorResponse> {
        let mut tracker = StageTracker::new();

        let message = message.trim();
        if message.is_empty() {
            return fail(&mut tracker, Error::InvalidQuery("message is empty".to_string()));
        }

        tracker.advance(GenerationStage::Retrieving);
        let scope = RetrievalScope {
            course_id: context.course_id.clone(),
            category: None,
        };
        let (knowledge, student) = tokio::join!(
            self.retriever
                .retrieve(message, &scope, self.settings.knowledge_limit),
            self.assembler
                .assemble(&context.student_id, context.course_id.as_deref()),
        );

        let student = match student {
            Ok(student) => student,
            Err(e) => return fail(&mut tracker, e),
        };
        let (knowledge, fallback): (RetrievalResult, _) = match knowledge {
            Ok(Outcome::Ok(result)) => (result, None),
            Ok(Outcome::Fallback(result, reason)) => (result, Some(reason)),
            Ok(Outcome::Failed(e)) | Err(e) => return fail(&mut tracker, e),
        };

        tracker.advance(GenerationStage::Composing);
        let system_prompt = prompt::system_prompt(context.intent, &self.settings.language);
        let user_prompt = prompt::user_prompt(&student, &knowledge.items, message);

        tracker.advance(GenerationStage::Invoking);
        let family = self.model.model_family();
        let budget = self.settings.budget_for(family);
        debug!(
            model = self.model.chat_model(),
            ?family,
            budget,
            knowledge = knowledge.len(),
            prompt_len = user_prompt.len(),
            "Invoking language model"
        );

        let completion = match tokio::time::timeout(
            self.settings.request_timeout,
            self.model.complete(&system_prompt, &user_prompt, budget),
        )
        .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => return fail(&mut tracker, e),
            Err(_) => {
                return fail(
                    &mut tracker,
                    Error::ProviderTimeout(self.settings.request_timeout.as_secs()),
                );
            }
        };

        let text = completion.text.trim();
        if text.is_empty() {
            let e = if completion.is_truncated() {
                Error::TruncatedEmptyResponse { max_tokens: budget }
            } else {
                Error::ProviderError(format!(
                    "model returned no text (finish reason: {})",
                    completion.finish_reason
                ))
            };
            return fail(&mut tracker, e);
        }

        tracker.advance(GenerationStage::Succeeded);
        let response = TutorResponse {
            text: text.to_string(),
            knowledge_sources: knowledge
                .items
                .iter()
                .map(|item| KnowledgeSource {
                    knowledge_id: item.knowledge_id.clone(),
                    title: item.title.clone(),
                    score: item.score,
                })
                .collect(),
            tokens_used: completion.tokens_used,
            model: completion.model,
            retrieval: knowledge.strategy,
        };

        info!(
            student_id = %context.student_id,
            intent = %context.intent,
            sources = response.knowledge_sources.len(),
            tokens_used = response.tokens_used,
            fallback = fallback.is_some(),
            "Tutor response generated"
        );

        match fallback {
            Some(reason) => Outcome::Fallback(response, reason),
            None => Outcome::Ok(response),
        }
    }
}

fn fail<T>(tracker: &mut StageTracker, e: Error) -> Outcome<T> {
    let stage = tracker.stage;
    tracker.advance(GenerationStage::FailedSoft);
    if e.is_provider_failure() {
        error!(error = %e, code = e.code(), ?stage, "Tutor generation failed");
    } else {
        warn!(error = %e, code = e.code(), ?stage, "Tutor generation rejected");
    }
    Outcome::Failed(e)
}
