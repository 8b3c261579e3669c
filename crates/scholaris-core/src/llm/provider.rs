//! Provider traits for embeddings and text generation
//!
//! The retrieval and tutoring components only see these traits, so tests
//! and alternative backends can stand in for the HTTP client.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{Completion, ModelFamily};

/// Turns text into a fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    ///
    /// Fails with `ProviderUnavailable` when no credential is configured and
    /// `ProviderError`/`ProviderTimeout` on transport or API failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the embedding model, stored next to each vector
    fn embedding_model(&self) -> &str;
}

/// Generates text from a system instruction and a user turn
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
    ) -> Result<Completion>;

    /// Identifier of the chat model
    fn chat_model(&self) -> &str;

    fn model_family(&self) -> ModelFamily {
        ModelFamily::detect(self.chat_model())
    }
}
