//! Provider fakes shared by unit tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::llm::{Completion, EmbeddingProvider, FinishReason, LanguageModelProvider};

const KEYWORD_DIMENSIONS: usize = 1024;

/// Deterministic bag-of-words embedder: every lowercase word is hashed
/// into one bucket, so texts sharing words score high
#[derive(Debug, Default)]
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; KEYWORD_DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % KEYWORD_DIMENSIONS;
            vector[bucket] += 1.0;
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    fn embedding_model(&self) -> &str {
        "keyword-hash"
    }
}

/// Embedder that always fails
#[derive(Debug)]
pub struct FailingEmbedder {
    unavailable: bool,
}

impl FailingEmbedder {
    /// Fails as if no API key were configured
    pub fn unavailable() -> Self {
        Self { unavailable: true }
    }

    /// Fails as if the API returned an error
    pub fn error() -> Self {
        Self { unavailable: false }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.unavailable {
            Err(Error::ProviderUnavailable("no API key configured".to_string()))
        } else {
            Err(Error::ProviderError("HTTP 500: upstream exploded".to_string()))
        }
    }

    fn embedding_model(&self) -> &str {
        "failing"
    }
}

/// Embedder that answers only after a delay
#[derive(Debug)]
pub struct SlowEmbedder {
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(KeywordEmbedder.vector_for(text))
    }

    fn embedding_model(&self) -> &str {
        "slow"
    }
}

/// What a [`ScriptedModel`] does when called
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String, FinishReason),
    Unavailable,
    Fail(String),
    Hang(Duration),
}

/// A prompt the scripted model received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: usize,
}

/// Language model fake that replays a fixed script and records prompts
#[derive(Debug)]
pub struct ScriptedModel {
    model: String,
    script: Script,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(model: impl Into<String>, script: Script) -> Self {
        Self {
            model: model.into(),
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Standard model answering `text` with a natural stop
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new("gpt-4o-mini", Script::Reply(text.into(), FinishReason::Stop))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModelProvider for ScriptedModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
    ) -> Result<Completion> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            max_tokens,
        });

        match &self.script {
            Script::Reply(text, finish_reason) => Ok(Completion {
                text: text.clone(),
                finish_reason: *finish_reason,
                tokens_used: Some(42),
                model: self.model.clone(),
            }),
            Script::Unavailable => Err(Error::ProviderUnavailable(
                "no API key configured".to_string(),
            )),
            Script::Fail(message) => Err(Error::ProviderError(message.clone())),
            Script::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Err(Error::ProviderError("hung call finished".to_string()))
            }
        }
    }

    fn chat_model(&self) -> &str {
        &self.model
    }
}
