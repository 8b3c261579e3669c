//! OpenAI-compatible HTTP client
//!
//! Provides async chat completions and embeddings against any endpoint that
//! speaks the OpenAI wire format (OpenAI, OpenRouter, local servers).
//! There is no automatic retry: a failed call ends the request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::provider::{EmbeddingProvider, LanguageModelProvider};
use super::types::{
    ChatRequest, ChatResponse, Completion, EmbeddingRequest, EmbeddingResponse, Message,
};

/// Client for chat completions and embeddings
///
/// Cheap to clone; safe to share between concurrent requests.
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    embedding: EmbeddingConfig,
    /// `None` means every call fails with `ProviderUnavailable`
    api_key: Option<String>,
    base_url: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .field("embedding_model", &self.embedding.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    embedding: Option<EmbeddingConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the API key if one is available
    pub fn maybe_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Override the base URL from configuration
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let embedding = self.embedding.unwrap_or_default();
        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| config.base_url.clone())
            .trim_end_matches('/')
            .to_string();

        Ok(LlmClient {
            http_client,
            config,
            embedding,
            api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            base_url,
            timeout_secs,
        })
    }
}

impl LlmClient {
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Build a client from loaded configuration, reading the key from the environment
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let api_key = config
            .llm
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        LlmClientBuilder::new()
            .config(config.llm.clone())
            .embedding(config.embedding.clone())
            .maybe_api_key(api_key)
            .build()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::ProviderUnavailable("no API key configured".to_string()))
    }

    /// Map a transport failure onto the provider error taxonomy
    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout(self.timeout_secs)
        } else if e.is_connect() {
            Error::ProviderUnavailable(format!("cannot reach {}: {}", self.base_url, e))
        } else {
            Error::ProviderError(e.to_string())
        }
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let api_key = self.require_api_key()?;
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        Ok(response)
    }

    /// Make a chat completion request
    pub async fn chat(&self, messages: Vec<Message>, max_tokens: usize) -> Result<Completion> {
        let request = ChatRequest::new(&self.config.model, messages)
            .with_budget(self.config.temperature, max_tokens);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            max_tokens,
            "Sending chat completion request"
        );

        let response = self.post("chat/completions", &request).await?;
        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderError(format!("Failed to parse response: {}", e)))?;

        Completion::from_chat_response(chat_response)
            .ok_or_else(|| Error::ProviderError("Response contained no choices".to_string()))
    }

    /// Generate an embedding for a single text
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest::new(&self.embedding.model, text)
            .with_dimensions(self.embedding.dimensions);

        debug!(model = %request.model, chars = text.len(), "Sending embedding request");

        let response = self.post("embeddings", &request).await?;
        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderError(format!("Failed to parse embedding: {}", e)))?;

        let mut data = embedding_response.data;
        data.sort_by_key(|d| d.index);
        let vector = data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::ProviderError("Empty embedding response".to_string()))?;

        if vector.is_empty() {
            warn!(model = %embedding_response.model, "Provider returned a zero-length embedding");
            return Err(Error::ProviderError("Zero-length embedding".to_string()));
        }

        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text).await
    }

    fn embedding_model(&self) -> &str {
        &self.embedding.model
    }
}

#[async_trait]
impl LanguageModelProvider for LlmClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
    ) -> Result<Completion> {
        let messages = vec![Message::system(system_prompt), Message::user(user_prompt)];
        self.chat(messages, max_tokens).await
    }

    fn chat_model(&self) -> &str {
        &self.config.model
    }
}

/// Translate an unsuccessful HTTP status into a provider error
fn error_for_status(status: reqwest::StatusCode, body: &str) -> Error {
    let detail = extract_error_message(body).unwrap_or_else(|| body.to_string());

    match status.as_u16() {
        401 | 403 => Error::ProviderUnavailable(format!("credential rejected ({}): {}", status, detail)),
        404 => Error::ProviderError(format!("Model or endpoint not found: {}", detail)),
        408 | 504 => Error::ProviderError(format!("Upstream timeout ({}): {}", status, detail)),
        429 => Error::ProviderError(format!("Rate limited: {}", detail)),
        500..=599 => Error::ProviderError(format!("Server error ({}): {}", status, detail)),
        _ => Error::ProviderError(format!("HTTP error {}: {}", status, detail)),
    }
}

/// Pull `error.message` out of an OpenAI-style error body
fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            api_key: None,
            base_url: "https://example.com/v1/".to_string(),
            model: "test/model".to_string(),
            temperature: 0.3,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_client_builder() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("test-key")
            .timeout_secs(10)
            .build()
            .unwrap();

        assert_eq!(client.chat_model(), "test/model");
        assert_eq!(client.base_url(), "https://example.com/v1");
        assert!(client.has_api_key());
    }

    #[test]
    fn test_blank_api_key_is_treated_as_missing() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("   ")
            .build()
            .unwrap();
        assert!(!client.has_api_key());
    }

    #[tokio::test]
    async fn test_missing_key_is_provider_unavailable() {
        let client = LlmClient::builder().config(test_config()).build().unwrap();

        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));

        let err = client.complete("system", "user", 100).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("sk-very-secret")
            .build()
            .unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("LlmClient"));
        assert!(!debug.contains("sk-very-secret"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_error_for_status() {
        let body = r#"{"error": {"message": "Incorrect API key provided"}}"#;
        let err = error_for_status(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, Error::ProviderUnavailable(_)));
        assert!(err.to_string().contains("Incorrect API key"));

        let err = error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, Error::ProviderError(_)));
        assert!(err.to_string().contains("slow down"));

        let err = error_for_status(reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(err.to_string().contains("Server error"));
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error": {"message": "bad model"}}"#),
            Some("bad model".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"error": "plain"}"#),
            Some("plain".to_string())
        );
        assert_eq!(extract_error_message("not json"), None);
    }
}
