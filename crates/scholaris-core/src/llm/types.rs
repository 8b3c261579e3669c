//! Wire types for OpenAI-compatible chat and embedding APIs

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions/context)
    System,
    /// User message (student input)
    User,
    /// Assistant message (model response)
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(MessageRole::System),
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message sent to the chat completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Model families that need different request shapes and output budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Regular chat models: visible output only
    Standard,
    /// Reasoning models: spend hidden reasoning tokens before emitting output
    Reasoning,
}

impl ModelFamily {
    /// Detect the family from a model identifier such as `openai/o3-mini`
    pub fn detect(model: &str) -> Self {
        let name = model
            .rsplit('/')
            .next()
            .unwrap_or(model)
            .to_ascii_lowercase();

        let reasoning_prefixes = ["o1", "o3", "o4", "gpt-5", "deepseek-r1"];
        let is_reasoning = reasoning_prefixes.iter().any(|prefix| {
            name == *prefix
                || name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(['-', ':', '.']))
        }) || name.contains("reasoner")
            || name.contains("thinking");

        if is_reasoning {
            ModelFamily::Reasoning
        } else {
            ModelFamily::Standard
        }
    }

    pub fn is_reasoning(&self) -> bool {
        matches!(self, ModelFamily::Reasoning)
    }
}

/// Request body for chat completions
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Sampling temperature (omitted for reasoning models)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output budget for standard models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Output budget for reasoning models, covering hidden reasoning tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<usize>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            max_completion_tokens: None,
        }
    }

    /// Apply temperature and output budget the way the model family expects
    pub fn with_budget(mut self, temperature: f32, max_tokens: usize) -> Self {
        match ModelFamily::detect(&self.model) {
            ModelFamily::Standard => {
                self.temperature = Some(temperature);
                self.max_tokens = Some(max_tokens);
            }
            ModelFamily::Reasoning => {
                self.max_completion_tokens = Some(max_tokens);
            }
        }
        self
    }
}

/// Token usage information from the API response
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default)]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

/// Reason for completion finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end of response)
    Stop,
    /// Max tokens reached
    Length,
    /// Tool/function calls requested
    ToolCalls,
    /// Content filtered by safety system
    ContentFilter,
    /// Unknown reason (catch-all)
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// Message in a completion choice; content is null when a reasoning
/// model spent its whole budget thinking
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub index: usize,
    pub message: ResponseMessage,
    pub finish_reason: Option<FinishReason>,
}

/// Response from the chat completions API
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

/// Provider-neutral completion result
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Visible generated text (may be empty)
    pub text: String,
    pub finish_reason: FinishReason,
    pub tokens_used: Option<u32>,
    pub model: String,
}

impl Completion {
    /// Build a completion from the first choice of an API response
    pub fn from_chat_response(response: ChatResponse) -> Option<Self> {
        let choice = response.choices.into_iter().next()?;

        Some(Self {
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or(FinishReason::Unknown),
            tokens_used: response.usage.map(|u| u.total_tokens),
            model: response.model,
        })
    }

    /// Whether the model hit its output ceiling
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }
}

/// Request body for embeddings
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Response from the embeddings API
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    pub model: String,
}

/// Serialize an embedding vector to little-endian bytes for storage
pub fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding vector from little-endian bytes
pub fn embedding_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_family_detection() {
        assert_eq!(ModelFamily::detect("gpt-4o-mini"), ModelFamily::Standard);
        assert_eq!(ModelFamily::detect("o3-mini"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("openai/o1"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("gpt-5-mini"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("deepseek/deepseek-r1:free"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("deepseek-reasoner"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("claude-3-5-haiku"), ModelFamily::Standard);
        // "o1" must be a whole family token, not any prefix
        assert_eq!(ModelFamily::detect("o1x-chat"), ModelFamily::Standard);
    }

    #[test]
    fn test_budget_for_standard_model() {
        let request = ChatRequest::new("gpt-4o-mini", vec![]).with_budget(0.5, 1024);
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.max_tokens, Some(1024));
        assert_eq!(request.max_completion_tokens, None);
    }

    #[test]
    fn test_budget_for_reasoning_model() {
        let request = ChatRequest::new("o3-mini", vec![]).with_budget(0.5, 8192);
        assert_eq!(request.temperature, None);
        assert_eq!(request.max_tokens, None);
        assert_eq!(request.max_completion_tokens, Some(8192));

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"max_completion_tokens\":8192"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_chat_response_with_null_content() {
        let json = r#"{
            "id": "chatcmpl-1",
            "model": "o3-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": null },
                "finish_reason": "length"
            }],
            "usage": {
                "prompt_tokens": 120,
                "completion_tokens": 8192,
                "total_tokens": 8312,
                "completion_tokens_details": { "reasoning_tokens": 8192 }
            }
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let completion = Completion::from_chat_response(response).unwrap();
        assert_eq!(completion.text, "");
        assert!(completion.is_truncated());
        assert_eq!(completion.tokens_used, Some(8312));
    }

    #[test]
    fn test_completion_without_choices() {
        let response = ChatResponse {
            id: "x".to_string(),
            model: "m".to_string(),
            choices: vec![],
            usage: None,
        };
        assert!(Completion::from_chat_response(response).is_none());
    }

    #[test]
    fn test_unknown_finish_reason() {
        let json = r#"{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "eos"}"#;
        let choice: Choice = serde_json::from_str(json).unwrap();
        assert_eq!(choice.finish_reason, Some(FinishReason::Unknown));
    }

    #[test]
    fn test_embedding_request_dimensions() {
        let request = EmbeddingRequest::new("text-embedding-3-small", "hello");
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("dimensions"));

        let request = request.with_dimensions(Some(256));
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"dimensions\":256"));
    }

    #[test]
    fn test_embedding_bytes() {
        let vector = vec![1.0, -2.5, 3.25, 0.0];
        let bytes = embedding_to_bytes(&vector);
        assert_eq!(bytes.len(), 16);
        assert_eq!(embedding_from_bytes(&bytes).unwrap(), vector);
        assert!(embedding_from_bytes(&bytes[..3]).is_none());
    }

    #[test]
    fn test_message_role_parse() {
        assert_eq!(MessageRole::parse("assistant"), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("tool"), None);
        assert_eq!(MessageRole::User.to_string(), "user");
    }
}
