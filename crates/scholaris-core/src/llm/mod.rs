//! Language model and embedding integration
//!
//! This module provides:
//! - Provider traits consumed by retrieval and tutoring
//! - An OpenAI-compatible HTTP client implementing both traits
//! - Request/response wire types and model-family budgeting

mod client;
mod provider;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use provider::{EmbeddingProvider, LanguageModelProvider};
pub use types::{
    ChatRequest, ChatResponse, Choice, Completion, EmbeddingRequest, EmbeddingResponse,
    FinishReason, Message, MessageRole, ModelFamily, Usage, embedding_from_bytes,
    embedding_to_bytes,
};
