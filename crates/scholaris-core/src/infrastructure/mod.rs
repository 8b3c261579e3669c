//! Infrastructure layer
//!
//! Concrete stores behind the domain traits: SQLite for the knowledge base
//! and chat history, memory for the host application's records.

pub mod chat;
pub mod knowledge;
pub mod memory;

pub use chat::SqliteChatRepository;
pub use knowledge::SqliteKnowledgeStore;
pub use memory::{Dataset, InMemoryStore};
