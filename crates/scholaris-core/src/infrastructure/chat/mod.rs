//! Chat infrastructure module
//!
//! Database repository for tutor conversations.

pub mod repository;

pub use repository::SqliteChatRepository;
