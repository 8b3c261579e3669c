//! Knowledge base persistence backed by SQLite

mod repository;

pub use repository::SqliteKnowledgeStore;
