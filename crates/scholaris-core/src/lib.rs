//! Scholaris Core Library
//!
//! This crate provides the tutoring engine behind the Scholaris education CRM:
//! - Knowledge base with embedding-based retrieval and a most-used, most-recent fallback
//! - Student context assembly from enrollments and grades
//! - Response generation through an OpenAI-compatible language model
//! - Campaign popup targeting
//! - Storage (SQLite) and configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::campaign::{PopupService, Visitor, is_eligible};
    pub use crate::domain::knowledge::{KnowledgeIndexer, KnowledgeRetriever};
    pub use crate::domain::student::StudentContextAssembler;
    pub use crate::domain::tutor::{GenerationContext, ResponseGenerator, TutorService};
    pub use crate::domain::{FallbackReason, Outcome};
    pub use crate::error::{Error, Result};
}
