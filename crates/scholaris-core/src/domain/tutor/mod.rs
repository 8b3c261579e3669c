//! Tutoring bot domain module
//!
//! - **Generator**: retrieval-augmented answers with model-family budgets
//! - **Prompt**: system instruction and user-turn composition
//! - **Service**: one turn end to end, including chat history
//!
//! ```rust,ignore
//! let generator = ResponseGenerator::new(retriever, assembler, client);
//! let outcome = generator
//!     .generate("How should I revise?", &GenerationContext::new("stu-1"))
//!     .await;
//! ```

mod generator;
mod intent;
mod message;
pub mod prompt;
mod service;

pub use generator::{
    GenerationContext, GenerationSettings, GenerationStage, ResponseGenerator, TutorResponse,
};
pub use intent::Intent;
pub use message::{ChatMessage, ChatRepository, KnowledgeSource};
pub use service::{TutorReply, TutorService};
