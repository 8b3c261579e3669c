//! Domain layer
//!
//! Contains the core business logic and domain models.

pub mod campaign;
pub mod knowledge;
pub mod outcome;
pub mod student;
pub mod tutor;

pub use outcome::{FallbackReason, Outcome};
