//! Tagged results for best-effort operations
//!
//! Retrieval and generation can succeed fully, succeed on a degraded path,
//! or fail. Callers match on [`Outcome`] instead of null-checking.

use serde::Serialize;

use crate::error::Error;

/// Why a result came from a degraded path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The query could not be embedded (provider unavailable, error or timeout)
    EmbeddingUnavailable(String),
    /// No candidate entry carried an embedding
    NoEmbeddedCandidates,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::EmbeddingUnavailable(detail) => {
                write!(f, "embedding unavailable: {}", detail)
            }
            FallbackReason::NoEmbeddedCandidates => write!(f, "no candidate had an embedding"),
        }
    }
}

/// Result of a best-effort operation
#[derive(Debug)]
pub enum Outcome<T> {
    /// Full-quality result
    Ok(T),
    /// Usable result produced by a fallback path
    Fallback(T, FallbackReason),
    /// No usable result
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback(..))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Borrow the value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Ok(value) | Outcome::Fallback(value, _) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// Take the value, turning a failure into an error
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Outcome::Ok(value) | Outcome::Fallback(value, _) => Ok(value),
            Outcome::Failed(error) => Err(error),
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Outcome::Fallback(_, reason) => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Fallback(value, reason) => Outcome::Fallback(f(value), reason),
            Outcome::Failed(error) => Outcome::Failed(error),
        }
    }

    /// Short label for logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Ok(_) => "ok",
            Outcome::Fallback(..) => "fallback",
            Outcome::Failed(_) => "failed",
        }
    }
}
