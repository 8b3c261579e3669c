//! Error types for Scholaris

use thiserror::Error;

/// Result type alias using Scholaris' Error
pub type Result<T> = std::result::Result<T, Error>;

/// Apology shown to students when a reply could not be produced.
const GENERIC_APOLOGY: &str =
    "Sorry, I couldn't answer that right now. Please try again in a moment.";

/// Scholaris error types with stable codes and operator hints
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Student '{0}' not found.")]
    StudentNotFound(String),

    #[error("Course '{0}' not found.")]
    CourseNotFound(String),

    #[error("Campaign '{0}' not found.")]
    CampaignNotFound(String),

    #[error("Knowledge entry '{0}' not found. Run `scholaris knowledge list` to see all entries.")]
    KnowledgeEntryNotFound(String),

    // Provider errors (E100-E199)
    #[error("Provider unavailable: {0}. Set SCHOLARIS_API_KEY or OPENAI_API_KEY.")]
    ProviderUnavailable(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider did not answer within {0} seconds")]
    ProviderTimeout(u64),

    #[error(
        "Model hit its output budget of {max_tokens} tokens before producing visible text"
    )]
    TruncatedEmptyResponse { max_tokens: usize },

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::StudentNotFound(_) => "E001",
            Self::CourseNotFound(_) => "E002",
            Self::CampaignNotFound(_) => "E003",
            Self::KnowledgeEntryNotFound(_) => "E004",
            Self::ProviderUnavailable(_) => "E100",
            Self::ProviderError(_) => "E101",
            Self::ProviderTimeout(_) => "E102",
            Self::TruncatedEmptyResponse { .. } => "E103",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidQuery(_) => "E800",
            Self::Serialization(_) => "E801",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::KnowledgeEntryNotFound(_) => Some("scholaris knowledge list".to_string()),
            Self::ProviderUnavailable(_) => {
                Some("export SCHOLARIS_API_KEY=<key>".to_string())
            }
            Self::ProviderTimeout(secs) => Some(format!(
                "scholaris config set tutor.request_timeout_secs {}",
                secs * 2
            )),
            Self::TruncatedEmptyResponse { max_tokens } => Some(format!(
                "scholaris config set tutor.reasoning_max_output_tokens {}",
                max_tokens * 2
            )),
            Self::ConfigError(_) => Some("scholaris config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error came from an embedding or language-model provider
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::ProviderError(_)
                | Self::ProviderTimeout(_)
                | Self::TruncatedEmptyResponse { .. }
        )
    }

    /// Short, student-facing text for this error.
    ///
    /// Never contains provider detail; the error itself is for operator logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TruncatedEmptyResponse { .. } => {
                "Sorry, that question needs a longer answer than I can give right now. \
                 Could you ask a shorter, more specific question?"
            }
            Self::InvalidQuery(_) => "Please type a question so I can help you.",
            Self::StudentNotFound(_) | Self::CourseNotFound(_) => {
                "Sorry, I couldn't find your course records. Please contact your coordinator."
            }
            _ => GENERIC_APOLOGY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_not_found_error() {
        let error = Error::StudentNotFound("stu-1".to_string());
        assert_eq!(error.code(), "E001");
        assert_eq!(error.suggestion(), None);
        assert!(error.to_string().contains("stu-1"));
    }

    #[test]
    fn test_provider_unavailable_error() {
        let error = Error::ProviderUnavailable("no API key configured".to_string());
        assert_eq!(error.code(), "E100");
        assert!(error.is_provider_failure());
        assert_eq!(
            error.suggestion(),
            Some("export SCHOLARIS_API_KEY=<key>".to_string())
        );
    }

    #[test]
    fn test_truncated_empty_response_is_distinct() {
        let error = Error::TruncatedEmptyResponse { max_tokens: 4096 };
        assert_eq!(error.code(), "E103");
        assert!(error.is_provider_failure());
        assert!(error.to_string().contains("4096"));
        assert_eq!(
            error.suggestion(),
            Some("scholaris config set tutor.reasoning_max_output_tokens 8192".to_string())
        );
        assert_ne!(error.user_message(), GENERIC_APOLOGY);
    }

    #[test]
    fn test_timeout_suggestion_doubles_budget() {
        let error = Error::ProviderTimeout(30);
        assert_eq!(error.code(), "E102");
        assert_eq!(
            error.suggestion(),
            Some("scholaris config set tutor.request_timeout_secs 60".to_string())
        );
    }

    #[test]
    fn test_user_message_hides_provider_detail() {
        let error = Error::ProviderError("HTTP 500: upstream stack trace".to_string());
        assert!(!error.user_message().contains("500"));
        assert!(!error.user_message().contains("stack"));
    }

    #[test]
    fn test_invalid_query_is_not_provider_failure() {
        let error = Error::InvalidQuery("query is empty".to_string());
        assert_eq!(error.code(), "E800");
        assert!(!error.is_provider_failure());
    }
}
