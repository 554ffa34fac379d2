pub mod document;
pub mod error;
pub mod quiz;

pub use document::{ContentRef, SourceDocument};
pub use error::{ErrorCategory, ErrorClassifier, LlmError, QuizError, Result, ResultExt};
pub use quiz::{OptionDraft, QuestionDraft, QuizDraft, TokenUsage};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for the authenticated user's identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a persisted quiz
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuizId(String);

impl QuizId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
