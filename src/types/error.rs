//! Unified Error Type System
//!
//! One error enum for the whole crate plus a small classifier that turns
//! provider failures into categories used for logging.
//!
//! ## Error Families
//!
//! - **Transient**: model call failures, empty or unparsable output (retried per attempt)
//! - **Fatal-to-batch**: document read or upload failures
//! - **Fatal-to-merge**: any batch exhausting its attempts
//! - **Persistence**: correct-answer count violations abort the whole write

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Provider failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Too many requests or quota exhausted
    RateLimit,
    /// Request or upload larger than the provider accepts
    TokenLimit,
    /// Missing or rejected API key
    Auth,
    /// Connectivity problems before a response arrived
    Network,
    /// Model or endpoint not reachable
    Unavailable,
    /// Request rejected as malformed
    BadRequest,
    /// Response body could not be decoded
    ParseError,
    /// Server-side hiccup
    Transient,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::TokenLimit => "TOKEN_LIMIT",
            Self::Auth => "AUTH",
            Self::Network => "NETWORK",
            Self::Unavailable => "UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::ParseError => "PARSE_ERROR",
            Self::Transient => "TRANSIENT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Categorized provider error
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "[{}:{}] {}", provider, self.category, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    /// Attach the provider name
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a free-form error message (transport errors, SDK messages)
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        let category = if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
        {
            ErrorCategory::RateLimit
        } else if lower.contains("too large") || lower.contains("payload size") {
            ErrorCategory::TokenLimit
        } else if lower.contains("api key")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("permission_denied")
        {
            ErrorCategory::Auth
        } else if lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection")
            || lower.contains("dns")
        {
            ErrorCategory::Network
        } else if lower.contains("503") || lower.contains("unavailable") {
            ErrorCategory::Unavailable
        } else if lower.contains("500") || lower.contains("internal") || lower.contains("overloaded")
        {
            ErrorCategory::Transient
        } else if lower.contains("400") || lower.contains("invalid_argument") {
            ErrorCategory::BadRequest
        } else if lower.contains("decode") || lower.contains("json") {
            ErrorCategory::ParseError
        } else {
            ErrorCategory::Unknown
        };

        LlmError::new(category, message).provider(provider)
    }

    /// Classify an HTTP status returned by the provider
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        let err = |category| LlmError::new(category, message).provider(provider);
        match status {
            429 => err(ErrorCategory::RateLimit),
            401 | 403 => err(ErrorCategory::Auth),
            413 => err(ErrorCategory::TokenLimit),
            400 => err(ErrorCategory::BadRequest),
            404 => err(ErrorCategory::Unavailable),
            500 | 502 | 503 | 504 => err(ErrorCategory::Transient),
            _ => err(ErrorCategory::Unknown),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum QuizError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Model Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("failed to upload file {document}: {message}")]
    Upload { document: String, message: String },

    // -------------------------------------------------------------------------
    // Generation Errors
    // -------------------------------------------------------------------------
    #[error("file {0} is empty")]
    EmptyDocument(String),

    #[error("no files provided")]
    NoDocuments,

    #[error("no content in response")]
    EmptyResponse,

    #[error("no JSON content found in response")]
    NoJsonContent,

    #[error("failed to parse quiz JSON: {0}")]
    Extraction(String),

    #[error("no questions in generated quiz")]
    NoQuestionsInResponse,

    #[error("failed to generate quiz after {attempts} attempts: {last}")]
    GenerationExhausted {
        attempts: usize,
        last: Box<QuizError>,
    },

    #[error("failed to process batch {index} ({documents}): {source}")]
    Batch {
        index: usize,
        documents: String,
        source: Box<QuizError>,
    },

    #[error("failed to process one or more batches: {}", .0.join("; "))]
    BatchFailures(Vec<String>),

    #[error("no questions generated from any files")]
    NoQuestions,

    #[error("worker handling batch {0} stopped without a result")]
    WorkerLost(usize),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Persistence & Access Errors
    // -------------------------------------------------------------------------
    #[error("invalid number of correct answers ({count}) for question: {question}")]
    InvalidCorrectCount { count: usize, question: String },

    #[error("transcript fetch failed: {0}")]
    Transcript(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<LlmError> for QuizError {
    fn from(err: LlmError) -> Self {
        QuizError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl QuizError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn upload(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Category used for log fields
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Llm(e) => e.category,
            Self::LlmApi(msg) => ErrorClassifier::classify(msg, "unknown").category,
            Self::Upload { .. } | Self::Io(_) => ErrorCategory::Network,
            Self::Timeout { .. } => ErrorCategory::Network,
            Self::EmptyResponse | Self::NoQuestionsInResponse => ErrorCategory::Transient,
            Self::NoJsonContent | Self::Extraction(_) | Self::Json(_) => ErrorCategory::ParseError,
            Self::Config(_) | Self::Validation(_) => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| QuizError::Storage(format!("{}: {}", context.into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
