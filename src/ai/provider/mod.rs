//! Generative Model Abstraction
//!
//! Defines the `GenerativeModel` trait the pipeline talks to. Requests and
//! responses are built from [`Part`], a sum type over the content variants a
//! model exchanges, so callers check capabilities instead of probing types.
//!
//! ## Modules
//!
//! - `gemini`: Generative Language REST backend with resumable file uploads

mod gemini;

pub use gemini::GeminiModel;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{QuizError, Result, TokenUsage};

// =============================================================================
// Content Parts
// =============================================================================

/// A file held in the provider's managed store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Provider resource name, used for deletion (e.g. `files/abc123`)
    pub name: String,
    /// URI referenced from requests
    pub uri: String,
    pub mime_type: String,
}

/// One piece of request or response content
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Blob { mime_type: String, data: Vec<u8> },
    FileReference(FileHandle),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn blob(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Blob {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

// =============================================================================
// Sampling & Response
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: i32,
}

impl SamplingConfig {
    pub fn with_max_output_tokens(self, max_output_tokens: i32) -> Self {
        Self {
            max_output_tokens,
            ..self
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for SamplingConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub parts: Vec<Part>,
}

/// Result of one generation round-trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub candidates: Vec<Candidate>,
    /// Usage metadata, when the provider reported it
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    /// Concatenated text parts of the first candidate.
    ///
    /// `None` when there is no candidate or the candidate has no parts.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        if candidate.parts.is_empty() {
            return None;
        }
        Some(candidate.parts.iter().filter_map(Part::as_text).collect())
    }
}

// =============================================================================
// Generative Model Trait
// =============================================================================

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Single request/response cycle: the prompt followed by its attachments
    async fn generate_content(
        &self,
        prompt: &str,
        attachments: &[Part],
        sampling: &SamplingConfig,
    ) -> Result<ModelResponse>;

    /// Upload bytes to the provider's file store
    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileHandle>;

    async fn delete_file(&self, file: &FileHandle) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

pub type SharedModel = Arc<dyn GenerativeModel>;

/// Create a shared model backend from configuration
pub fn create_model(config: &LlmConfig) -> Result<SharedModel> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        other => Err(QuizError::Config(format!(
            "Unknown provider: {}. Supported: gemini",
            other
        ))),
    }
}
