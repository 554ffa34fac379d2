//! Configuration Types
//!
//! All configuration structures with defaults matching `crate::constants`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{concurrency, deadlines, limits, model, quiz, retry};
use crate::types::{QuizError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,

    /// Generative model settings
    pub llm: LlmConfig,

    /// Batching, concurrency, retry and cap settings
    pub pipeline: PipelineConfig,

    pub notification: NotificationConfig,

    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            notification: NotificationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(QuizError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(QuizError::Config(format!(
                "LLM top_p must be between 0.0 and 1.0, got {}",
                self.llm.top_p
            )));
        }
        if self.llm.top_k <= 0 || self.llm.max_output_tokens <= 0 {
            return Err(QuizError::Config(
                "LLM top_k and max_output_tokens must be positive".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(QuizError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        let p = &self.pipeline;
        let positive = [
            ("worker_count", p.worker_count),
            ("chunk_size", p.chunk_size),
            ("sub_batch_concurrency", p.sub_batch_concurrency),
            ("max_attempts", p.max_attempts),
            ("per_batch_question_cap", p.per_batch_question_cap),
            ("multi_batch_question_cap", p.multi_batch_question_cap),
            ("single_call_question_cap", p.single_call_question_cap),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(QuizError::Config(format!(
                "pipeline {} must be greater than 0",
                name
            )));
        }
        if p.inline_ceiling_bytes == 0 {
            return Err(QuizError::Config(
                "pipeline inline_ceiling_bytes must be greater than 0".to_string(),
            ));
        }

        if let Some(webhook) = &self.notification.webhook_url {
            url::Url::parse(webhook)
                .map_err(|e| QuizError::Config(format!("Invalid webhook_url: {}", e)))?;
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend name (only "gemini" is built in)
    pub provider: String,
    pub model: String,
    /// Never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    /// Output budget of the first attempt
    pub max_output_tokens: i32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("top_k", &self.top_k)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: model::DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: model::REQUEST_TIMEOUT_SECS,
            temperature: model::TEMPERATURE,
            top_k: model::TOP_K,
            top_p: model::TOP_P,
            max_output_tokens: model::INITIAL_MAX_OUTPUT_TOKENS,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub worker_count: usize,
    pub chunk_size: usize,
    pub sub_batch_concurrency: usize,
    pub inline_ceiling_bytes: u64,
    pub overall_deadline_secs: u64,
    pub batch_deadline_secs: u64,
    pub call_timeout_secs: u64,
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
    pub per_batch_question_cap: usize,
    pub multi_batch_question_cap: usize,
    pub single_call_question_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: concurrency::WORKER_COUNT,
            chunk_size: concurrency::CHUNK_SIZE,
            sub_batch_concurrency: concurrency::SUB_BATCH_CONCURRENCY,
            inline_ceiling_bytes: limits::INLINE_CEILING_BYTES,
            overall_deadline_secs: deadlines::OVERALL_SECS,
            batch_deadline_secs: deadlines::BATCH_SECS,
            call_timeout_secs: deadlines::CALL_SECS,
            max_attempts: retry::MAX_ATTEMPTS,
            retry_delay_ms: retry::DELAY_MS,
            per_batch_question_cap: quiz::PER_BATCH_QUESTION_CAP,
            multi_batch_question_cap: quiz::MULTI_BATCH_QUESTION_CAP,
            single_call_question_cap: quiz::SINGLE_CALL_QUESTION_CAP,
        }
    }
}

impl PipelineConfig {
    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_secs)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// =============================================================================
// Notification & Storage
// =============================================================================

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook endpoint; notifications are disabled when unset
    #[serde(skip_serializing)]
    pub webhook_url: Option<String>,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".quizforge/quizforge.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.pipeline.worker_count, 6);
        assert_eq!(config.pipeline.sub_batch_concurrency, 15);
        assert_eq!(config.pipeline.inline_ceiling_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.pipeline.worker_count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn test_bad_temperature_rejected() {
        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_webhook_rejected() {
        let mut config = Config::default();
        config.notification.webhook_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.notification.webhook_url = Some("https://hooks.example.com/abc".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        config.notification.webhook_url = Some("https://hooks.example.com/hook-xyz".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("hook-xyz"));
    }
}
