//! Generative request client
//!
//! Wraps the model call with the attempt loop: each attempt sends the prompt
//! with the attachments, extracts and strictly decodes the quiz, and rejects
//! empty output. Retries shrink the output budget and ask for fewer
//! questions. Usage is metered on every attempt that returned metadata.

use backon::{ConstantBuilder, Retryable};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::ai::metrics::UsageMeter;
use crate::ai::prompt::prompt_for_attempt;
use crate::ai::provider::{FileHandle, Part, SamplingConfig, SharedModel};
use crate::ai::timeout::with_timeout;
use crate::ai::validation::{decode_quiz, extract_json};
use crate::config::Config;
use crate::constants::retry::{MIN_OUTPUT_TOKENS, OUTPUT_TOKEN_STEP, RETRY_OUTPUT_TOKEN_BASE};
use crate::constants::{deadlines, limits, quiz, retry};
use crate::types::document::total_size;
use crate::types::{QuizDraft, QuizError, Result, SourceDocument};

use super::Metered;

// =============================================================================
// Routing
// =============================================================================

/// How a set of documents is presented to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Raw bytes attached to the request
    Inline,
    /// Uploaded to the provider's file store and referenced by handle
    RemoteReference,
    /// Several documents too large together; planned into sub-batches
    Split,
}

impl GenerationMode {
    pub fn select(documents: &[SourceDocument], inline_ceiling: u64) -> Self {
        let total = total_size(documents);
        if documents.len() > 1 && total > inline_ceiling / 2 {
            Self::Split
        } else if total > inline_ceiling {
            Self::RemoteReference
        } else {
            Self::Inline
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::RemoteReference => write!(f, "remote"),
            Self::Split => write!(f, "split"),
        }
    }
}

/// Output budget for an attempt: the configured ceiling first, then
/// `4096 - 1000 * attempt`, never below 1000
pub fn output_tokens_for_attempt(initial: i32, attempt: usize) -> i32 {
    if attempt == 0 {
        return initial;
    }
    let step = i32::try_from(attempt)
        .unwrap_or(i32::MAX)
        .saturating_mul(OUTPUT_TOKEN_STEP);
    RETRY_OUTPUT_TOKEN_BASE
        .saturating_sub(step)
        .max(MIN_OUTPUT_TOKENS)
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub sampling: SamplingConfig,
    pub max_attempts: usize,
    pub retry_delay: Duration,
    /// Deadline for each individual model call
    pub call_timeout: Duration,
    /// Cap applied to an accepted draft
    pub question_cap: usize,
    pub inline_ceiling: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            max_attempts: retry::MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(retry::DELAY_MS),
            call_timeout: Duration::from_secs(deadlines::CALL_SECS),
            question_cap: quiz::SINGLE_CALL_QUESTION_CAP,
            inline_ceiling: limits::INLINE_CEILING_BYTES,
        }
    }
}

impl From<&Config> for GeneratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            sampling: SamplingConfig::from(&config.llm),
            max_attempts: config.pipeline.max_attempts,
            retry_delay: config.pipeline.retry_delay(),
            call_timeout: config.pipeline.call_timeout(),
            question_cap: config.pipeline.single_call_question_cap,
            inline_ceiling: config.pipeline.inline_ceiling_bytes,
        }
    }
}

// =============================================================================
// QuizGenerator
// =============================================================================

pub struct QuizGenerator {
    model: SharedModel,
    settings: GeneratorSettings,
}

impl QuizGenerator {
    pub fn new(model: SharedModel, settings: GeneratorSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Run the attempt loop with a private meter, returning usage alongside
    pub async fn generate_metered(&self, attachments: &[Part]) -> Metered<QuizDraft> {
        let meter = UsageMeter::new();
        let result = self.generate(attachments, &meter).await;
        Metered {
            result,
            usage: meter.snapshot(),
        }
    }

    /// Generate a quiz from prepared attachments.
    ///
    /// Never returns a partial result: after the last failed attempt the
    /// final error is returned wrapped in [`QuizError::GenerationExhausted`].
    #[instrument(skip_all, fields(model = %self.model.model(), attachments = attachments.len()))]
    pub async fn generate(&self, attachments: &[Part], meter: &UsageMeter) -> Result<QuizDraft> {
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        let result = (move || async move {
            let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst);
            self.attempt(attempt, attachments, meter).await
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(self.settings.retry_delay)
                .with_max_times(self.settings.max_attempts.saturating_sub(1)),
        )
        .notify(|err: &QuizError, delay: Duration| {
            warn!(
                error = %err,
                category = %err.category(),
                delay_ms = delay.as_millis() as u64,
                "Generation attempt failed, retrying"
            );
        })
        .await;

        result.map_err(|last| QuizError::GenerationExhausted {
            attempts: attempts.load(Ordering::SeqCst),
            last: Box::new(last),
        })
    }

    async fn attempt(
        &self,
        attempt: usize,
        attachments: &[Part],
        meter: &UsageMeter,
    ) -> Result<QuizDraft> {
        let sampling = self.settings.sampling.with_max_output_tokens(
            output_tokens_for_attempt(self.settings.sampling.max_output_tokens, attempt),
        );
        let prompt = prompt_for_attempt(attempt);
        debug!(
            attempt,
            max_output_tokens = sampling.max_output_tokens,
            "Sending generation request"
        );

        let response = with_timeout(
            self.settings.call_timeout,
            self.model.generate_content(&prompt, attachments, &sampling),
            "generate content",
        )
        .await?;

        if let Some(usage) = &response.usage {
            meter.record(usage);
        }

        let text = response
            .text()
            .filter(|text| !text.trim().is_empty())
            .ok_or(QuizError::EmptyResponse)?;

        let json = extract_json(&text);
        if json.trim().is_empty() {
            return Err(QuizError::NoJsonContent);
        }

        let mut quiz = decode_quiz(&json).inspect_err(|_| {
            let preview: String = json.chars().take(500).collect();
            debug!(attempt, raw = %preview, "Undecodable quiz payload");
        })?;

        if quiz.questions.is_empty() {
            return Err(QuizError::NoQuestionsInResponse);
        }

        if quiz.questions.len() > self.settings.question_cap {
            info!(
                returned = quiz.questions.len(),
                cap = self.settings.question_cap,
                "Truncating oversized quiz"
            );
            quiz.truncate(self.settings.question_cap);
        }

        info!(attempt, questions = quiz.questions.len(), "Generated quiz");
        Ok(quiz)
    }

    // =========================================================================
    // Document Presentation
    // =========================================================================

    /// Generate from documents that do not need splitting: inline when they
    /// fit under the ceiling, otherwise by remote reference
    pub async fn generate_documents(
        &self,
        documents: &[SourceDocument],
        meter: &UsageMeter,
    ) -> Result<QuizDraft> {
        if total_size(documents) > self.settings.inline_ceiling {
            self.generate_remote(documents, meter).await
        } else {
            self.generate_inline(documents, meter).await
        }
    }

    pub async fn generate_inline(
        &self,
        documents: &[SourceDocument],
        meter: &UsageMeter,
    ) -> Result<QuizDraft> {
        if documents.is_empty() {
            return Err(QuizError::NoDocuments);
        }

        let mut attachments = Vec::with_capacity(documents.len());
        for document in documents {
            let bytes = document.read_bytes().await?;
            attachments.push(Part::blob(document.mime_type(), bytes));
        }

        debug!(documents = documents.len(), "Generating inline");
        self.generate(&attachments, meter).await
    }

    /// Upload every document in parallel, generate against the references,
    /// then delete the uploads whatever the outcome
    pub async fn generate_remote(
        &self,
        documents: &[SourceDocument],
        meter: &UsageMeter,
    ) -> Result<QuizDraft> {
        if documents.is_empty() {
            return Err(QuizError::NoDocuments);
        }

        let uploads = join_all(documents.iter().map(|d| self.upload(d))).await;

        let mut handles = Vec::with_capacity(documents.len());
        let mut first_error = None;
        for (document, upload) in documents.iter().zip(uploads) {
            match upload {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!(document = document.name(), error = %err, "Upload failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            self.delete_uploads(&handles).await;
            return Err(err);
        }

        let mut uploads = UploadGuard::new(self.model.clone(), handles);
        info!(uploaded = uploads.handles.len(), "Generating from uploaded files");
        let attachments: Vec<Part> = uploads
            .handles
            .iter()
            .cloned()
            .map(Part::FileReference)
            .collect();
        let result = self.generate(&attachments, meter).await;
        self.delete_uploads(&uploads.take()).await;
        result
    }

    async fn upload(&self, document: &SourceDocument) -> Result<FileHandle> {
        let bytes = document.read_bytes().await?;
        self.model
            .upload_file(document.name(), document.mime_type(), bytes)
            .await
            .map_err(|err| match err {
                QuizError::Upload { .. } => err,
                other => QuizError::upload(document.name(), other.to_string()),
            })
    }

    /// Cleanup failures are logged, never propagated
    async fn delete_uploads(&self, handles: &[FileHandle]) {
        join_all(handles.iter().map(|handle| async move {
            if let Err(err) = self.model.delete_file(handle).await {
                warn!(file = %handle.name, error = %err, "Failed to delete uploaded file");
            }
        }))
        .await;
    }
}

/// Owns uploaded handles until they are deleted. Dropping it with handles
/// still held (a deadline cancelled the generation) spawns the deletes on
/// the current runtime.
struct UploadGuard {
    model: SharedModel,
    handles: Vec<FileHandle>,
}

impl UploadGuard {
    fn new(model: SharedModel, handles: Vec<FileHandle>) -> Self {
        Self { model, handles }
    }

    fn take(&mut self) -> Vec<FileHandle> {
        std::mem::take(&mut self.handles)
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles = self.take();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(files = handles.len(), "No runtime to delete abandoned uploads");
            return;
        };

        debug!(files = handles.len(), "Deleting uploads of cancelled generation");
        let model = self.model.clone();
        runtime.spawn(async move {
            for handle in &handles {
                if let Err(err) = model.delete_file(handle).await {
                    warn!(file = %handle.name, error = %err, "Failed to delete uploaded file");
                }
            }
        });
    }
}
