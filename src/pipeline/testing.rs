//! Scripted model backend for pipeline tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ai::provider::{
    Candidate, FileHandle, GenerativeModel, ModelResponse, Part, SamplingConfig,
};
use crate::types::{QuizDraft, QuizError, Result, TokenUsage};

/// What one `generate_content` call looked like
#[derive(Debug, Clone)]
pub struct Call {
    pub index: u32,
    pub prompt: String,
    pub attachments: Vec<Part>,
    pub sampling: SamplingConfig,
}

impl Call {
    /// Inline blob attachments
    pub fn inline_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|p| matches!(p, Part::Blob { .. }))
            .count()
    }

    pub fn reference_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|p| matches!(p, Part::FileReference(_)))
            .count()
    }
}

type Script = Box<dyn Fn(&Call) -> Result<ModelResponse> + Send + Sync>;

pub struct ScriptedModel {
    script: Script,
    calls: AtomicU32,
    history: Mutex<Vec<Call>>,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_upload_of: Option<String>,
    hang_generation: bool,
}

impl ScriptedModel {
    pub fn new(script: impl Fn(&Call) -> Result<ModelResponse> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicU32::new(0),
            history: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fail_upload_of: None,
            hang_generation: false,
        }
    }

    /// Always answer with `quiz` and `usage`
    pub fn always(quiz: QuizDraft, usage: TokenUsage) -> Self {
        Self::new(move |_| Ok(quiz_response(&quiz, usage)))
    }

    pub fn failing_upload_of(mut self, name: &str) -> Self {
        self.fail_upload_of = Some(name.to_string());
        self
    }

    /// Accept uploads but never answer `generate_content`
    pub fn hanging() -> Self {
        Self {
            hang_generation: true,
            ..Self::new(|_| Err(QuizError::EmptyResponse))
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> Vec<Call> {
        self.history.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate_content(
        &self,
        prompt: &str,
        attachments: &[Part],
        sampling: &SamplingConfig,
    ) -> Result<ModelResponse> {
        let call = Call {
            index: self.calls.fetch_add(1, Ordering::SeqCst),
            prompt: prompt.to_string(),
            attachments: attachments.to_vec(),
            sampling: *sampling,
        };
        self.history.lock().unwrap().push(call.clone());
        if self.hang_generation {
            return std::future::pending().await;
        }
        (self.script)(&call)
    }

    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<FileHandle> {
        if self.fail_upload_of.as_deref() == Some(display_name) {
            return Err(QuizError::upload(display_name, "quota exceeded"));
        }
        self.uploads.lock().unwrap().push(display_name.to_string());
        Ok(FileHandle {
            name: format!("files/{}", display_name),
            uri: format!("https://files.test/{}", display_name),
            mime_type: mime_type.to_string(),
        })
    }

    async fn delete_file(&self, file: &FileHandle) -> Result<()> {
        self.deletes.lock().unwrap().push(file.name.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

pub fn text_response(text: &str, usage: TokenUsage) -> ModelResponse {
    ModelResponse {
        candidates: vec![Candidate {
            parts: vec![Part::text(text)],
        }],
        usage: Some(usage),
    }
}

pub fn quiz_response(quiz: &QuizDraft, usage: TokenUsage) -> ModelResponse {
    let json = serde_json::to_string(quiz).unwrap_or_default();
    text_response(&json, usage)
}
