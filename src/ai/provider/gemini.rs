//! Gemini Generative Language API backend
//!
//! Content generation via `models/{model}:generateContent`, plus the resumable
//! upload protocol and file deletion for remote-reference requests.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{
    Candidate, FileHandle, GenerativeModel, ModelResponse, Part, SamplingConfig,
};
use crate::config::LlmConfig;
use crate::constants::model::{API_KEY_ENV, DEFAULT_API_BASE};
use crate::types::{ErrorClassifier, QuizError, Result, TokenUsage};

const PROVIDER: &str = "gemini";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const FILE_STATE_ACTIVE: &str = "ACTIVE";
const FILE_STATE_PROCESSING: &str = "PROCESSING";

/// Gemini backend with secure API key handling
pub struct GeminiModel {
    /// Sent as `x-goog-api-key`, never placed in URLs
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiModel")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                QuizError::Config(format!(
                    "Gemini API key not found. Set {} or llm.api_key in config",
                    API_KEY_ENV
                ))
            })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&api_base)
            .map_err(|e| QuizError::Config(format!("Invalid api_base {}: {}", api_base, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuizError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            model: config.model.clone(),
            client,
        })
    }

    fn transport_error(err: reqwest::Error) -> QuizError {
        QuizError::Llm(ErrorClassifier::classify(&err.to_string(), PROVIDER))
    }

    /// Map a non-success status to a classified error
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(QuizError::Llm(ErrorClassifier::classify_http_status(
            status.as_u16(),
            &format!("Gemini API error ({}): {}", status, body),
            PROVIDER,
        )))
    }

    async fn get_file(&self, name: &str) -> Result<WireFile> {
        let url = format!("{}/v1beta/{}", self.api_base, name);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| QuizError::LlmApi(format!("Failed to parse file metadata: {}", e)))
    }

    /// Poll until a freshly uploaded file leaves the PROCESSING state
    async fn await_active(&self, file: WireFile) -> Result<WireFile> {
        if file.state.as_deref() != Some(FILE_STATE_PROCESSING) {
            return Ok(file);
        }

        let name = file.name.as_str();
        (move || async move {
            let current = self.get_file(name).await?;
            match current.state.as_deref() {
                Some(FILE_STATE_PROCESSING) => Err(QuizError::upload(name, "still processing")),
                _ => Ok(current),
            }
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(10))
                .with_max_times(10),
        )
        .when(|e| matches!(e, QuizError::Upload { .. }))
        .await
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate_content(
        &self,
        prompt: &str,
        attachments: &[Part],
        sampling: &SamplingConfig,
    ) -> Result<ModelResponse> {
        info!(
            model = %self.model,
            attachments = attachments.len(),
            max_output_tokens = sampling.max_output_tokens,
            "Generating with Gemini"
        );

        let start_time = Instant::now();
        let request = GenerateContentRequest::new(prompt, attachments, sampling);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let response = Self::check_status(response).await?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| QuizError::LlmApi(format!("Failed to parse Gemini response: {}", e)))?;

        debug!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            candidates = body.candidates.len(),
            "Received Gemini response"
        );

        Ok(body.into())
    }

    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileHandle> {
        let size = bytes.len();
        debug!(file = display_name, size, "Starting resumable upload");

        let start_url = format!("{}/upload/v1beta/files", self.api_base);
        let start = self
            .client
            .post(&start_url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadFileMetadata { display_name },
            })
            .send()
            .await
            .map_err(|e| QuizError::upload(display_name, e.to_string()))?;
        let start = Self::check_status(start).await?;

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| QuizError::upload(display_name, "missing upload URL header"))?;

        let finalize = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| QuizError::upload(display_name, e.to_string()))?;
        let finalize = Self::check_status(finalize).await?;

        let uploaded: UploadResponse = finalize
            .json()
            .await
            .map_err(|e| QuizError::upload(display_name, format!("bad upload response: {}", e)))?;

        let file = self.await_active(uploaded.file).await?;
        if let Some(state) = file.state.as_deref()
            && state != FILE_STATE_ACTIVE
        {
            return Err(QuizError::upload(
                display_name,
                format!("file entered state {}", state),
            ));
        }

        info!(file = display_name, name = %file.name, "Uploaded file");
        Ok(FileHandle {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or_else(|| mime_type.to_string()),
        })
    }

    async fn delete_file(&self, file: &FileHandle) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.api_base, file.name);
        let response = self
            .client
            .delete(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check_status(response).await?;
        debug!(name = %file.name, "Deleted uploaded file");
        Ok(())
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn new(prompt: &str, attachments: &[Part], sampling: &SamplingConfig) -> Self {
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        parts.push(WirePart {
            text: Some(prompt.to_string()),
            ..WirePart::default()
        });
        parts.extend(attachments.iter().map(WirePart::from));

        Self {
            contents: vec![WireContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: sampling.temperature,
                top_k: sampling.top_k,
                top_p: sampling.top_p,
                max_output_tokens: sampling.max_output_tokens,
                response_mime_type: "application/json",
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: i32,
    response_mime_type: &'static str,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64-encoded bytes
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    #[serde(default)]
    mime_type: String,
    file_uri: String,
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self {
                text: Some(text.clone()),
                ..Self::default()
            },
            Part::Blob { mime_type, data } => Self {
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
                ..Self::default()
            },
            Part::FileReference(file) => Self {
                file_data: Some(FileData {
                    mime_type: file.mime_type.clone(),
                    file_uri: file.uri.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

impl WirePart {
    /// Parts of unknown shape (e.g. function calls) are skipped
    fn into_part(self) -> Option<Part> {
        if let Some(text) = self.text {
            return Some(Part::Text(text));
        }
        if let Some(inline) = self.inline_data {
            let data = BASE64.decode(inline.data.as_bytes()).ok()?;
            return Some(Part::Blob {
                mime_type: inline.mime_type,
                data,
            });
        }
        self.file_data.map(|file| {
            Part::FileReference(FileHandle {
                name: String::new(),
                uri: file.file_uri,
                mime_type: file.mime_type,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
    #[serde(default)]
    total_token_count: i32,
}

impl From<GenerateContentResponse> for ModelResponse {
    fn from(body: GenerateContentResponse) -> Self {
        let candidates = body
            .candidates
            .into_iter()
            .map(|c| Candidate {
                parts: c
                    .content
                    .map(|content| content.parts)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(WirePart::into_part)
                    .collect(),
            })
            .collect();
        let usage = body.usage_metadata.map(|u| {
            TokenUsage::new(
                u.prompt_token_count,
                u.candidates_token_count,
                u.total_token_count,
            )
        });
        ModelResponse { candidates, usage }
    }
}

#[derive(Debug, Serialize)]
struct UploadStartRequest<'a> {
    file: UploadFileMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct UploadFileMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: WireFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    name: String,
    #[serde(default)]
    uri: String,
    mime_type: Option<String>,
    state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let model = GeminiModel::new(&config_with_key()).unwrap();
        let debug = format!("{:?}", model);
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("gemini-2.0-flash"));
    }

    #[test]
    fn test_invalid_api_base_rejected() {
        let config = LlmConfig {
            api_base: Some("not a url".to_string()),
            ..config_with_key()
        };
        assert!(matches!(
            GeminiModel::new(&config),
            Err(QuizError::Config(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let attachments = vec![
            Part::blob("application/pdf", b"%PDF".to_vec()),
            Part::FileReference(FileHandle {
                name: "files/abc".into(),
                uri: "https://example.com/files/abc".into(),
                mime_type: "text/plain".into(),
            }),
        ];
        let request =
            GenerateContentRequest::new("prompt", &attachments, &SamplingConfig::default());
        let value = serde_json::to_value(&request).unwrap();
        let wire_parts = &value["contents"][0]["parts"];
        assert_eq!(wire_parts[0]["text"], "prompt");
        assert_eq!(wire_parts[1]["inlineData"]["data"], BASE64.encode(b"%PDF"));
        assert_eq!(
            wire_parts[2]["fileData"]["fileUri"],
            "https://example.com/files/abc"
        );
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_conversion() {
        let raw = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"questions\""}, {"text": ":[]}"}]}}],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 30, "totalTokenCount": 150}
        }"#;
        let body: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let response = ModelResponse::from(body);
        assert_eq!(response.text().as_deref(), Some("{\"questions\":[]}"));
        assert_eq!(response.usage, Some(TokenUsage::new(120, 30, 150)));
    }

    #[test]
    fn test_response_without_candidates() {
        let body: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        let response = ModelResponse::from(body);
        assert!(response.text().is_none());
        assert!(response.usage.is_none());
    }
}
