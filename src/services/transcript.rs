//! Transcript retrieval
//!
//! Transcripts become in-memory text documents. Only plain-text transcript
//! URLs are fetched here; site-specific scraping is left to other
//! implementations of [`TranscriptFetcher`].

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::types::{QuizError, Result};

#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Downloads a transcript served as text over HTTP(S)
pub struct HttpTranscriptFetcher {
    client: reqwest::Client,
}

impl HttpTranscriptFetcher {
    const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| QuizError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn parse(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| QuizError::Validation(format!("invalid transcript URL {}: {}", url, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(QuizError::Validation(format!(
                "unsupported transcript URL scheme: {}",
                scheme
            ))),
        }
    }
}

#[async_trait]
impl TranscriptFetcher for HttpTranscriptFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let url = Self::parse(url)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| QuizError::Transcript(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizError::Transcript(format!("{} returned {}", url, status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| QuizError::Transcript(format!("unreadable body: {}", e)))?;
        debug!(url = %url, length = text.len(), "Fetched transcript");
        Ok(text)
    }
}
