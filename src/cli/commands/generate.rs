//! Generate Command
//!
//! Usage:
//!   quizforge generate <FILES>... [--transcript <URL>]... [--save] [--json]

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ai::create_model;
use crate::cli::Output;
use crate::config::{Config, ConfigLoader};
use crate::pipeline::QuizPipeline;
use crate::services::{
    FixedUser, HttpTranscriptFetcher, NoopNotifier, Notifier, QuizOutcome, QuizRequest,
    QuizService, WebhookNotifier,
};
use crate::storage::SqliteQuizStore;
use crate::types::{QuizDraft, QuizError, Result, SourceDocument, TokenUsage};

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub files: Vec<PathBuf>,
    pub transcripts: Vec<String>,
    pub save: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    quiz_id: Option<&'a str>,
    documents: &'a [String],
    usage: &'a TokenUsage,
    quiz: &'a QuizDraft,
}

pub async fn run(options: GenerateOptions) -> Result<()> {
    let config = ConfigLoader::load()?;
    let service = build_service(&config, options.save)?;
    let output = Output::new();

    let mut documents = Vec::with_capacity(options.files.len());
    for path in &options.files {
        match SourceDocument::from_path(path).await {
            Ok(document) => documents.push(document),
            Err(QuizError::EmptyDocument(name)) => {
                output.warning(&format!("Skipping empty file {}", name));
            }
            Err(err) => return Err(err),
        }
    }

    let request = QuizRequest {
        documents,
        transcript_urls: options.transcripts,
    };
    let outcome = service.create_quiz(&FixedUser::local(), request).await?;

    if options.json {
        print_json(&outcome)
    } else {
        output.quiz(&outcome.quiz);
        output.usage(&outcome.usage);
        if let Some(stored) = &outcome.stored {
            output.success(&format!(
                "Saved quiz {} ({} questions)",
                stored.id, stored.questions
            ));
        }
        Ok(())
    }
}

fn build_service(config: &Config, save: bool) -> Result<QuizService> {
    let model = create_model(&config.llm)?;
    let pipeline = QuizPipeline::from_config(model, config);

    let notifier: Arc<dyn Notifier> = match &config.notification.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.as_str())?),
        None => Arc::new(NoopNotifier),
    };

    let service = QuizService::new(pipeline, Arc::new(HttpTranscriptFetcher::new()?), notifier);
    if save {
        let store = SqliteQuizStore::open(&config.storage.database_path)?;
        Ok(service.with_store(Arc::new(store)))
    } else {
        Ok(service)
    }
}

fn print_json(outcome: &QuizOutcome) -> Result<()> {
    let report = JsonReport {
        quiz_id: outcome.stored.as_ref().map(|s| s.id.as_str()),
        documents: &outcome.documents,
        usage: &outcome.usage,
        quiz: &outcome.quiz,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
