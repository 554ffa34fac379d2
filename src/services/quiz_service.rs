//! Quiz creation flow
//!
//! Gathers documents and transcripts for an authenticated user, runs the
//! generation pipeline, stores the result, and reports the outcome to the
//! notifier.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::pipeline::QuizPipeline;
use crate::storage::{MaterialRecord, PersistedQuiz, QuizStore, persist_quiz};
use crate::types::{QuizDraft, QuizError, Result, SourceDocument, TokenUsage, UserId};

use super::auth::CurrentUser;
use super::notifier::{NotificationEvent, Notifier};
use super::transcript::TranscriptFetcher;

#[derive(Debug, Clone, Default)]
pub struct QuizRequest {
    pub documents: Vec<SourceDocument>,
    pub transcript_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub quiz: QuizDraft,
    pub usage: TokenUsage,
    /// Present when a store is attached
    pub stored: Option<PersistedQuiz>,
    pub documents: Vec<String>,
}

pub struct QuizService {
    pipeline: QuizPipeline,
    transcripts: Arc<dyn TranscriptFetcher>,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn QuizStore>>,
}

impl QuizService {
    pub fn new(
        pipeline: QuizPipeline,
        transcripts: Arc<dyn TranscriptFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pipeline,
            transcripts,
            notifier,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn QuizStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[instrument(skip_all, fields(files = request.documents.len(), transcripts = request.transcript_urls.len()))]
    pub async fn create_quiz(
        &self,
        user: &dyn CurrentUser,
        request: QuizRequest,
    ) -> Result<QuizOutcome> {
        let owner = user.current_user_id().ok_or(QuizError::Unauthenticated)?;

        let mut documents: Vec<SourceDocument> = request
            .documents
            .into_iter()
            .filter(|doc| {
                let keep = doc.size_bytes() > 0;
                if !keep {
                    warn!(document = doc.name(), "Skipping empty file");
                }
                keep
            })
            .collect();
        documents.extend(self.fetch_transcripts(&request.transcript_urls).await);

        if documents.is_empty() {
            return Err(QuizError::NoDocuments);
        }

        let names: Vec<String> = documents.iter().map(|d| d.name().to_string()).collect();
        let materials: Vec<MaterialRecord> = documents
            .iter()
            .map(|doc| MaterialRecord {
                name: doc.name().to_string(),
                mime_type: doc.mime_type().to_string(),
                size_bytes: doc.size_bytes(),
            })
            .collect();

        let (result, usage) = self.pipeline.process_documents(documents).await.into_parts();
        info!(
            user = %owner,
            prompt_tokens = usage.prompt_tokens,
            candidate_tokens = usage.candidate_tokens,
            total_tokens = usage.total_tokens,
            "Quiz generation usage"
        );

        let quiz = match result {
            Ok(quiz) => quiz,
            Err(err) => {
                self.notify_failure(&owner, "quiz generation", &err);
                return Err(err);
            }
        };

        let stored = match &self.store {
            Some(store) => match self.store_quiz(store, &owner, &quiz, materials).await {
                Ok(stored) => Some(stored),
                Err(err) => {
                    self.notify_failure(&owner, "saving quiz", &err);
                    return Err(err);
                }
            },
            None => None,
        };

        self.notifier.notify(NotificationEvent::QuizCreated {
            user: owner,
            quiz: stored.as_ref().map(|s| s.id.clone()),
            title: quiz.title.clone(),
            questions: quiz.questions.len(),
            documents: names.len(),
            usage,
        });

        Ok(QuizOutcome {
            quiz,
            usage,
            stored,
            documents: names,
        })
    }

    /// Failed or empty transcripts are skipped
    async fn fetch_transcripts(&self, urls: &[String]) -> Vec<SourceDocument> {
        let mut documents = Vec::with_capacity(urls.len());
        for url in urls {
            match self.transcripts.fetch(url).await {
                Ok(text) if text.trim().is_empty() => {
                    warn!(url = %url, "Skipping empty transcript");
                }
                Ok(text) => {
                    let name = format!("transcript_{}.txt", Uuid::new_v4().simple());
                    info!(url = %url, document = %name, length = text.len(), "Added transcript");
                    documents.push(SourceDocument::from_text(name, text));
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "Failed to fetch transcript, skipping");
                }
            }
        }
        documents
    }

    async fn store_quiz(
        &self,
        store: &Arc<dyn QuizStore>,
        owner: &UserId,
        quiz: &QuizDraft,
        materials: Vec<MaterialRecord>,
    ) -> Result<PersistedQuiz> {
        let store = Arc::clone(store);
        let owner = owner.clone();
        let quiz = quiz.clone();
        tokio::task::spawn_blocking(move || persist_quiz(store.as_ref(), &owner, &quiz, &materials))
            .await
            .map_err(|e| QuizError::Storage(format!("persistence task failed: {}", e)))?
    }

    fn notify_failure(&self, owner: &UserId, context: &str, err: &QuizError) {
        self.notifier.notify(NotificationEvent::GenerationFailed {
            user: Some(owner.clone()),
            context: context.to_string(),
            error: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{ScriptedModel, text_response};
    use crate::pipeline::{GeneratorSettings, OrchestratorSettings};
    use crate::services::auth::FixedUser;
    use crate::services::notifier::recording::RecordingNotifier;
    use crate::storage::SqliteQuizStore;
    use crate::types::quiz::fixtures;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubTranscripts;

    #[async_trait]
    impl TranscriptFetcher for StubTranscripts {
        async fn fetch(&self, url: &str) -> Result<String> {
            match url {
                "https://video.test/ok" => Ok("a lecture about iterators".to_string()),
                "https://video.test/blank" => Ok("   ".to_string()),
                _ => Err(QuizError::Transcript(format!("{} unavailable", url))),
            }
        }
    }

    fn usage() -> TokenUsage {
        TokenUsage::new(20, 10, 30)
    }

    fn service(model: ScriptedModel, notifier: Arc<RecordingNotifier>) -> QuizService {
        let pipeline = QuizPipeline::new(
            Arc::new(model),
            GeneratorSettings {
                retry_delay: Duration::ZERO,
                ..GeneratorSettings::default()
            },
            OrchestratorSettings::default(),
        );
        QuizService::new(pipeline, Arc::new(StubTranscripts), notifier)
    }

    fn request(urls: &[&str]) -> QuizRequest {
        QuizRequest {
            documents: vec![SourceDocument::from_text("notes.md", "# Iterators")],
            transcript_urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let notifier = Arc::new(RecordingNotifier::default());
        let model = ScriptedModel::always(fixtures::quiz("T", 1, "t"), usage());
        let result = service(model, notifier.clone())
            .create_quiz(&FixedUser::anonymous(), request(&[]))
            .await;

        assert!(matches!(result, Err(QuizError::Unauthenticated)));
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_no_usable_documents() {
        let notifier = Arc::new(RecordingNotifier::default());
        let model = ScriptedModel::always(fixtures::quiz("T", 1, "t"), usage());
        let request = QuizRequest {
            documents: vec![SourceDocument::from_text("empty.txt", "")],
            transcript_urls: vec!["https://video.test/missing".into()],
        };
        let result = service(model, notifier)
            .create_quiz(&FixedUser::new("bob"), request)
            .await;
        assert!(matches!(result, Err(QuizError::NoDocuments)));
    }

    #[tokio::test]
    async fn test_creates_and_stores_quiz() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(SqliteQuizStore::open_in_memory().unwrap());
        let model = ScriptedModel::always(fixtures::quiz("Iterators", 4, "it"), usage());
        let service = service(model, notifier.clone()).with_store(store.clone());

        let outcome = service
            .create_quiz(
                &FixedUser::new("alice"),
                request(&[
                    "https://video.test/ok",
                    "https://video.test/blank",
                    "https://video.test/broken",
                ]),
            )
            .await
            .unwrap();

        // notes.md plus the one usable transcript, one chunk each
        assert_eq!(outcome.documents.len(), 2);
        assert!(outcome.documents[1].starts_with("transcript_"));
        assert_eq!(outcome.usage, TokenUsage::new(40, 20, 60));
        assert_eq!(outcome.quiz.questions.len(), 8);

        let stored = outcome.stored.unwrap();
        assert_eq!(stored.questions, 8);
        let loaded = store.load_quiz(&stored.id).unwrap().unwrap();
        assert_eq!(loaded.owner.as_str(), "alice");
        assert_eq!(loaded.materials.len(), 2);

        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            NotificationEvent::QuizCreated { questions: 8, documents: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_generation_failure_notified() {
        let notifier = Arc::new(RecordingNotifier::default());
        let model = ScriptedModel::new(|_| Ok(text_response("", usage())));
        let result = service(model, notifier.clone())
            .create_quiz(&FixedUser::new("carol"), request(&[]))
            .await;

        assert!(result.is_err());
        let events = notifier.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::GenerationFailed { user, error, .. } => {
                assert_eq!(user.as_ref().unwrap().as_str(), "carol");
                assert!(error.contains("failed to process one or more batches"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_correct_count_aborts_save() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(SqliteQuizStore::open_in_memory().unwrap());
        let mut bad = fixtures::quiz("Bad", 2, "b");
        bad.questions[0].options[3].is_correct = true;
        let model = ScriptedModel::always(bad, usage());

        let result = service(model, notifier.clone())
            .with_store(store)
            .create_quiz(&FixedUser::new("dave"), request(&[]))
            .await;

        assert!(matches!(result, Err(QuizError::InvalidCorrectCount { .. })));
        assert!(matches!(
            &notifier.events()[0],
            NotificationEvent::GenerationFailed { context, .. } if context == "saving quiz"
        ));
    }
}
