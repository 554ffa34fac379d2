//! Collaborators around the pipeline: identity, transcripts, notifications,
//! and the quiz creation flow that ties them to storage.

pub mod auth;
pub mod notifier;
pub mod quiz_service;
pub mod transcript;

pub use auth::{CurrentUser, FixedUser};
pub use notifier::{NoopNotifier, NotificationEvent, Notifier, WebhookNotifier};
pub use quiz_service::{QuizOutcome, QuizRequest, QuizService};
pub use transcript::{HttpTranscriptFetcher, TranscriptFetcher};
