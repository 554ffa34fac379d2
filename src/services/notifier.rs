//! Outbound notifications
//!
//! Fire-and-forget: [`Notifier::notify`] returns immediately and delivery
//! problems only ever reach the log.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{QuizError, QuizId, Result, TokenUsage, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    QuizCreated {
        user: UserId,
        quiz: Option<QuizId>,
        title: String,
        questions: usize,
        documents: usize,
        usage: TokenUsage,
    },
    GenerationFailed {
        user: Option<UserId>,
        context: String,
        error: String,
    },
}

impl NotificationEvent {
    pub fn title(&self) -> String {
        match self {
            Self::QuizCreated { title, .. } => format!("Quiz created: {}", title),
            Self::GenerationFailed { context, .. } => format!("Error: {}", context),
        }
    }

    fn to_embed(&self) -> Embed {
        match self {
            Self::QuizCreated {
                user,
                quiz,
                questions,
                documents,
                usage,
                ..
            } => {
                let mut fields = vec![
                    EmbedField::inline("User ID", format!("`{}`", user)),
                    EmbedField::inline("Questions", questions.to_string()),
                    EmbedField::inline("Documents", documents.to_string()),
                    EmbedField::inline("Total Tokens", usage.total_tokens.to_string()),
                ];
                if let Some(id) = quiz {
                    fields.insert(1, EmbedField::inline("Quiz ID", format!("`{}`", id)));
                }
                Embed {
                    title: self.title(),
                    description: None,
                    color: Embed::GREEN,
                    fields,
                    timestamp: Utc::now().to_rfc3339(),
                }
            }
            Self::GenerationFailed { user, error, .. } => Embed {
                title: self.title(),
                description: Some(format!("**Error Details:**\n```{}```", error)),
                color: Embed::RED,
                fields: user
                    .iter()
                    .map(|u| EmbedField::inline("User ID", format!("`{}`", u)))
                    .collect(),
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Dispatch without waiting for delivery
    fn notify(&self, event: NotificationEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, event: NotificationEvent) {
        debug!(event = %event.title(), "Notification dropped (no webhook configured)");
    }
}

// =============================================================================
// Webhook
// =============================================================================

#[derive(Debug, Serialize)]
struct WebhookPayload {
    username: &'static str,
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<EmbedField>,
    timestamp: String,
}

impl Embed {
    const GREEN: u32 = 0x2ECC71;
    const RED: u32 = 0xFF0000;
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

impl EmbedField {
    fn inline(name: &'static str, value: String) -> Self {
        Self {
            name,
            value,
            inline: true,
        }
    }
}

/// Posts Discord-style embeds to a webhook on a background task
pub struct WebhookNotifier {
    url: SecretString,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &"[REDACTED]")
            .finish()
    }
}

impl WebhookNotifier {
    const USERNAME: &'static str = "quizforge";
    const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url)
            .map_err(|e| QuizError::Config(format!("invalid webhook URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| QuizError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            url: SecretString::from(url),
            client,
        })
    }

    fn payload(event: &NotificationEvent) -> WebhookPayload {
        WebhookPayload {
            username: Self::USERNAME,
            embeds: vec![event.to_embed()],
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: NotificationEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event = %event.title(), "No async runtime, notification dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.url.expose_secret().to_string();
        let payload = Self::payload(&event);
        runtime.spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(event = %event.title(), "Sent notification");
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!(%status, body = %body, "Notification rejected");
                }
                Err(e) => warn!(error = %e, "Failed to send notification"),
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<NotificationEvent>>,
    }

    impl RecordingNotifier {
        pub fn events(&self) -> Vec<NotificationEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: NotificationEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> NotificationEvent {
        NotificationEvent::QuizCreated {
            user: UserId::new("alice"),
            quiz: Some(QuizId::generate()),
            title: "Lifetimes".to_string(),
            questions: 12,
            documents: 2,
            usage: TokenUsage::new(10, 5, 15),
        }
    }

    #[test]
    fn test_created_payload() {
        let payload = serde_json::to_value(WebhookNotifier::payload(&created())).unwrap();
        let embed = &payload["embeds"][0];

        assert_eq!(payload["username"], "quizforge");
        assert_eq!(embed["title"], "Quiz created: Lifetimes");
        assert_eq!(embed["color"], 0x2ECC71);
        assert!(embed.get("description").is_none());
        assert_eq!(embed["fields"].as_array().unwrap().len(), 5);
        assert_eq!(embed["fields"][4]["value"], "15");
    }

    #[test]
    fn test_failure_payload() {
        let event = NotificationEvent::GenerationFailed {
            user: None,
            context: "quiz generation".to_string(),
            error: "no questions generated from any files".to_string(),
        };
        let payload = serde_json::to_value(WebhookNotifier::payload(&event)).unwrap();
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], "Error: quiz generation");
        assert_eq!(embed["color"], 0xFF0000);
        assert!(embed["description"].as_str().unwrap().contains("no questions generated"));
        assert!(embed.get("fields").is_none());
    }

    #[test]
    fn test_invalid_webhook_url() {
        assert!(matches!(
            WebhookNotifier::new("not a url"),
            Err(QuizError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_url() {
        let notifier = WebhookNotifier::new("https://hooks.example.com/secret-path").unwrap();
        let debug = format!("{:?}", notifier);
        assert!(!debug.contains("secret-path"));
    }

    #[test]
    fn test_notify_outside_runtime_is_silent() {
        let notifier = WebhookNotifier::new("https://hooks.example.com/x").unwrap();
        notifier.notify(created());
    }

    #[tokio::test]
    async fn test_notify_returns_immediately() {
        // Unroutable address; delivery fails in the background
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook").unwrap();
        notifier.notify(created());
        NoopNotifier.notify(created());
    }
}
