// src/services/notify.rs

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Upper bound for one relay call, connect included.
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Mail templates the core triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    ExamSubmitted,
    GradeRecorded,
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Outbound notifications. Callers treat failures as non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to_email: &str, template: Template, data: Value)
    -> Result<(), NotifyError>;
}

/// Sends and only logs a failure; the triggering operation has already committed.
pub async fn send_best_effort(notifier: &dyn Notifier, to_email: &str, template: Template, data: Value) {
    if let Err(e) = notifier.send(to_email, template, data).await {
        tracing::warn!(?template, to = %to_email, "{}", e);
    }
}

/// Posts notifications as JSON to a mail relay.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_timeout(endpoint, Duration::from_secs(NOTIFY_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    to: &'a str,
    template: Template,
    data: Value,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        to_email: &str,
        template: Template,
        data: Value,
    ) -> Result<(), NotifyError> {
        self.client
            .post(&self.endpoint)
            .json(&WebhookBody {
                to: to_email,
                template,
                data,
            })
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| NotifyError(e.to_string()))?;

        tracing::debug!(?template, to = %to_email, "Notification delivered");
        Ok(())
    }
}

/// Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        to_email: &str,
        template: Template,
        data: Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(?template, to = %to_email, %data, "Notification (not delivered, no relay configured)");
        Ok(())
    }
}
