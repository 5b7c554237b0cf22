//! Best-effort error reporting.
//!
//! [`ErrorReporter::report`] logs an error and forwards it to an optional
//! [`Notifier`]. Neither step returns an error to the caller: a notifier's
//! `Err` is logged at debug level and dropped. A notifier that panics is not
//! caught; implementations must report failure through their `Result`.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, sync::Arc};

use crate::error::{Details, ServiceError};

/// External sink that receives reported errors (webhook, telemetry service...).
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn notify(&self, error: &ServiceError) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    notifier: Option<Arc<dyn Notifier>>,
}

impl ErrorReporter {
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { notifier }
    }

    /// Reporter that only logs.
    pub fn log_only() -> Self {
        Self::default()
    }

    pub async fn report(&self, message: impl Into<String>, status: Option<u16>, details: Details) {
        let mut error = ServiceError::new(message).with_details(details);
        if let Some(status) = status {
            error = error.with_status(status);
        }

        log_error(&error);
        self.notify(&error).await;
    }

    /// Drops an `Err` from the notifier. Panics propagate.
    async fn notify(&self, error: &ServiceError) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        if let Err(e) = notifier.notify(error).await {
            tracing::debug!("Error notification failed: {e:#}");
        }
    }
}

fn log_error(error: &ServiceError) {
    tracing::error!("{}", render_log_line(error));
}

/// `[ErrorHandler] ServiceError: <message> | Status: <status> | Details: <details>`
pub fn render_log_line(error: &ServiceError) -> String {
    let details = if error.details.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&error.details).unwrap_or_default()
    };

    format!(
        "[ErrorHandler] ServiceError: {} | Status: {} | Details: {}",
        error.message, error.status, details
    )
}

/// POSTs each reported error as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, error: &ServiceError) -> Result<()> {
        let res = self
            .http
            .post(&self.url)
            .json(error)
            .send()
            .await
            .context("Failed to send error notification")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Error notification rejected with status {status}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Default)]
    struct Recording {
        seen: Mutex<Vec<ServiceError>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(&self, error: &ServiceError) -> Result<()> {
            self.seen.lock().push(error.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Failing {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _error: &ServiceError) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("notify failed"))
        }
    }

    fn details(pairs: serde_json::Value) -> Details {
        pairs.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn log_line_includes_message_status_and_details() {
        let err = ServiceError::new("Boom!")
            .with_status(503)
            .with_details(details(json!({ "service": "payments" })));

        assert_eq!(
            render_log_line(&err),
            r#"[ErrorHandler] ServiceError: Boom! | Status: 503 | Details: {"service":"payments"}"#
        );
    }

    #[test]
    fn log_line_leaves_empty_details_blank() {
        let err = ServiceError::new("Oops");

        assert_eq!(
            render_log_line(&err),
            "[ErrorHandler] ServiceError: Oops | Status: 500 | Details: "
        );
    }

    #[tokio::test]
    async fn report_builds_service_error_and_notifies() {
        let recording = Arc::new(Recording::default());
        let reporter = ErrorReporter::new(Some(recording.clone()));

        reporter
            .report("Boom!", Some(422), details(json!({ "foo": "bar" })))
            .await;

        let seen = recording.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "Boom!");
        assert_eq!(seen[0].status, 422);
        assert_eq!(seen[0].details.get("foo"), Some(&json!("bar")));
    }

    #[tokio::test]
    async fn missing_status_falls_back_to_default() {
        let recording = Arc::new(Recording::default());
        let reporter = ErrorReporter::new(Some(recording.clone()));

        reporter.report("Boom!", None, Details::new()).await;

        assert_eq!(recording.seen.lock()[0].status, ServiceError::DEFAULT_STATUS);
    }

    #[tokio::test]
    async fn failing_notifier_is_swallowed() {
        let failing = Arc::new(Failing::default());
        let reporter = ErrorReporter::new(Some(failing.clone()));

        reporter.report("Boom!", None, Details::new()).await;
        reporter.report("Boom again!", Some(503), Details::new()).await;

        assert_eq!(failing.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_notifier_is_a_no_op() {
        ErrorReporter::log_only()
            .report("Boom!", Some(400), Details::new())
            .await;
    }

    #[tokio::test]
    async fn webhook_posts_error_as_json() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hooks/errors"))
            .and(body_partial_json(json!({ "message": "Boom!", "status": 400 })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hooks/errors", server.uri()));
        let err = ServiceError::new("Boom!").with_status(400);

        notifier.notify(&err).await.expect("webhook accepted");
    }

    #[tokio::test]
    async fn webhook_rejection_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri());

        assert!(notifier.notify(&ServiceError::new("Boom!")).await.is_err());
    }

    #[tokio::test]
    async fn reporter_survives_webhook_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = ErrorReporter::new(Some(Arc::new(WebhookNotifier::new(server.uri()))));

        reporter.report("Boom!", None, Details::new()).await;
    }
}
