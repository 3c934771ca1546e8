//! Notification composition and dispatch.
//!
//! The notifier turns an admitted event into a [`MailMessage`]: the event
//! text, its call chain when there is a real one, the request context with
//! sensitive values masked, and optional identity and revision sections.
//! Contextual lookups are best effort; a failing lookup drops its section
//! and never prevents the notification.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::application::limiter::RequestCounter;
use crate::application::metrics::Metrics;
use crate::application::ports::{ContextProvider, MailMessage, Mailer, RequestContext};
use crate::domain::event::{ErrorEvent, StackFrame};
use crate::error::MailError;

/// Replacement for masked values.
pub const MASK: &str = "*****";

/// Default subject; `{host}` is replaced with the resolved host name.
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "An error occurred on the server {host}";

/// Settings for composing notifications.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub recipients: Vec<String>,
    pub sender: Option<String>,
    pub subject_template: String,
    /// Host name used in the subject when the request does not carry one.
    pub hostname: Option<String>,
    /// Keys whose values are masked, matched case-insensitively.
    pub sensitive_fields: Vec<String>,
    /// Frames are included only when there are more than this many.
    pub min_stack_depth: usize,
    pub include_attachment: bool,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            sender: None,
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            hostname: None,
            sensitive_fields: Vec::new(),
            min_stack_depth: 3,
            include_attachment: true,
        }
    }
}

/// Composes and sends notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    context: Arc<dyn ContextProvider>,
    settings: NotifierSettings,
    request_counter: Arc<RequestCounter>,
    metrics: Metrics,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        context: Arc<dyn ContextProvider>,
        settings: NotifierSettings,
        request_counter: Arc<RequestCounter>,
        metrics: Metrics,
    ) -> Self {
        let sensitive_fields = settings
            .sensitive_fields
            .iter()
            .map(|f| f.to_ascii_lowercase())
            .collect();
        Self {
            mailer,
            context,
            settings: NotifierSettings {
                sensitive_fields,
                ..settings
            },
            request_counter,
            metrics,
        }
    }

    pub fn recipients(&self) -> &[String] {
        &self.settings.recipients
    }

    /// Compose and send a notification for `event`.
    ///
    /// On success the request counter is incremented.
    ///
    /// # Errors
    /// Returns the mailer's error unchanged.
    pub fn notify(&self, event: &ErrorEvent, exception_file: Option<&Path>) -> Result<(), MailError> {
        let message = self.compose(event, exception_file);

        match self.mailer.send(&message) {
            Ok(()) => {
                self.request_counter.increment();
                self.metrics.record_sent();
                tracing::info!(
                    target: "alert_throttle",
                    recipients = message.recipients.len(),
                    subject = %message.subject,
                    "error notification sent"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.record_delivery_failure();
                Err(e)
            }
        }
    }

    /// Build the message without sending it.
    pub fn compose(&self, event: &ErrorEvent, exception_file: Option<&Path>) -> MailMessage {
        let request = match self.context.request() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(target: "alert_throttle", error = %e, "request context unavailable");
                None
            }
        };

        let mut body = event.text();

        let frames = event.frames();
        if frames.len() > self.settings.min_stack_depth {
            body.push_str("\n\n");
            body.push_str(&render_frames(frames));
        }

        body.push_str("\n\n");
        if let Some(request) = &request {
            body.push_str(&self.render_request(request));
        }

        match self.context.user_identity() {
            Ok(Some(identity)) => {
                let _ = write!(body, "User: {}\n\n", identity);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "alert_throttle", error = %e, "user identity unavailable");
            }
        }

        match self.context.vcs_revision() {
            Ok(Some(revision)) => {
                let _ = write!(body, "Revision: {}\n\n", revision);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "alert_throttle", error = %e, "revision unavailable");
            }
        }

        let attachment = if self.settings.include_attachment {
            exception_file.map(Path::to_path_buf)
        } else {
            None
        };

        MailMessage {
            recipients: self.settings.recipients.clone(),
            sender: self.settings.sender.clone(),
            subject: self.subject(request.as_ref()),
            body: body.trim_end().to_string(),
            attachment,
        }
    }

    fn subject(&self, request: Option<&RequestContext>) -> String {
        let host = self
            .settings
            .hostname
            .clone()
            .or_else(|| request.and_then(|r| r.host.clone()))
            .or_else(|| {
                hostname::get()
                    .ok()
                    .map(|h| h.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "localhost".to_string());
        self.settings.subject_template.replace("{host}", &host)
    }

    fn render_request(&self, request: &RequestContext) -> String {
        let mut out = String::new();
        if let Some(host) = &request.host {
            let _ = writeln!(out, "LINK: {}{}", host, request.uri.as_deref().unwrap_or(""));
        }
        let _ = write!(out, "SERVER: {}\n\n", self.render_map(&request.environment));
        let _ = write!(out, "GET: {}\n\n", self.render_map(&request.query));
        let _ = write!(out, "POST: {}\n\n", self.render_map(&request.body));
        out
    }

    fn render_map(&self, values: &BTreeMap<String, String>) -> String {
        let masked: BTreeMap<&str, &str> = values
            .iter()
            .map(|(key, value)| {
                if self.is_sensitive(key) {
                    (key.as_str(), MASK)
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();
        serde_json::to_string_pretty(&masked).unwrap_or_else(|_| "{}".to_string())
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.settings.sensitive_fields.iter().any(|f| *f == key)
    }
}

fn render_frames(frames: &[StackFrame]) -> String {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| format!("#{} {}\n", i, frame))
        .collect()
}
