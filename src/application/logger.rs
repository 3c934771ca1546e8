//! The logger facade.
//!
//! [`ErrorLogger`] is the entry point. Every call writes the event to its
//! severity's log file; qualifying events then go through hashing, the rate
//! limiter and the notifier. Rate limiting never surfaces as an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::limiter::RateLimiter;
use crate::application::metrics::Metrics;
use crate::application::notifier::{Notifier, NotifierSettings};
use crate::application::ports::{
    Clock, ContextProvider, ExceptionStore, LedgerStore, LineFormatter, LogSink, Mailer, NoContext,
};
use crate::config::{ConfigError, LoggerConfig};
use crate::domain::event::{ErrorEvent, ExceptionDetails, Severity};
use crate::domain::ledger::LedgerState;
use crate::domain::normalizer::Normalizer;
use crate::domain::policy::{PolicyDecision, SuppressReason};
use crate::error::{LedgerError, LogError, NotifyError};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::exception_file::FileExceptionStore;
use crate::infrastructure::ledger_store::FileLedgerStore;
use crate::infrastructure::log_file::{DefaultLineFormatter, FileLogSink};
use crate::infrastructure::mailer::SendmailMailer;

/// Result of a successful [`ErrorLogger::log`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutcome {
    /// Exception detail file written for exception events.
    pub exception_file: Option<PathBuf>,
    pub notification: Notification,
}

/// What happened on the notification path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Sent,
    Skipped(SkipReason),
}

impl Notification {
    pub fn is_sent(&self) -> bool {
        matches!(self, Notification::Sent)
    }
}

/// Why no notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The severity is not configured to notify.
    NotQualifying,
    /// No mailer is configured.
    NoMailer,
    /// No recipients are configured.
    NoRecipients,
    /// The rate limiter rejected the event.
    Suppressed(SuppressReason),
}

/// Builder for constructing an [`ErrorLogger`].
///
/// Every capability has a file-based default derived from the
/// configuration. No mailer is used unless one is injected or
/// `sendmail_path` is configured.
#[derive(Debug)]
pub struct ErrorLoggerBuilder {
    config: LoggerConfig,
    clock: Option<Arc<dyn Clock>>,
    ledger_store: Option<Arc<dyn LedgerStore>>,
    log_sink: Option<Arc<dyn LogSink>>,
    line_formatter: Option<Arc<dyn LineFormatter>>,
    exception_store: Option<Arc<dyn ExceptionStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    context: Option<Arc<dyn ContextProvider>>,
}

impl ErrorLoggerBuilder {
    /// Set the mail transport.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Set the source of request, identity and revision data.
    pub fn with_context_provider(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the file ledger, e.g. with an
    /// [`InMemoryLedgerStore`](crate::infrastructure::ledger_store::InMemoryLedgerStore)
    /// in a long-running process.
    pub fn with_ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger_store = Some(store);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn with_line_formatter(mut self, formatter: Arc<dyn LineFormatter>) -> Self {
        self.line_formatter = Some(formatter);
        self
    }

    pub fn with_exception_store(mut self, store: Arc<dyn ExceptionStore>) -> Self {
        self.exception_store = Some(store);
        self
    }

    /// Build the logger.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn build(self) -> Result<ErrorLogger, ConfigError> {
        let config = self.config;
        config.validate()?;

        let normalizer = config.normalization.build()?;
        let reset_policy = config.reset.to_policy()?;
        let metrics = Metrics::new();

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let ledger_store = self.ledger_store.unwrap_or_else(|| {
            let store = FileLedgerStore::new(config.ledger_path());
            match config.lock_timeout() {
                Some(timeout) => Arc::new(store.with_lock_timeout(timeout)),
                None => Arc::new(store),
            }
        });

        let limiter = RateLimiter::new(
            ledger_store,
            Arc::clone(&clock),
            reset_policy,
            config.limits(),
            metrics.clone(),
        );

        let mailer = self.mailer.or_else(|| {
            config
                .sendmail_path
                .as_ref()
                .map(|path| Arc::new(SendmailMailer::with_program(path)) as Arc<dyn Mailer>)
        });
        let notifier = mailer.map(|mailer| {
            Notifier::new(
                mailer,
                self.context.unwrap_or_else(|| Arc::new(NoContext)),
                NotifierSettings {
                    recipients: config.recipients.clone(),
                    sender: config.sender.clone(),
                    subject_template: config.subject_template.clone(),
                    hostname: config.hostname.clone(),
                    sensitive_fields: config.sensitive_fields.clone(),
                    min_stack_depth: config.min_stack_depth,
                    include_attachment: config.include_exception_attachment,
                },
                Arc::clone(limiter.request_counter()),
                metrics.clone(),
            )
        });

        Ok(ErrorLogger {
            log_sink: self.log_sink.unwrap_or_else(|| {
                Arc::new(FileLogSink::new(&config.directory, &config.log_file_prefix))
            }),
            line_formatter: self
                .line_formatter
                .unwrap_or_else(|| Arc::new(DefaultLineFormatter)),
            exception_store: self
                .exception_store
                .unwrap_or_else(|| Arc::new(FileExceptionStore::new(&config.directory))),
            clock,
            normalizer,
            limiter,
            notifier,
            metrics,
            config,
        })
    }
}

/// Writes error logs and sends throttled notifications.
///
/// # Example
/// ```no_run
/// use alert_throttle::{ErrorLogger, LoggerConfig, Severity};
///
/// let mut config = LoggerConfig::new("/var/log/app");
/// config.recipients = vec!["ops@example.com".to_string()];
/// config.sendmail_path = Some("/usr/sbin/sendmail".into());
///
/// let logger = ErrorLogger::new(config).unwrap();
/// logger.log_message("payment gateway timed out", Severity::Error).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ErrorLogger {
    config: LoggerConfig,
    normalizer: Normalizer,
    clock: Arc<dyn Clock>,
    log_sink: Arc<dyn LogSink>,
    line_formatter: Arc<dyn LineFormatter>,
    exception_store: Arc<dyn ExceptionStore>,
    limiter: RateLimiter,
    notifier: Option<Notifier>,
    metrics: Metrics,
}

impl ErrorLogger {
    /// Create a builder for `config`.
    pub fn builder(config: LoggerConfig) -> ErrorLoggerBuilder {
        ErrorLoggerBuilder {
            config,
            clock: None,
            ledger_store: None,
            log_sink: None,
            line_formatter: None,
            exception_store: None,
            mailer: None,
            context: None,
        }
    }

    /// Build a logger with default capabilities.
    pub fn new(config: LoggerConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Log `event` at `severity` and notify if it qualifies.
    ///
    /// # Errors
    /// - `DirectoryNotFound` if the log directory is missing; nothing is written.
    /// - `Write` if the exception file or the log line cannot be written.
    /// - `Notification` if the line was written but the ledger or the mailer failed.
    pub fn log(&self, event: &ErrorEvent, severity: Severity) -> Result<LogOutcome, LogError> {
        if !self.config.directory.is_dir() {
            return Err(LogError::DirectoryNotFound(self.config.directory.clone()));
        }

        let now = self.clock.now();
        let exception_file = match event.as_exception() {
            Some(details) => Some(
                self.exception_store
                    .store(details, now)
                    .map_err(LogError::Write)?,
            ),
            None => None,
        };

        let line = self
            .line_formatter
            .format(event, now, exception_file.as_deref());
        self.log_sink
            .append(severity, &line)
            .map_err(LogError::Write)?;
        self.metrics.record_line_written();

        match self.notify(event, severity, exception_file.as_deref()) {
            Ok(notification) => Ok(LogOutcome {
                exception_file,
                notification,
            }),
            Err(source) => {
                tracing::warn!(
                    target: "alert_throttle",
                    error = %source,
                    severity = %severity,
                    "error logged but notification failed"
                );
                Err(LogError::Notification {
                    source,
                    exception_file,
                })
            }
        }
    }

    /// Log a plain message.
    pub fn log_message(&self, text: &str, severity: Severity) -> Result<LogOutcome, LogError> {
        self.log(&ErrorEvent::message(text), severity)
    }

    /// Log an exception.
    pub fn log_exception(
        &self,
        details: ExceptionDetails,
        severity: Severity,
    ) -> Result<LogOutcome, LogError> {
        self.log(&ErrorEvent::Exception(details), severity)
    }

    fn notify(
        &self,
        event: &ErrorEvent,
        severity: Severity,
        exception_file: Option<&Path>,
    ) -> Result<Notification, NotifyError> {
        if !self.config.qualifies(severity) {
            return Ok(Notification::Skipped(SkipReason::NotQualifying));
        }
        let Some(notifier) = &self.notifier else {
            return Ok(Notification::Skipped(SkipReason::NoMailer));
        };
        if notifier.recipients().is_empty() {
            return Ok(Notification::Skipped(SkipReason::NoRecipients));
        }

        let hash = self.normalizer.hash_event(event);
        match self.limiter.check(&hash)? {
            PolicyDecision::Allow => {
                notifier.notify(event, exception_file)?;
                Ok(Notification::Sent)
            }
            PolicyDecision::Suppress(reason) => {
                tracing::debug!(
                    target: "alert_throttle",
                    hash = %hash,
                    reason = reason.as_str(),
                    "notification suppressed"
                );
                Ok(Notification::Skipped(SkipReason::Suppressed(reason)))
            }
        }
    }

    /// Start a new invocation in a long-running process.
    pub fn begin_request(&self) {
        self.limiter.begin_request();
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Current ledger contents.
    pub fn ledger_snapshot(&self) -> Result<LedgerState, LedgerError> {
        self.limiter.store().snapshot()
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}
