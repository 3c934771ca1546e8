//! # alert-throttle
//!
//! File-based error logging with deduplicated, rate-limited email
//! notification.
//!
//! Every event is appended to a per-severity log file. Events of a
//! qualifying severity are then normalized, hashed and checked against a
//! ledger shared by every process logging to the same directory. An event
//! is notified only if its normalized form was not already notified in the
//! current window, the window cap is not exhausted, and the current
//! invocation has not used up its own cap.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alert_throttle::{ErrorLogger, ExceptionDetails, LoggerConfig, Severity};
//!
//! let config = LoggerConfig::load("/etc/app/alert-throttle.toml").unwrap();
//! let logger = ErrorLogger::new(config).unwrap();
//!
//! logger.log_message("payment gateway timed out", Severity::Error).unwrap();
//!
//! let details = ExceptionDetails::new("DbError", "connection reset", "src/db.rs", 88);
//! logger.log_exception(details, Severity::Exception).unwrap();
//! ```
//!
//! ## Normalization
//!
//! Before hashing, volatile substrings are stripped so that the same error
//! raised with a different process id, line number or path is recognized
//! as a duplicate:
//!
//! ```rust
//! use alert_throttle::Normalizer;
//!
//! let normalizer = Normalizer::default();
//! assert_eq!(
//!     normalizer.hash("worker pid 4411 died after 30s"),
//!     normalizer.hash("worker pid 907 died after 12s"),
//! );
//! ```
//!
//! ## Windows
//!
//! The window bounding duplicate suppression and the daily cap ends at
//! midnight (host local time by default, or a fixed UTC offset) or a fixed
//! duration after the first notification. See [`ResetPolicy`].
//!
//! ## Sharing the ledger
//!
//! The default [`FileLedgerStore`] keeps the ledger in `<directory>/email-sent`
//! and holds an exclusive advisory lock for each read-modify-write, so many
//! processes can log to the same directory. A single long-running process
//! may use [`InMemoryLedgerStore`] instead and call
//! [`ErrorLogger::begin_request`] at the start of every request.
//!
//! ## Tracing
//!
//! [`ErrorLoggerLayer`] forwards `tracing` events at `WARN` and above to an
//! `ErrorLogger`, using the active span scope as the call chain.
//!
//! ## Observability
//!
//! [`ErrorLogger::metrics`] exposes counters for written lines, sent
//! notifications, suppressions by reason, and ledger or delivery failures.
//! Internal diagnostics are emitted with `tracing` under the
//! `alert_throttle` target.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use domain::{
    event::{ErrorEvent, ExceptionDetails, ParseSeverityError, Severity, StackFrame},
    ledger::{LedgerFormat, LedgerState},
    normalizer::{MessageHash, NormalizationRule, Normalizer, PatternError},
    policy::{NotificationLimits, PolicyDecision, PolicyError, ResetPolicy, SuppressReason},
};

pub use application::{
    limiter::{RateLimiter, RequestCounter},
    logger::{ErrorLogger, ErrorLoggerBuilder, LogOutcome, Notification, SkipReason},
    metrics::{Metrics, MetricsSnapshot},
    notifier::{Notifier, NotifierSettings},
    ports::{
        Clock, ContextProvider, ExceptionStore, LedgerStore, LineFormatter, LogSink, MailMessage,
        Mailer, NoContext, RequestContext,
    },
};

pub use config::{ConfigError, LoggerConfig, NormalizationConfig, ResetConfig};
pub use error::{ContextError, LedgerError, LogError, MailError, NotifyError};

pub use infrastructure::{
    clock::SystemClock,
    exception_file::FileExceptionStore,
    layer::{ErrorLoggerLayer, ErrorLoggerLayerBuilder},
    ledger_store::{FileLedgerStore, InMemoryLedgerStore},
    log_file::{DefaultLineFormatter, FileLogSink},
    mailer::{MimeMessage, SendmailMailer},
};
