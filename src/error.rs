//! Error types for logging and notification.
//!
//! Only two outcomes reach a caller of [`ErrorLogger::log`](crate::ErrorLogger::log):
//! success, or one of the fatal errors below. Rate limiting is never an
//! error, and failed context lookups are recovered inside the notifier.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Fatal error returned by the logger facade.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log directory does not exist or is not a directory. Nothing was written.
    #[error("log directory {0} is not found or is not a directory")]
    DirectoryNotFound(PathBuf),
    /// The plain log line or the exception file could not be written.
    /// No notification was attempted.
    #[error("failed to write log entry: {0}")]
    Write(#[source] io::Error),
    /// The log line was written but the notification attempt failed.
    #[error("log entry written but notification failed: {source}")]
    Notification {
        #[source]
        source: NotifyError,
        /// Reference to the stored exception file, if any.
        exception_file: Option<PathBuf>,
    },
}

/// Failure of the notification path.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Failure to read, lock or persist the notification ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to lock ledger {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("timed out after {waited:?} waiting for ledger lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
    /// An in-memory store's lock was poisoned by a panicking thread.
    #[error("ledger state poisoned")]
    Poisoned,
}

/// Failure to deliver a notification.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("failed to run mail transport {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("mail transport exited with {status}: {stderr}")]
    Transport { status: String, stderr: String },
    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mail delivery failed: {0}")]
    Other(String),
}

/// Failure of a contextual lookup (request data, user identity, revision).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("context lookup failed: {0}")]
pub struct ContextError(pub String);

impl ContextError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
