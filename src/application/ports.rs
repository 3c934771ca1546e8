//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports; tests swap in
//! the mocks from `crate::infrastructure::mocks`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::event::{ErrorEvent, ExceptionDetails, Severity};
use crate::domain::ledger::LedgerState;
use crate::error::{ContextError, LedgerError, MailError};

/// Port for obtaining the current wall-clock time.
///
/// Windows are persisted and shared between processes, so the clock is
/// wall time rather than a monotonic instant.
pub trait Clock: Send + Sync + Debug {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Port for the shared notification ledger.
///
/// Implementations must run each `transact` call as one critical section
/// that excludes every other writer of the same ledger, including writers
/// in other processes.
pub trait LedgerStore: Send + Sync + Debug {
    /// Load the ledger, hand it to `update`, and persist it if `update`
    /// returns `true` or the stored content had to be migrated.
    fn transact(
        &self,
        update: &mut dyn FnMut(&mut LedgerState) -> bool,
    ) -> Result<(), LedgerError>;

    /// Read the current ledger without modifying it.
    fn snapshot(&self) -> Result<LedgerState, LedgerError>;
}

/// Port for appending formatted lines to per-severity logs.
pub trait LogSink: Send + Sync + Debug {
    /// Append one line. The sink adds the line terminator.
    fn append(&self, severity: Severity, line: &str) -> io::Result<()>;
}

/// Port for turning an event into a single log line.
pub trait LineFormatter: Send + Sync + Debug {
    fn format(
        &self,
        event: &ErrorEvent,
        timestamp: DateTime<Utc>,
        exception_file: Option<&Path>,
    ) -> String;
}

/// Port for persisting exception details.
pub trait ExceptionStore: Send + Sync + Debug {
    /// Store the exception and return the path of the written file.
    fn store(&self, details: &ExceptionDetails, timestamp: DateTime<Utc>) -> io::Result<PathBuf>;
}

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub recipients: Vec<String>,
    pub sender: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

/// Port for delivering notifications.
pub trait Mailer: Send + Sync + Debug {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Request data attached to notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub host: Option<String>,
    pub uri: Option<String>,
    /// Server/process environment.
    pub environment: BTreeMap<String, String>,
    /// Query string parameters.
    pub query: BTreeMap<String, String>,
    /// Body parameters.
    pub body: BTreeMap<String, String>,
}

/// Port for contextual lookups made while composing a notification.
///
/// Every lookup may fail; the notifier omits the section in that case.
pub trait ContextProvider: Send + Sync + Debug {
    fn request(&self) -> Result<Option<RequestContext>, ContextError> {
        Ok(None)
    }

    fn user_identity(&self) -> Result<Option<String>, ContextError> {
        Ok(None)
    }

    fn vcs_revision(&self) -> Result<Option<String>, ContextError> {
        Ok(None)
    }
}

/// Context provider that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextProvider for NoContext {}
