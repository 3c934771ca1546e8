//! Error events and severities.
//!
//! An [`ErrorEvent`] is either a plain message or a structured exception.
//! Formatting and hash input are defined per variant, so callers never have
//! to inspect the shape of a message at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a logged event.
///
/// Each severity is written to its own log file. The configured qualifying
/// severities decide which of them may trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Exception,
    Critical,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Exception,
        Severity::Critical,
    ];

    /// Lowercase name used for log file names and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Exception => "exception",
            Severity::Critical => "critical",
        }
    }

    /// Severities that notify unless configured otherwise.
    pub fn default_qualifying() -> Vec<Severity> {
        vec![
            Severity::Warning,
            Severity::Error,
            Severity::Exception,
            Severity::Critical,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "exception" => Ok(Severity::Exception),
            "critical" => Ok(Severity::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

/// One frame of a call chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub class: Option<String>,
    pub function: String,
}

impl StackFrame {
    /// Create a frame for a free function.
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            class: None,
            function: function.into(),
        }
    }

    /// Attach the owning type of the function.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}): ", self.file, self.line)?;
        if let Some(class) = &self.class {
            write!(f, "{}::", class)?;
        }
        write!(f, "{}()", self.function)
    }
}

/// A structured exception with its origin and call chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDetails {
    pub class: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub trace: Vec<StackFrame>,
    pub previous: Option<Box<ExceptionDetails>>,
}

impl ExceptionDetails {
    pub fn new(
        class: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            file: file.into(),
            line,
            trace: Vec::new(),
            previous: None,
        }
    }

    pub fn with_trace(mut self, trace: Vec<StackFrame>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_previous(mut self, previous: ExceptionDetails) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// `Class: message in file:line`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} in {}:{}",
            self.class, self.message, self.file, self.line
        )
    }

    /// Iterate over this exception and every previous one, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionDetails> {
        std::iter::successors(Some(self), |e| e.previous.as_deref())
    }
}

/// An event handed to the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorEvent {
    /// A plain text message.
    Message(String),
    /// A structured exception.
    Exception(ExceptionDetails),
}

impl ErrorEvent {
    pub fn message(text: impl Into<String>) -> Self {
        ErrorEvent::Message(text.into())
    }

    /// Human readable text of the event, used for log lines and email bodies.
    pub fn text(&self) -> String {
        match self {
            ErrorEvent::Message(text) => text.clone(),
            ErrorEvent::Exception(details) => details.summary(),
        }
    }

    /// String fed to the normalizer before hashing. Same as [`text`](Self::text),
    /// so an event is deduplicated by what its recipients read.
    pub fn hash_input(&self) -> String {
        self.text()
    }

    /// Call chain attached to the event, empty for plain messages.
    pub fn frames(&self) -> &[StackFrame] {
        match self {
            ErrorEvent::Message(_) => &[],
            ErrorEvent::Exception(details) => &details.trace,
        }
    }

    pub fn as_exception(&self) -> Option<&ExceptionDetails> {
        match self {
            ErrorEvent::Exception(details) => Some(details),
            ErrorEvent::Message(_) => None,
        }
    }
}

impl From<String> for ErrorEvent {
    fn from(text: String) -> Self {
        ErrorEvent::Message(text)
    }
}

impl From<&str> for ErrorEvent {
    fn from(text: &str) -> Self {
        ErrorEvent::Message(text.to_string())
    }
}

impl From<ExceptionDetails> for ErrorEvent {
    fn from(details: ExceptionDetails) -> Self {
        ErrorEvent::Exception(details)
    }
}
