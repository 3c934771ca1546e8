//! Plain per-severity log files.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::application::ports::{LineFormatter, LogSink};
use crate::domain::event::{ErrorEvent, Severity};

/// Separator between the event text and the exception file reference.
pub const EXCEPTION_MARKER: &str = "  @@  ";

/// Formats lines as `[YYYY-MM-DD HH-MM-SS] text`, followed by the exception
/// file name when one was stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLineFormatter;

impl LineFormatter for DefaultLineFormatter {
    fn format(
        &self,
        event: &ErrorEvent,
        timestamp: DateTime<Utc>,
        exception_file: Option<&Path>,
    ) -> String {
        let mut line = format!(
            "[{}] {}",
            timestamp.format("%Y-%m-%d %H-%M-%S"),
            event.text().trim()
        );
        if let Some(name) = exception_file.and_then(Path::file_name) {
            line.push_str(EXCEPTION_MARKER);
            line.push_str(&name.to_string_lossy());
        }
        line
    }
}

/// Appends lines to `<directory>/<prefix><severity>.log`.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    directory: PathBuf,
    prefix: String,
}

impl FileLogSink {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// File that lines of `severity` are appended to.
    pub fn path_for(&self, severity: Severity) -> PathBuf {
        self.directory
            .join(format!("{}{}.log", self.prefix, severity.as_str()))
    }
}

impl LogSink for FileLogSink {
    fn append(&self, severity: Severity, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(severity))?;

        file.lock_exclusive()?;
        let result = file
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        result.and(unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ExceptionDetails;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap()
    }

    #[test]
    fn test_format_plain_message() {
        let line = DefaultLineFormatter.format(&ErrorEvent::message("  disk full \n"), at(), None);
        assert_eq!(line, "[2024-05-01 09-05-07] disk full");
    }

    #[test]
    fn test_format_with_exception_file() {
        let event = ErrorEvent::from(ExceptionDetails::new("DbError", "gone", "/app/db.rs", 3));
        let file = PathBuf::from("/var/log/app/exception--2024-05-01--09-05--01HX.txt");
        let line = DefaultLineFormatter.format(&event, at(), Some(&file));
        assert_eq!(
            line,
            "[2024-05-01 09-05-07] DbError: gone in /app/db.rs:3  @@  exception--2024-05-01--09-05--01HX.txt"
        );
    }

    #[test]
    fn test_append_per_severity() {
        let dir = TempDir::new().unwrap();
        let sink = FileLogSink::new(dir.path(), "app_");

        sink.append(Severity::Error, "first").unwrap();
        sink.append(Severity::Error, "second").unwrap();
        sink.append(Severity::Warning, "other").unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("app_error.log")).unwrap(),
            "first\nsecond\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("app_warning.log")).unwrap(),
            "other\n"
        );
    }

    #[test]
    fn test_append_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let sink = FileLogSink::new(dir.path().join("gone"), "");
        assert!(sink.append(Severity::Error, "x").is_err());
    }
}
