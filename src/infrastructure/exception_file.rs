//! Exception detail files.
//!
//! Every logged exception gets its own plain-text report next to the log
//! files. The report is what gets attached to notifications.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use ulid::Ulid;

use crate::application::ports::ExceptionStore;
use crate::domain::event::ExceptionDetails;

/// Writes `<directory>/exception--YYYY-MM-DD--HH-MM--<ulid>.txt`.
#[derive(Debug, Clone)]
pub struct FileExceptionStore {
    directory: PathBuf,
}

impl FileExceptionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

/// Plain-text report of an exception and every previous one.
pub fn render_report(details: &ExceptionDetails, timestamp: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Time: {}", timestamp.to_rfc3339());

    for (depth, exception) in details.chain().enumerate() {
        if depth > 0 {
            out.push_str("\nCaused by:\n");
        }
        let _ = writeln!(out, "Class: {}", exception.class);
        let _ = writeln!(out, "Message: {}", exception.message);
        let _ = writeln!(out, "Location: {}:{}", exception.file, exception.line);
        if !exception.trace.is_empty() {
            out.push_str("Trace:\n");
            for (i, frame) in exception.trace.iter().enumerate() {
                let _ = writeln!(out, "#{} {}", i, frame);
            }
        }
    }
    out
}

impl ExceptionStore for FileExceptionStore {
    fn store(&self, details: &ExceptionDetails, timestamp: DateTime<Utc>) -> io::Result<PathBuf> {
        let name = format!(
            "exception--{}--{}.txt",
            timestamp.format("%Y-%m-%d--%H-%M"),
            Ulid::new()
        );
        let path = self.directory.join(name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(render_report(details, timestamp).as_bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::StackFrame;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn details() -> ExceptionDetails {
        ExceptionDetails::new("SaveError", "cannot save", "/app/save.rs", 12)
            .with_trace(vec![
                StackFrame::new("/app/save.rs", 12, "save").with_class("Repo"),
                StackFrame::new("/app/main.rs", 4, "main"),
            ])
            .with_previous(ExceptionDetails::new("IoError", "disk full", "/app/io.rs", 7))
    }

    #[test]
    fn test_store_writes_named_report() {
        let dir = TempDir::new().unwrap();
        let store = FileExceptionStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap();

        let path = store.store(&details(), at).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("exception--2024-05-01--09-05--"));
        assert!(name.ends_with(".txt"));

        let report = fs::read_to_string(&path).unwrap();
        assert!(report.contains("Class: SaveError"));
        assert!(report.contains("#0 /app/save.rs(12): Repo::save()"));
        assert!(report.contains("Caused by:\nClass: IoError"));
    }

    #[test]
    fn test_store_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileExceptionStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap();

        let first = store.store(&details(), at).unwrap();
        let second = store.store(&details(), at).unwrap();
        assert_ne!(first, second);
    }
}
