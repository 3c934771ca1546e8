//! Basic example demonstrating deduplicated, capped notifications.
//!
//! Logs a burst of errors into a scratch directory. The mailer prints
//! instead of sending, so the example runs anywhere.

use alert_throttle::{
    ErrorLogger, ExceptionDetails, LoggerConfig, MailError, MailMessage, Mailer, Severity,
    StackFrame,
};
use std::sync::Arc;

#[derive(Debug)]
struct PrintMailer;

impl Mailer for PrintMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        println!("--- mail to {} ---", message.recipients.join(", "));
        println!("Subject: {}\n\n{}\n", message.subject, message.body);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("alert-throttle-demo");
    std::fs::create_dir_all(&dir)?;

    let mut config = LoggerConfig::new(&dir);
    config.recipients = vec!["ops@example.com".to_string()];
    config.max_per_day = 3;

    let logger = ErrorLogger::builder(config)
        .with_mailer(Arc::new(PrintMailer))
        .build()?;

    println!("=== Duplicate suppression ===\n");
    for pid in [101, 202, 303] {
        let outcome = logger.log_message(
            &format!("worker pid {} lost its database connection", pid),
            Severity::Error,
        )?;
        println!("pid {}: {:?}", pid, outcome.notification);
    }

    println!("\n=== Exceptions ===\n");
    let details = ExceptionDetails::new("ImportError", "row 17 is malformed", "src/import.rs", 88)
        .with_trace(vec![
            StackFrame::new("src/import.rs", 88, "parse_row").with_class("Importer"),
            StackFrame::new("src/import.rs", 40, "run").with_class("Importer"),
            StackFrame::new("src/jobs.rs", 12, "dispatch"),
            StackFrame::new("src/main.rs", 5, "main"),
        ]);
    let outcome = logger.log_exception(details, Severity::Exception)?;
    println!("stored {:?}", outcome.exception_file);

    println!("\n=== Metrics ===\n");
    println!("{:?}", logger.metrics().snapshot());
    println!("ledger: {:?}", logger.ledger_snapshot()?);

    Ok(())
}
