use alert_throttle::infrastructure::mocks::{MockClock, RecordingMailer, StaticContext};
use alert_throttle::{
    Clock, ErrorLogger, ExceptionDetails, LedgerState, LogError, LoggerConfig, Notification,
    RequestContext, ResetConfig, Severity, SkipReason, StackFrame, SuppressReason,
};
use chrono::{Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn config(dir: &TempDir, max_per_day: u32, max_per_request: u32) -> LoggerConfig {
    let mut config = LoggerConfig::new(dir.path());
    config.recipients = vec!["ops@example.com".to_string()];
    config.hostname = Some("web-1".to_string());
    config.max_per_day = max_per_day;
    config.max_per_request = max_per_request;
    config
}

fn logger(config: LoggerConfig, mailer: &RecordingMailer, clock: &MockClock) -> ErrorLogger {
    ErrorLogger::builder(config)
        .with_mailer(Arc::new(mailer.clone()))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

fn clock() -> MockClock {
    MockClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
}

fn lines(dir: &TempDir, name: &str) -> usize {
    fs::read_to_string(dir.path().join(name))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[test]
fn test_daily_cap_scenario() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let logger = logger(config(&dir, 2, 10), &mailer, &clock());

    let outcomes: Vec<Notification> = ["db down", "cache down", "queue down"]
        .iter()
        .map(|m| logger.log_message(m, Severity::Error).unwrap().notification)
        .collect();

    assert_eq!(
        outcomes,
        vec![
            Notification::Sent,
            Notification::Sent,
            Notification::Skipped(SkipReason::Suppressed(SuppressReason::DailyCap)),
        ]
    );
    assert_eq!(lines(&dir, "error.log"), 3);
    assert_eq!(mailer.count(), 2);
    assert_eq!(logger.ledger_snapshot().unwrap().daily_count, 2);
}

#[test]
fn test_request_cap() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let logger = logger(config(&dir, 100, 3), &mailer, &clock());

    for i in 0..4 {
        logger
            .log_message(&format!("failure kind {}", ["a", "b", "c", "d"][i]), Severity::Error)
            .unwrap();
    }
    assert_eq!(mailer.count(), 3);
    assert_eq!(logger.metrics().suppressed(SuppressReason::RequestCap), 1);

    logger.begin_request();
    logger.log_message("failure kind e", Severity::Error).unwrap();
    assert_eq!(mailer.count(), 4);
}

#[test]
fn test_request_cap_is_per_logger_instance() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let clock = clock();

    let first = logger(config(&dir, 100, 1), &mailer, &clock);
    first.log_message("first process", Severity::Error).unwrap();

    // A second process sharing the same directory has its own request cap.
    let second = logger(config(&dir, 100, 1), &mailer, &clock);
    second.log_message("second process", Severity::Error).unwrap();

    assert_eq!(mailer.count(), 2);
    assert_eq!(second.ledger_snapshot().unwrap().daily_count, 2);
}

#[test]
fn test_duplicates_are_shared_between_loggers() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let clock = clock();

    logger(config(&dir, 10, 10), &mailer, &clock)
        .log_message("Undefined index: id in /var/www/a/Model.php:42", Severity::Warning)
        .unwrap();
    let outcome = logger(config(&dir, 10, 10), &mailer, &clock)
        .log_message("Undefined index: id in /var/www/b/Model.php:57", Severity::Warning)
        .unwrap();

    assert_eq!(
        outcome.notification,
        Notification::Skipped(SkipReason::Suppressed(SuppressReason::Duplicate))
    );
    assert_eq!(mailer.count(), 1);
    assert_eq!(lines(&dir, "warning.log"), 2);
}

#[test]
fn test_midnight_reset_makes_duplicates_eligible() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 23, 50, 0).unwrap());
    let mut cfg = config(&dir, 10, 10);
    cfg.reset = ResetConfig::Midnight {
        utc_offset_minutes: Some(0),
    };
    let logger = logger(cfg, &mailer, &clock);

    logger.log_message("nightly job failed", Severity::Error).unwrap();
    logger.log_message("nightly job failed", Severity::Error).unwrap();
    assert_eq!(mailer.count(), 1);

    clock.advance(Duration::minutes(15));
    logger.log_message("nightly job failed", Severity::Error).unwrap();

    assert_eq!(mailer.count(), 2);
    let ledger = logger.ledger_snapshot().unwrap();
    assert_eq!(ledger.daily_count, 1);
    assert_eq!(ledger.window_start, Some(clock.now()));
}

#[test]
fn test_corrupt_ledger_still_logs_and_sends() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("email-sent"), "\u{0}garbage{{{not json").unwrap();
    let mailer = RecordingMailer::new();
    let logger = logger(config(&dir, 10, 10), &mailer, &clock());

    let outcome = logger.log_message("db down", Severity::Error).unwrap();

    assert_eq!(outcome.notification, Notification::Sent);
    assert_eq!(lines(&dir, "error.log"), 1);
    let content = fs::read_to_string(dir.path().join("email-sent")).unwrap();
    assert!(content.starts_with("{\"version\":1"));
}

#[test]
fn test_legacy_ledger_suppresses_until_reset() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let clock = clock();
    let mut cfg = config(&dir, 10, 10);
    cfg.reset = ResetConfig::Midnight {
        utc_offset_minutes: Some(0),
    };
    let logger = logger(cfg, &mailer, &clock);
    let hash = logger.normalizer().hash("db down");
    fs::write(dir.path().join("email-sent"), format!("{}\n", hash)).unwrap();

    let outcome = logger.log_message("db down", Severity::Error).unwrap();

    assert_eq!(
        outcome.notification,
        Notification::Skipped(SkipReason::Suppressed(SuppressReason::Duplicate))
    );
    let ledger: LedgerState = logger.ledger_snapshot().unwrap();
    assert!(ledger.contains(&hash));
    assert_eq!(ledger.daily_count, 0);
    assert_eq!(ledger.window_start, Some(clock.now()));

    clock.advance(Duration::days(1));
    let outcome = logger.log_message("db down", Severity::Error).unwrap();

    assert_eq!(outcome.notification, Notification::Sent);
    assert_eq!(mailer.count(), 1);
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let mut cfg = config(&dir, 10, 10);
    cfg.directory = dir.path().join("not-there");
    let logger = logger(cfg, &mailer, &clock());

    assert!(matches!(
        logger.log_message("x", Severity::Error),
        Err(LogError::DirectoryNotFound(_))
    ));
    assert_eq!(mailer.count(), 0);
}

#[test]
fn test_unwritable_ledger_keeps_log_line() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    // A directory where the ledger file should be makes every ledger open fail.
    fs::create_dir(dir.path().join("email-sent")).unwrap();
    let logger = logger(config(&dir, 10, 10), &mailer, &clock());

    let err = logger.log_message("db down", Severity::Error).unwrap_err();

    assert!(matches!(err, LogError::Notification { .. }));
    assert_eq!(lines(&dir, "error.log"), 1);
    assert_eq!(mailer.count(), 0);
    assert_eq!(logger.metrics().ledger_failures(), 1);
}

#[test]
fn test_notification_content() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let mut cfg = config(&dir, 10, 10);
    cfg.sensitive_fields = vec!["password".to_string()];
    let context = StaticContext::default()
        .with_request(RequestContext {
            host: Some("shop.example.com".to_string()),
            uri: Some("/login".to_string()),
            body: BTreeMap::from([
                ("user".to_string(), "alice".to_string()),
                ("Password".to_string(), "hunter2".to_string()),
            ]),
            ..RequestContext::default()
        })
        .with_user("alice")
        .with_revision("3f2c1ab");
    let logger = ErrorLogger::builder(cfg)
        .with_mailer(Arc::new(mailer.clone()))
        .with_clock(Arc::new(clock()))
        .with_context_provider(Arc::new(context))
        .build()
        .unwrap();

    let details = ExceptionDetails::new("AuthError", "bad state", "/app/auth.rs", 30).with_trace(
        ["login", "verify", "load", "query"]
            .iter()
            .enumerate()
            .map(|(i, f)| StackFrame::new("/app/auth.rs", 10 + i as u32, *f).with_class("Auth"))
            .collect(),
    );
    let outcome = logger.log_exception(details, Severity::Critical).unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    let message = &sent[0];
    assert_eq!(message.subject, "An error occurred on the server web-1");
    assert!(message.body.starts_with("AuthError: bad state in /app/auth.rs:30"));
    assert!(message.body.contains("#0 /app/auth.rs(10): Auth::login()"));
    assert!(message.body.contains("LINK: shop.example.com/login"));
    assert!(message.body.contains("\"Password\": \"*****\""));
    assert!(!message.body.contains("hunter2"));
    assert!(message.body.contains("User: alice"));
    assert!(message.body.contains("Revision: 3f2c1ab"));
    assert_eq!(message.attachment, outcome.exception_file);
}

#[test]
fn test_failed_context_lookups_still_notify() {
    let dir = TempDir::new().unwrap();
    let mailer = RecordingMailer::new();
    let logger = ErrorLogger::builder(config(&dir, 10, 10))
        .with_mailer(Arc::new(mailer.clone()))
        .with_context_provider(Arc::new(StaticContext::failing()))
        .build()
        .unwrap();

    let outcome = logger.log_message("db down", Severity::Error).unwrap();

    assert_eq!(outcome.notification, Notification::Sent);
    assert_eq!(mailer.sent()[0].body, "db down");
}
