//! Observability metrics for the notification pipeline.
//!
//! Counters are process local. They describe what this logger instance did,
//! not the shared ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::policy::SuppressReason;

/// Metrics tracking logging and notification statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Plain log lines written
    lines_written: AtomicU64,
    /// Notifications handed to the mailer successfully
    notifications_sent: AtomicU64,
    /// Suppressed because the hash was already notified
    suppressed_duplicate: AtomicU64,
    /// Suppressed by the per-window cap
    suppressed_daily_cap: AtomicU64,
    /// Suppressed by the per-request cap
    suppressed_request_cap: AtomicU64,
    /// Ledger lock or I/O failures
    ledger_failures: AtomicU64,
    /// Mailer failures
    delivery_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_line_written(&self) {
        self.inner.lines_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.inner.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self, reason: SuppressReason) {
        let counter = match reason {
            SuppressReason::Duplicate => &self.inner.suppressed_duplicate,
            SuppressReason::DailyCap => &self.inner.suppressed_daily_cap,
            SuppressReason::RequestCap => &self.inner.suppressed_request_cap,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ledger_failure(&self) {
        self.inner.ledger_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery_failure(&self) {
        self.inner.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines_written(&self) -> u64 {
        self.inner.lines_written.load(Ordering::Relaxed)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.inner.notifications_sent.load(Ordering::Relaxed)
    }

    /// Suppressions for one reason.
    pub fn suppressed(&self, reason: SuppressReason) -> u64 {
        match reason {
            SuppressReason::Duplicate => self.inner.suppressed_duplicate.load(Ordering::Relaxed),
            SuppressReason::DailyCap => self.inner.suppressed_daily_cap.load(Ordering::Relaxed),
            SuppressReason::RequestCap => {
                self.inner.suppressed_request_cap.load(Ordering::Relaxed)
            }
        }
    }

    pub fn ledger_failures(&self) -> u64 {
        self.inner.ledger_failures.load(Ordering::Relaxed)
    }

    pub fn delivery_failures(&self) -> u64 {
        self.inner.delivery_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_written: self.lines_written(),
            notifications_sent: self.notifications_sent(),
            suppressed_duplicate: self.suppressed(SuppressReason::Duplicate),
            suppressed_daily_cap: self.suppressed(SuppressReason::DailyCap),
            suppressed_request_cap: self.suppressed(SuppressReason::RequestCap),
            ledger_failures: self.ledger_failures(),
            delivery_failures: self.delivery_failures(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.lines_written,
            &inner.notifications_sent,
            &inner.suppressed_duplicate,
            &inner.suppressed_daily_cap,
            &inner.suppressed_request_cap,
            &inner.ledger_failures,
            &inner.delivery_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub lines_written: u64,
    pub notifications_sent: u64,
    pub suppressed_duplicate: u64,
    pub suppressed_daily_cap: u64,
    pub suppressed_request_cap: u64,
    pub ledger_failures: u64,
    pub delivery_failures: u64,
}

impl MetricsSnapshot {
    /// Total suppressions across all reasons.
    pub fn total_suppressed(&self) -> u64 {
        self.suppressed_duplicate
            .saturating_add(self.suppressed_daily_cap)
            .saturating_add(self.suppressed_request_cap)
    }

    /// Ratio of suppressed to considered notifications (0.0 to 1.0).
    ///
    /// Returns 0.0 if no notification was considered.
    pub fn suppression_rate(&self) -> f64 {
        let suppressed = self.total_suppressed();
        let total = suppressed.saturating_add(self.notifications_sent);
        if total == 0 {
            0.0
        } else {
            suppressed as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_suppressed_by_reason() {
        let metrics = Metrics::new();
        metrics.record_suppressed(SuppressReason::Duplicate);
        metrics.record_suppressed(SuppressReason::Duplicate);
        metrics.record_suppressed(SuppressReason::RequestCap);

        assert_eq!(metrics.suppressed(SuppressReason::Duplicate), 2);
        assert_eq!(metrics.suppressed(SuppressReason::DailyCap), 0);
        assert_eq!(metrics.suppressed(SuppressReason::RequestCap), 1);
        assert_eq!(metrics.snapshot().total_suppressed(), 3);
    }

    #[test]
    fn test_snapshot_suppression_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().suppression_rate(), 0.0);

        metrics.record_sent();
        assert_eq!(metrics.snapshot().suppression_rate(), 0.0);

        metrics.record_suppressed(SuppressReason::DailyCap);
        assert!((metrics.snapshot().suppression_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_line_written();
        metrics.record_sent();
        metrics.record_ledger_failure();
        metrics.record_delivery_failure();

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_clone_shares_counters() {
        let metrics1 = Metrics::new();
        metrics1.record_sent();

        let metrics2 = metrics1.clone();
        metrics2.record_sent();

        assert_eq!(metrics1.notifications_sent(), 2);
        assert_eq!(metrics2.notifications_sent(), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = Metrics::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_line_written();
                    m.record_suppressed(SuppressReason::Duplicate);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.lines_written(), 1000);
        assert_eq!(metrics.suppressed(SuppressReason::Duplicate), 1000);
    }
}
