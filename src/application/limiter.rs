//! Rate limiter coordination logic.
//!
//! The rate limiter decides whether a normalized error may be notified. It
//! combines three checks: the per-request cap (process local, checked
//! first and without touching the ledger), duplicate suppression and the
//! per-window cap (both against the shared ledger, in one critical section).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, LedgerStore};
use crate::domain::normalizer::MessageHash;
use crate::domain::policy::{NotificationLimits, PolicyDecision, ResetPolicy, SuppressReason};
use crate::error::LedgerError;

/// Notifications sent during the current invocation.
///
/// Shared between the limiter, which reads it, and the notifier, which
/// increments it after each successful send.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU32);

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Coordinates notification decisions.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    reset_policy: ResetPolicy,
    limits: NotificationLimits,
    request_counter: Arc<RequestCounter>,
    metrics: Metrics,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `store` - The shared ledger
    /// * `clock` - Source of wall-clock time for window handling
    /// * `reset_policy` - When windows end
    /// * `limits` - Per-window and per-request caps
    /// * `metrics` - Metrics tracker
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        reset_policy: ResetPolicy,
        limits: NotificationLimits,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            clock,
            reset_policy,
            limits,
            request_counter: Arc::new(RequestCounter::new()),
            metrics,
        }
    }

    /// Decide whether `hash` may be notified, recording it in the ledger
    /// when allowed.
    ///
    /// The ledger is left untouched when the per-request cap is reached.
    /// An expired window is reset (and persisted) even if the hash is then
    /// rejected.
    ///
    /// # Errors
    /// Returns `LedgerError` if the ledger cannot be locked, read or written.
    pub fn check(&self, hash: &MessageHash) -> Result<PolicyDecision, LedgerError> {
        if self.request_counter.get() >= self.limits.max_per_request {
            self.metrics.record_suppressed(SuppressReason::RequestCap);
            return Ok(PolicyDecision::Suppress(SuppressReason::RequestCap));
        }

        let now = self.clock.now();
        let mut decision = PolicyDecision::Suppress(SuppressReason::DailyCap);

        let result = self.store.transact(&mut |ledger| {
            let rolled = ledger.roll_window(&self.reset_policy, now);
            if rolled {
                tracing::debug!(target: "alert_throttle", "notification window rolled");
            }
            decision = ledger.admit(hash, self.limits.max_per_window, now);
            rolled || decision.is_allow()
        });

        if let Err(e) = result {
            self.metrics.record_ledger_failure();
            return Err(e);
        }

        if let PolicyDecision::Suppress(reason) = decision {
            self.metrics.record_suppressed(reason);
        }
        Ok(decision)
    }

    /// Counter incremented by each successful send.
    pub fn request_counter(&self) -> &Arc<RequestCounter> {
        &self.request_counter
    }

    /// Start a new invocation: the per-request cap applies afresh.
    pub fn begin_request(&self) {
        self.request_counter.reset();
    }

    pub fn limits(&self) -> NotificationLimits {
        self.limits
    }

    pub fn reset_policy(&self) -> &ResetPolicy {
        &self.reset_policy
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
