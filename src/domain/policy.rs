//! Notification policies: window reset rules and admission decisions.
//!
//! A notification window bounds both duplicate suppression and the daily
//! cap. When the window expires, every previously notified hash becomes
//! eligible again and the counter starts over.

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Decision made for a candidate notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Send the notification.
    Allow,
    /// Do not send it.
    Suppress(SuppressReason),
}

/// Why a notification was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressReason {
    /// The same normalized error was already notified in this window.
    Duplicate,
    /// The per-window cap is exhausted.
    DailyCap,
    /// This invocation already sent its share of notifications.
    RequestCap,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::Duplicate => "duplicate",
            SuppressReason::DailyCap => "daily-cap",
            SuppressReason::RequestCap => "request-cap",
        }
    }
}

impl PolicyDecision {
    /// Check if this decision is Allow.
    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }

    /// Check if this decision is Suppress.
    pub fn is_suppress(&self) -> bool {
        matches!(self, PolicyDecision::Suppress(_))
    }
}

/// Error returned when a policy is configured with invalid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// A rolling window must be longer than zero.
    #[error("rolling window duration must be greater than 0")]
    ZeroWindow,
    /// The rolling window does not fit a calendar duration.
    #[error("rolling window of {0} seconds is too large")]
    WindowTooLarge(u64),
    /// The UTC offset is out of range.
    #[error("utc offset of {0} minutes is out of range")]
    InvalidOffset(i32),
}

/// When a notification window ends.
///
/// # Example
/// ```
/// use alert_throttle::ResetPolicy;
/// use chrono::{TimeZone, Utc};
///
/// let policy = ResetPolicy::midnight_utc();
/// let start = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
///
/// assert!(!policy.is_expired(start, Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap()));
/// assert!(policy.is_expired(start, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// The window ends at the next midnight in the given offset.
    Midnight { offset: FixedOffset },
    /// The window ends a fixed duration after it started.
    Rolling(Duration),
}

impl ResetPolicy {
    /// Reset at midnight UTC.
    pub fn midnight_utc() -> Self {
        ResetPolicy::Midnight {
            offset: Utc.fix(),
        }
    }

    /// Reset at midnight in the host's current local offset.
    pub fn midnight_local() -> Self {
        ResetPolicy::Midnight {
            offset: *Local::now().offset(),
        }
    }

    /// Reset at midnight in an offset given in minutes east of UTC.
    pub fn midnight_at_offset(minutes: i32) -> Result<Self, PolicyError> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(PolicyError::InvalidOffset(minutes))?;
        Ok(ResetPolicy::Midnight { offset })
    }

    /// Reset a fixed duration after the window started.
    pub fn rolling(window: std::time::Duration) -> Result<Self, PolicyError> {
        if window.is_zero() {
            return Err(PolicyError::ZeroWindow);
        }
        let window = Duration::from_std(window)
            .map_err(|_| PolicyError::WindowTooLarge(window.as_secs()))?;
        Ok(ResetPolicy::Rolling(window))
    }

    /// Whether a window started at `window_start` has ended at `now`.
    ///
    /// A clock that moved backwards never ends a window. A window whose end
    /// lies beyond the representable range never ends either.
    pub fn is_expired(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if now < window_start {
            return false;
        }
        match self {
            ResetPolicy::Midnight { offset } => {
                now.with_timezone(offset).date_naive()
                    > window_start.with_timezone(offset).date_naive()
            }
            ResetPolicy::Rolling(window) => window_start
                .checked_add_signed(*window)
                .is_some_and(|end| now >= end),
        }
    }
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::midnight_local()
    }
}

/// Caps applied to notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationLimits {
    /// Maximum notifications per window, across all processes.
    pub max_per_window: u32,
    /// Maximum notifications per invocation.
    pub max_per_request: u32,
}

impl Default for NotificationLimits {
    fn default() -> Self {
        Self {
            max_per_window: 50,
            max_per_request: 10,
        }
    }
}
