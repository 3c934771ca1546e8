//! The notification ledger record.
//!
//! The ledger remembers which normalized errors were already notified in the
//! current window and how many notifications the window has used. It is
//! shared by every process writing to the same log directory, so it is
//! persisted; this module only knows its shape, its transitions and its
//! on-disk encoding. Locking lives with the store.
//!
//! # Encoding
//!
//! The current encoding is a JSON object:
//!
//! ```text
//! {"version":1,"sent_hashes":["<32 hex>", ...],"daily_count":2,"window_start":"2024-05-01T08:00:00Z"}
//! ```
//!
//! Older deployments wrote one hash per line with implicit daily semantics.
//! Such content, records of an unknown version, and anything else that fails
//! to parse are migrated: every hash that can be found is kept and the
//! counters start over.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::domain::normalizer::MessageHash;
use crate::domain::policy::{PolicyDecision, ResetPolicy, SuppressReason};

/// Version written into every encoded ledger.
pub const LEDGER_VERSION: u32 = 1;

/// Persisted notification state for one log directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Hashes notified during the current window.
    pub sent_hashes: BTreeSet<MessageHash>,
    /// Notifications sent during the current window.
    pub daily_count: u32,
    /// Start of the current window; unset until the first notification.
    pub window_start: Option<DateTime<Utc>>,
}

/// Shape of the content a ledger was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFormat {
    /// No content at all.
    Empty,
    /// The current JSON encoding.
    Current,
    /// Newline-delimited hashes.
    Legacy,
    /// Unparseable content; hashes were salvaged where possible.
    Salvaged,
}

impl LedgerFormat {
    /// Whether the stored content should be rewritten in the current encoding.
    pub fn needs_migration(&self) -> bool {
        matches!(self, LedgerFormat::Legacy | LedgerFormat::Salvaged)
    }
}

#[derive(Serialize, Deserialize)]
struct EncodedLedger {
    version: u32,
    #[serde(flatten)]
    state: LedgerState,
}

fn hash_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\b[0-9a-fA-F]{32}\b").expect("hash token pattern compiles")
    })
}

impl LedgerState {
    /// An empty, unexpired ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode stored content. Never fails: unknown content degrades to a
    /// fresh ledger holding every hash that could be salvaged.
    pub fn decode(content: &str) -> (LedgerState, LedgerFormat) {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return (LedgerState::new(), LedgerFormat::Empty);
        }

        if let Ok(encoded) = serde_json::from_str::<EncodedLedger>(trimmed) {
            if encoded.version == LEDGER_VERSION {
                return (encoded.state, LedgerFormat::Current);
            }
            // Unknown versions keep their hashes; counters start over.
            let state = LedgerState {
                sent_hashes: encoded.state.sent_hashes,
                ..LedgerState::default()
            };
            return (state, LedgerFormat::Salvaged);
        }

        let mut lines = trimmed.lines().map(str::trim).filter(|l| !l.is_empty());
        let legacy: Option<BTreeSet<MessageHash>> =
            lines.try_fold(BTreeSet::new(), |mut set, line| {
                set.insert(MessageHash::parse(line)?);
                Some(set)
            });

        if let Some(sent_hashes) = legacy {
            let state = LedgerState {
                sent_hashes,
                ..LedgerState::default()
            };
            return (state, LedgerFormat::Legacy);
        }

        let sent_hashes = hash_token_regex()
            .find_iter(trimmed)
            .filter_map(|m| MessageHash::parse(m.as_str()))
            .collect();
        let state = LedgerState {
            sent_hashes,
            ..LedgerState::default()
        };
        (state, LedgerFormat::Salvaged)
    }

    /// Encode in the current format.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&EncodedLedger {
            version: LEDGER_VERSION,
            state: self.clone(),
        })
    }

    /// Reset the ledger if its window has ended. Returns whether the ledger
    /// changed.
    ///
    /// Hashes carried over without a window start (migrated content) open a
    /// window at `now`, so they expire like any other.
    pub fn roll_window(&mut self, policy: &ResetPolicy, now: DateTime<Utc>) -> bool {
        match self.window_start {
            Some(start) if policy.is_expired(start, now) => {
                *self = LedgerState::new();
                true
            }
            None if !self.sent_hashes.is_empty() => {
                self.window_start = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Whether `hash` was already notified in this window.
    pub fn contains(&self, hash: &MessageHash) -> bool {
        self.sent_hashes.contains(hash)
    }

    /// Check `hash` against the duplicate set and the window cap, recording
    /// it when admitted.
    pub fn admit(
        &mut self,
        hash: &MessageHash,
        max_per_window: u32,
        now: DateTime<Utc>,
    ) -> PolicyDecision {
        if self.contains(hash) {
            return PolicyDecision::Suppress(SuppressReason::Duplicate);
        }
        if self.daily_count >= max_per_window {
            return PolicyDecision::Suppress(SuppressReason::DailyCap);
        }

        self.sent_hashes.insert(hash.clone());
        self.daily_count = self.daily_count.saturating_add(1);
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        PolicyDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hash(s: &str) -> MessageHash {
        MessageHash::of_normalized(s)
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_content_is_fresh() {
        let (state, format) = LedgerState::decode("  \n");
        assert_eq!(state, LedgerState::new());
        assert_eq!(format, LedgerFormat::Empty);
        assert!(!format.needs_migration());
    }

    #[test]
    fn test_encode_decode_current_format() {
        let mut state = LedgerState::new();
        state.admit(&hash("a"), 10, at(1, 8));
        state.admit(&hash("b"), 10, at(1, 9));

        let encoded = state.encode().unwrap();
        assert!(encoded.contains("\"version\":1"));

        let (decoded, format) = LedgerState::decode(&encoded);
        assert_eq!(format, LedgerFormat::Current);
        assert_eq!(decoded, state);
        assert_eq!(decoded.window_start, Some(at(1, 8)));
    }

    #[test]
    fn test_legacy_lines_are_migrated() {
        let a = hash("a");
        let b = hash("b");
        let content = format!("{}\n{}\n\n{}\n", a, b, a);

        let (state, format) = LedgerState::decode(&content);
        assert_eq!(format, LedgerFormat::Legacy);
        assert!(format.needs_migration());
        assert_eq!(state.sent_hashes.len(), 2);
        assert!(state.contains(&a) && state.contains(&b));
        assert_eq!(state.daily_count, 0);
        assert_eq!(state.window_start, None);
    }

    #[test]
    fn test_corrupt_content_salvages_hashes() {
        let a = hash("a");
        let content = format!("{{\"version\":1,\"sent_hashes\":[\"{}\",\"trunc", a);

        let (state, format) = LedgerState::decode(&content);
        assert_eq!(format, LedgerFormat::Salvaged);
        assert_eq!(state.sent_hashes.len(), 1);
        assert!(state.contains(&a));
        assert_eq!(state.daily_count, 0);
    }

    #[test]
    fn test_unknown_version_is_salvaged() {
        let a = hash("a");
        let content = format!(
            "{{\"version\":2,\"sent_hashes\":[\"{}\"],\"daily_count\":4,\"window_start\":null}}",
            a
        );

        let (state, format) = LedgerState::decode(&content);
        assert_eq!(format, LedgerFormat::Salvaged);
        assert!(format.needs_migration());
        assert!(state.contains(&a));
        assert_eq!(state.daily_count, 0);
    }

    #[test]
    fn test_binary_garbage_degrades_to_fresh() {
        let (state, format) = LedgerState::decode("\u{0}\u{1}not a ledger at all");
        assert_eq!(format, LedgerFormat::Salvaged);
        assert!(state.sent_hashes.is_empty());
    }

    #[test]
    fn test_admit_suppresses_duplicates() {
        let mut state = LedgerState::new();
        assert_eq!(state.admit(&hash("x"), 5, at(1, 8)), PolicyDecision::Allow);
        assert_eq!(
            state.admit(&hash("x"), 5, at(1, 9)),
            PolicyDecision::Suppress(SuppressReason::Duplicate)
        );
        assert_eq!(state.daily_count, 1);
    }

    #[test]
    fn test_admit_enforces_window_cap() {
        let mut state = LedgerState::new();
        assert!(state.admit(&hash("a"), 2, at(1, 8)).is_allow());
        assert!(state.admit(&hash("b"), 2, at(1, 8)).is_allow());
        assert_eq!(
            state.admit(&hash("c"), 2, at(1, 8)),
            PolicyDecision::Suppress(SuppressReason::DailyCap)
        );
        assert!(!state.contains(&hash("c")));
    }

    #[test]
    fn test_duplicate_wins_over_cap() {
        let mut state = LedgerState::new();
        state.admit(&hash("a"), 1, at(1, 8));
        assert_eq!(
            state.admit(&hash("a"), 1, at(1, 8)),
            PolicyDecision::Suppress(SuppressReason::Duplicate)
        );
    }

    #[test]
    fn test_roll_window_resets_after_midnight() {
        let policy = ResetPolicy::midnight_utc();
        let mut state = LedgerState::new();
        state.admit(&hash("a"), 1, at(1, 8));

        assert!(!state.roll_window(&policy, at(1, 23)));
        assert_eq!(state.daily_count, 1);

        assert!(state.roll_window(&policy, at(2, 0)));
        assert_eq!(state, LedgerState::new());
        assert!(state.admit(&hash("a"), 1, at(2, 0)).is_allow());
        assert_eq!(state.window_start, Some(at(2, 0)));
    }

    #[test]
    fn test_fresh_ledger_does_not_roll() {
        let policy = ResetPolicy::midnight_utc();
        let mut state = LedgerState::new();
        assert!(!state.roll_window(&policy, at(9, 0)));
        assert_eq!(state, LedgerState::new());
    }

    #[test]
    fn test_migrated_hashes_open_a_window() {
        let policy = ResetPolicy::midnight_utc();
        let (mut state, _) = LedgerState::decode(&format!("{}\n", hash("legacy")));

        assert!(state.roll_window(&policy, at(1, 9)));
        assert_eq!(state.window_start, Some(at(1, 9)));
        assert!(state.contains(&hash("legacy")));
        assert!(!state.roll_window(&policy, at(1, 23)));

        assert!(state.roll_window(&policy, at(2, 0)));
        assert!(!state.contains(&hash("legacy")));
    }
}
