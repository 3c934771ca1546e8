//! Message normalization and hashing for notification deduplication.
//!
//! Recurring errors rarely repeat byte for byte: line numbers, process IDs,
//! resource handles and deployment paths change between occurrences. The
//! normalizer strips those volatile substrings so that every occurrence of
//! the same underlying error maps to the same [`MessageHash`].
//!
//! Rules are applied in configuration order. The default order matters:
//! resource and process IDs are matched before the generic `digits` rule
//! would erase the context they are recognised by.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::event::ErrorEvent;

/// Number of hex characters in a rendered hash.
pub const HASH_HEX_LEN: usize = 32;

/// Digest of a normalized message.
///
/// Equal hashes mean "the same error" for notification purposes. The digest
/// is MD5 so that every process sharing a ledger computes the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageHash(String);

impl MessageHash {
    /// Hash an already normalized string.
    pub fn of_normalized(normalized: &str) -> Self {
        let digest = md5::compute(normalized.as_bytes());
        MessageHash(format!("{digest:x}"))
    }

    /// Parse a rendered hash (32 hex digits, any case).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == HASH_HEX_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(MessageHash(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MessageHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MessageHash::parse(&value).ok_or_else(|| format!("invalid message hash: {value:?}"))
    }
}

impl From<MessageHash> for String {
    fn from(hash: MessageHash) -> Self {
        hash.0
    }
}

/// Built-in normalization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationRule {
    /// `Resource id #12` -> `Resource id #`
    ResourceIds,
    /// `pid 1234`, `[pid: 1234]`, `PID=1234` -> `pid`
    ProcessIds,
    /// `https://`, `file://` and other scheme prefixes are removed.
    UriSchemes,
    /// `/var/www/app/x.php`, `C:\app\x.php` -> `<path>`
    AbsolutePaths,
    /// Every run of digits -> `#`
    Digits,
}

impl NormalizationRule {
    /// The rule set and order used when nothing is configured.
    pub fn defaults() -> Vec<NormalizationRule> {
        vec![
            NormalizationRule::ResourceIds,
            NormalizationRule::ProcessIds,
            NormalizationRule::UriSchemes,
            NormalizationRule::AbsolutePaths,
            NormalizationRule::Digits,
        ]
    }

    fn pattern(&self) -> &'static str {
        match self {
            NormalizationRule::ResourceIds => r"(?i)resource id #\d+",
            NormalizationRule::ProcessIds => r"(?i)\[?\bpid\b\s*[:=#]?\s*\d+\]?",
            NormalizationRule::UriSchemes => r"\b[a-zA-Z][a-zA-Z0-9+.\-]*://",
            NormalizationRule::AbsolutePaths => r"(?:[A-Za-z]:\\|/)(?:[\w.\-]+[\\/])+[\w.\-]*",
            NormalizationRule::Digits => r"\d+",
        }
    }

    fn replacement(&self) -> &'static str {
        match self {
            NormalizationRule::ResourceIds => "Resource id #",
            NormalizationRule::ProcessIds => "pid",
            NormalizationRule::UriSchemes => "",
            NormalizationRule::AbsolutePaths => "<path>",
            NormalizationRule::Digits => "#",
        }
    }
}

/// Error returned for an invalid custom pattern.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid normalization pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    replacement: &'static str,
}

/// Converts raw messages into canonical strings and hashes them.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<CompiledRule>,
}

impl Normalizer {
    /// Build a normalizer from built-in rules followed by custom patterns.
    ///
    /// Custom pattern matches are removed from the message.
    pub fn new(rules: &[NormalizationRule], custom_patterns: &[String]) -> Result<Self, PatternError> {
        let mut compiled = Vec::with_capacity(rules.len() + custom_patterns.len());

        for rule in rules {
            let regex = Regex::new(rule.pattern()).map_err(|e| PatternError {
                pattern: rule.pattern().to_string(),
                reason: e.to_string(),
            })?;
            compiled.push(CompiledRule {
                regex,
                replacement: rule.replacement(),
            });
        }

        for pattern in custom_patterns {
            let regex = Regex::new(pattern).map_err(|e| PatternError {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            compiled.push(CompiledRule {
                regex,
                replacement: "",
            });
        }

        Ok(Self { rules: compiled })
    }

    /// A normalizer that only collapses whitespace.
    pub fn identity() -> Self {
        Self { rules: Vec::new() }
    }

    /// Canonical form of `raw`.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = raw.to_string();
        for rule in &self.rules {
            current = rule
                .regex
                .replace_all(&current, rule.replacement)
                .into_owned();
        }
        current.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// `md5(normalize(raw))`
    pub fn hash(&self, raw: &str) -> MessageHash {
        MessageHash::of_normalized(&self.normalize(raw))
    }

    /// Hash of an event's hash input.
    pub fn hash_event(&self, event: &ErrorEvent) -> MessageHash {
        self.hash(&event.hash_input())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizationRule::defaults(), &[])
            .expect("built-in normalization patterns compile")
    }
}
