//! Logger configuration.
//!
//! Configuration is supplied once, usually from a TOML file, and stays
//! fixed for the lifetime of the logger:
//!
//! ```toml
//! directory = "/var/log/app"
//! recipients = ["ops@example.com"]
//! max_per_day = 50
//! max_per_request = 10
//! sensitive_fields = ["password", "token"]
//!
//! [reset]
//! policy = "midnight"
//! utc_offset_minutes = 60
//!
//! [normalization]
//! rules = ["process-ids", "digits"]
//! custom_patterns = ['session=[0-9a-f]+']
//! ```
//!
//! Every field is optional except `directory`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::notifier::DEFAULT_SUBJECT_TEMPLATE;
use crate::domain::event::Severity;
use crate::domain::normalizer::{NormalizationRule, Normalizer, PatternError};
use crate::domain::policy::{NotificationLimits, PolicyError, ResetPolicy};

/// Default name of the ledger file inside the log directory.
pub const DEFAULT_LEDGER_FILE: &str = "email-sent";

/// Error raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("log directory must be set")]
    MissingDirectory,
    #[error("{0} must be greater than 0")]
    ZeroLimit(&'static str),
    #[error("ledger file name must be a plain file name, got {0:?}")]
    InvalidLedgerFile(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// How notification windows end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ResetConfig {
    /// Reset at midnight. Without an offset the host's local offset is used.
    Midnight {
        #[serde(default)]
        utc_offset_minutes: Option<i32>,
    },
    /// Reset a fixed number of seconds after the first notification.
    Rolling { window_secs: u64 },
}

impl Default for ResetConfig {
    fn default() -> Self {
        ResetConfig::Midnight {
            utc_offset_minutes: None,
        }
    }
}

impl ResetConfig {
    pub fn to_policy(&self) -> Result<ResetPolicy, PolicyError> {
        match *self {
            ResetConfig::Midnight {
                utc_offset_minutes: None,
            } => Ok(ResetPolicy::midnight_local()),
            ResetConfig::Midnight {
                utc_offset_minutes: Some(minutes),
            } => ResetPolicy::midnight_at_offset(minutes),
            ResetConfig::Rolling { window_secs } => {
                ResetPolicy::rolling(Duration::from_secs(window_secs))
            }
        }
    }
}

/// Normalization applied before hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationConfig {
    /// Built-in rules, applied in order.
    pub rules: Vec<NormalizationRule>,
    /// Additional regular expressions whose matches are removed.
    pub custom_patterns: Vec<String>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            rules: NormalizationRule::defaults(),
            custom_patterns: Vec::new(),
        }
    }
}

impl NormalizationConfig {
    pub fn build(&self) -> Result<Normalizer, PatternError> {
        Normalizer::new(&self.rules, &self.custom_patterns)
    }
}

/// Complete logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Directory holding log files, exception files and the ledger.
    pub directory: PathBuf,
    /// Notification recipients. Empty disables notification.
    pub recipients: Vec<String>,
    pub sender: Option<String>,
    /// Notifications allowed per window.
    pub max_per_day: u32,
    /// Notifications allowed per invocation.
    pub max_per_request: u32,
    /// Request keys whose values are masked in notifications.
    pub sensitive_fields: Vec<String>,
    /// Attach the stored exception file to notifications.
    pub include_exception_attachment: bool,
    pub normalization: NormalizationConfig,
    pub reset: ResetConfig,
    /// Severities that may trigger a notification.
    pub qualifying_severities: Vec<Severity>,
    /// Notification subject; `{host}` is replaced with the host name.
    pub subject_template: String,
    /// Host name for the subject. Detected when unset.
    pub hostname: Option<String>,
    /// Prefix of the per-severity log file names.
    pub log_file_prefix: String,
    /// Name of the ledger file inside `directory`.
    pub ledger_file: String,
    /// Stack frames are included only when there are more than this many.
    pub min_stack_depth: usize,
    /// Give up waiting for the ledger lock after this many milliseconds.
    /// Waits indefinitely when unset.
    pub lock_timeout_ms: Option<u64>,
    /// Path of the sendmail binary used by the default mailer.
    pub sendmail_path: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            recipients: Vec::new(),
            sender: None,
            max_per_day: 50,
            max_per_request: 10,
            sensitive_fields: vec!["password".to_string()],
            include_exception_attachment: true,
            normalization: NormalizationConfig::default(),
            reset: ResetConfig::default(),
            qualifying_severities: Severity::default_qualifying(),
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            hostname: None,
            log_file_prefix: String::new(),
            ledger_file: DEFAULT_LEDGER_FILE.to_string(),
            min_stack_depth: 3,
            lock_timeout_ms: None,
            sendmail_path: None,
        }
    }
}

impl LoggerConfig {
    /// Configuration with defaults for everything but the directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoggerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check the configuration without touching the file system.
    ///
    /// The directory's existence is checked on every log call instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::MissingDirectory);
        }
        if self.max_per_day == 0 {
            return Err(ConfigError::ZeroLimit("max_per_day"));
        }
        if self.max_per_request == 0 {
            return Err(ConfigError::ZeroLimit("max_per_request"));
        }
        let ledger = Path::new(&self.ledger_file);
        if self.ledger_file.is_empty() || ledger.file_name() != Some(ledger.as_os_str()) {
            return Err(ConfigError::InvalidLedgerFile(self.ledger_file.clone()));
        }
        self.normalization.build()?;
        self.reset.to_policy()?;
        Ok(())
    }

    pub fn limits(&self) -> NotificationLimits {
        NotificationLimits {
            max_per_window: self.max_per_day,
            max_per_request: self.max_per_request,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.directory.join(&self.ledger_file)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Whether `severity` may trigger a notification.
    pub fn qualifies(&self, severity: Severity) -> bool {
        self.qualifying_severities.contains(&severity)
    }
}
