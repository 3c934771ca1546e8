//! Recording mailer for testing.

use std::sync::{Arc, Mutex};

use crate::application::ports::{MailMessage, Mailer};
use crate::error::MailError;

/// Mailer that records every message instead of delivering it.
///
/// Clones share the same recording, so a test can hand one clone to the
/// logger and inspect the other.
///
/// # Examples
///
/// ```
/// use alert_throttle::infrastructure::mocks::RecordingMailer;
/// use alert_throttle::application::ports::{MailMessage, Mailer};
///
/// let mailer = RecordingMailer::new();
/// let message = MailMessage {
///     recipients: vec!["ops@example.com".to_string()],
///     sender: None,
///     subject: "subject".to_string(),
///     body: "body".to_string(),
///     attachment: None,
/// };
///
/// mailer.send(&message).unwrap();
/// assert_eq!(mailer.count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    fail: bool,
}

impl RecordingMailer {
    /// Create a mailer that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailer that rejects every message with a transport error.
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent
            .lock()
            .expect("RecordingMailer mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    /// Number of messages accepted so far.
    pub fn count(&self) -> usize {
        self.sent
            .lock()
            .expect("RecordingMailer mutex poisoned - a test thread panicked while holding the lock")
            .len()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .expect("RecordingMailer mutex poisoned - a test thread panicked while holding the lock")
            .clear();
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport {
                status: "exit status: 75".to_string(),
                stderr: "temporary failure".to_string(),
            });
        }
        self.sent
            .lock()
            .expect("RecordingMailer mutex poisoned - a test thread panicked while holding the lock")
            .push(message.clone());
        Ok(())
    }
}
