//! Default mail transport.
//!
//! Renders a `multipart/mixed` MIME message and pipes it to the local
//! `sendmail` binary, which reads recipients from the headers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use ulid::Ulid;

use crate::application::ports::{MailMessage, Mailer};
use crate::error::MailError;

/// Default location of the sendmail binary.
pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

const LINE_WIDTH: usize = 76;

/// A rendered MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeMessage {
    pub boundary: String,
    pub content: String,
}

impl MimeMessage {
    /// Render `message`, reading the attachment from disk.
    ///
    /// # Errors
    /// Returns `MailError::Attachment` if the attachment cannot be read.
    pub fn render(message: &MailMessage) -> Result<Self, MailError> {
        let attachment = match &message.attachment {
            Some(path) => Some((
                file_name(path),
                std::fs::read(path).map_err(|source| MailError::Attachment {
                    path: path.clone(),
                    source,
                })?,
            )),
            None => None,
        };
        Ok(Self::render_with(
            message,
            attachment.as_ref().map(|(n, b)| (n.as_str(), b.as_slice())),
            &format!("=_{}", Ulid::new()),
        ))
    }

    /// Render with explicit attachment bytes and boundary.
    pub fn render_with(
        message: &MailMessage,
        attachment: Option<(&str, &[u8])>,
        boundary: &str,
    ) -> Self {
        let mut out = String::new();
        let _ = write!(out, "To: {}\r\n", message.recipients.join(", "));
        if let Some(sender) = &message.sender {
            let _ = write!(out, "From: {}\r\n", sender);
        }
        let _ = write!(out, "Subject: {}\r\n", encode_header(&message.subject));
        out.push_str("MIME-Version: 1.0\r\n");
        let _ = write!(
            out,
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
            boundary
        );

        let _ = write!(out, "--{}\r\n", boundary);
        out.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
        for line in message.body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }

        if let Some((name, bytes)) = attachment {
            let _ = write!(out, "--{}\r\n", boundary);
            let _ = write!(
                out,
                "Content-Type: application/octet-stream; name=\"{}\"\r\n",
                name
            );
            out.push_str("Content-Transfer-Encoding: base64\r\n");
            let _ = write!(
                out,
                "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
                name
            );
            for chunk in wrap(&STANDARD.encode(bytes), LINE_WIDTH) {
                out.push_str(chunk);
                out.push_str("\r\n");
            }
        }

        let _ = write!(out, "--{}--\r\n", boundary);
        Self {
            boundary: boundary.to_string(),
            content: out,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

/// RFC 2047 encoding for headers that are not plain ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

/// Split an ASCII string into lines of at most `width` characters.
fn wrap(encoded: &str, width: usize) -> impl Iterator<Item = &str> {
    encoded
        .as_bytes()
        .chunks(width)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
}

/// Mailer piping messages to `sendmail -t -i`.
#[derive(Debug, Clone)]
pub struct SendmailMailer {
    program: PathBuf,
}

impl SendmailMailer {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_SENDMAIL)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, source: io::Error) -> MailError {
        MailError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

impl Default for SendmailMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer for SendmailMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let mime = MimeMessage::render(message)?;

        let mut child = Command::new(&self.program)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(mime.content.as_bytes()) {
                Ok(()) => {}
                // The exit status below says what went wrong.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(self.spawn_error(e)),
            }
        }

        let output = child.wait_with_output().map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(MailError::Transport {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
