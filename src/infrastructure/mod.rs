//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - The file-locked and in-memory ledger stores
//! - Per-severity log files and exception detail files
//! - Mail delivery through sendmail
//! - Tracing integration (Layer trait)

pub mod clock;
pub mod exception_file;
pub mod layer;
pub mod ledger_store;
pub mod log_file;
pub mod mailer;
pub(crate) mod visitor;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// alert-throttle = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
