//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of application logic.

pub mod clock;
pub mod context;
pub mod mailer;

pub use clock::MockClock;
pub use context::StaticContext;
pub use mailer::RecordingMailer;
