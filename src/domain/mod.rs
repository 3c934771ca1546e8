//! Domain layer - pure business logic with no I/O.
//!
//! This layer contains the core concepts of the notification pipeline:
//! - Error events and severities
//! - Message normalization and hashing
//! - Window reset rules and admission decisions
//! - The notification ledger record and its encoding
//!
//! All types in this layer are pure and easily testable.

pub mod event;
pub mod ledger;
pub mod normalizer;
pub mod policy;
