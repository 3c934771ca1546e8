//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Rate limiter (decision making against the shared ledger)
//! - Notifier (message composition and delivery)
//! - Logger facade (the public entry point)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod limiter;
pub mod logger;
pub mod metrics;
pub mod notifier;
pub mod ports;
