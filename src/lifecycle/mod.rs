//! Lifecycle management.
//!
//! # Responsibilities
//! - Hand out cancellation tokens to breaker and retry calls (shutdown.rs)
//! - Turn Ctrl-C into a cancellation (signals.rs)
//! - Load config and wire subsystems together (startup.rs)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{CancelToken, Shutdown};
pub use startup::Services;
