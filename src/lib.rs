//! Licensing Resilience Core
//!
//! Fault-tolerance and cryptography primitives for a licensing subsystem.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller ──▶ CircuitBreaker ──▶ RetryExecutor ──▶ timeout ──▶ license service
//!                     │                   │
//!                     └──── events ───────┴──▶ EventSink (tracing / channel / fanout)
//!
//!     LicenseStore ──▶ CryptoVault (AES-256-GCM blobs, HMAC-SHA256 signatures)
//! ```
//!
//! # Modules
//! - `resilience`: circuit breaker, retries, backoff, timeouts, breaker registry
//! - `security`: key derivation and the vault
//! - `licensing`: remote validation client, encrypted store, signed tokens
//! - `config`: TOML schema, loading and validation
//! - `observability`: lifecycle events, logging, metrics
//! - `lifecycle`: cancellation, signals, startup wiring

// Core subsystems
pub mod licensing;
pub mod resilience;
pub mod security;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ResilienceConfig;
pub use lifecycle::Shutdown;
pub use resilience::{call_protected, CircuitBreaker, RetryExecutor};
pub use security::CryptoVault;
