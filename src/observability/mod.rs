//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! circuit_breaker.rs / retries.rs / vault.rs produce:
//!     → events.rs  (named lifecycle events to an injected sink)
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - Events are the contract with the host application; logs and metrics are
//!   best-effort side channels
//! - Nothing sensitive crosses any of the three

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{ChannelSink, EventKind, EventSink, FanoutSink, LifecycleEvent, NoopSink, TracingSink};
