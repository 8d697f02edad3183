//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a licensing dependency:
//!     → circuit_breaker.rs (fail fast while the dependency is presumed down)
//!     → retries.rs (bounded attempts with backoff.rs delays)
//!     → timeouts.rs (per-attempt deadline)
//!     → operation
//! ```
//!
//! # Design Decisions
//! - The breaker wraps the whole retry run: one exhausted run is one failure
//! - Breakers are per resource (`registry.rs`), retry runs are per call
//! - Time is injected (`clock.rs`) so cooldowns are testable

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerOptions, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::BreakerRegistry;
pub use retries::{AttemptError, ErrorPattern, RetryExecutor, RetryOptions, RetryOutcome};

use std::fmt::Display;
use std::future::Future;

/// Run `operation` as `breaker(executor(operation))`.
///
/// Transient failures are absorbed by the retry run; only an exhausted (or
/// non-retryable) run counts against the breaker.
pub async fn call_protected<T, E, F, Fut>(
    breaker: &CircuitBreaker,
    executor: &RetryExecutor,
    options: &RetryOptions,
    operation: F,
) -> Result<T, BreakerError<AttemptError<E>>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    breaker
        .execute(move || async move { executor.retry_with(operation, options).await.into_result() })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_retry_absorbs_transient_failures() {
        let breaker = CircuitBreaker::new("license-api", BreakerOptions {
            failure_threshold: 1,
            ..BreakerOptions::default()
        });
        let executor = RetryExecutor::new("license-api", RetryOptions {
            initial_delay: Duration::from_millis(10),
            ..RetryOptions::default()
        });
        let calls = AtomicU32::new(0);

        let value = call_protected(&breaker, &executor, executor.defaults(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("blip".to_string())
            } else {
                Ok("valid")
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "valid");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_run_counts_once() {
        let breaker = CircuitBreaker::new("license-api", BreakerOptions {
            failure_threshold: 2,
            ..BreakerOptions::default()
        });
        let executor = RetryExecutor::new("license-api", RetryOptions {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            ..RetryOptions::default()
        });
        let calls = AtomicU32::new(0);
        let op = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("down".to_string())
        };

        let err = call_protected(&breaker, &executor, executor.defaults(), op).await.unwrap_err();
        assert!(matches!(err, BreakerError::Operation(AttemptError::Operation(_))));
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let _ = call_protected(&breaker, &executor, executor.defaults(), op).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = call_protected(&breaker, &executor, executor.defaults(), op).await.unwrap_err();
        assert!(err.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }
}
