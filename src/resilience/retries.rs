//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation up to `max_attempts` times
//! - Sleep with exponential backoff between attempts (never after the last)
//! - Bound each attempt with an optional timeout
//! - Stop early on errors that match none of the retryable patterns
//!
//! # Design Decisions
//! - Never returns an error: callers branch on `RetryOutcome::is_success`
//! - No state survives between calls; one executor serves any number of
//!   concurrent `retry` calls
//! - Error matching runs against the error's `Display` text

use regex::Regex;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::lifecycle::CancelToken;
use crate::observability::events::{EventKind, EventSink, LifecycleEvent, NoopSink};
use crate::observability::metrics;
use crate::resilience::backoff::{with_jitter, ExponentialBackoff};
use crate::resilience::timeouts::{run_with_timeout, Elapsed};

/// Pattern deciding whether an error message is worth retrying.
#[derive(Debug, Clone)]
pub enum ErrorPattern {
    /// Plain substring match.
    Contains(String),
    /// Regular expression match anywhere in the message.
    Regex(Regex),
}

impl ErrorPattern {
    pub fn contains(needle: impl Into<String>) -> Self {
        ErrorPattern::Contains(needle.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(ErrorPattern::Regex)
    }

    pub fn matches(&self, message: &str) -> bool {
        match self {
            ErrorPattern::Contains(needle) => message.contains(needle.as_str()),
            ErrorPattern::Regex(re) => re.is_match(message),
        }
    }
}

/// Per-call retry policy.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total attempts including the first (values below 1 behave as 1).
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Per-attempt deadline; `None` leaves attempts unbounded.
    pub timeout: Option<Duration>,
    /// Empty means every error is retryable.
    pub retryable_errors: Vec<ErrorPattern>,
    /// Add 0–10% jitter to each sleep.
    pub jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_factor: 2.0,
            timeout: None,
            retryable_errors: Vec::new(),
            jitter: false,
        }
    }
}

impl RetryOptions {
    fn is_retryable(&self, message: &str) -> bool {
        self.retryable_errors.is_empty() || self.retryable_errors.iter().any(|p| p.matches(message))
    }
}

/// Why a single attempt (and so the whole run) failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError<E> {
    #[error("{0}")]
    Operation(E),

    #[error(transparent)]
    TimedOut(#[from] Elapsed),

    #[error("operation cancelled")]
    Cancelled,
}

impl<E> AttemptError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptError::TimedOut(_))
    }

    pub fn operation(&self) -> Option<&E> {
        match self {
            AttemptError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Result record of one `retry` run.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The value, or the last error seen.
    pub result: Result<T, AttemptError<E>>,
    pub attempts: u32,
    pub total_time: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn total_time_ms(&self) -> u64 {
        self.total_time.as_millis() as u64
    }

    pub fn into_result(self) -> Result<T, AttemptError<E>> {
        self.result
    }
}

/// Executes operations with bounded retries and exponential backoff.
pub struct RetryExecutor {
    label: String,
    defaults: RetryOptions,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("label", &self.label)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(label: impl Into<String>, defaults: RetryOptions) -> Self {
        Self {
            label: label.into(),
            defaults,
            events: Arc::new(NoopSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn defaults(&self) -> &RetryOptions {
        &self.defaults
    }

    /// Retry `operation` with the executor's default options.
    pub async fn retry<T, E, F, Fut>(&self, operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run(operation, &self.defaults, None).await
    }

    /// Retry `operation` with per-call options.
    pub async fn retry_with<T, E, F, Fut>(&self, operation: F, options: &RetryOptions) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run(operation, options, None).await
    }

    /// Retry `operation`, giving up with [`AttemptError::Cancelled`] as soon
    /// as `token` fires, whether mid-attempt or mid-backoff.
    pub async fn retry_cancellable<T, E, F, Fut>(
        &self,
        token: &CancelToken,
        operation: F,
        options: &RetryOptions,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run(operation, options, Some(token)).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: &RetryOptions,
        token: Option<&CancelToken>,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let started = Instant::now();
        let max_attempts = options.max_attempts.max(1);
        let mut backoff = ExponentialBackoff::new(options.initial_delay, options.max_delay, options.backoff_factor);
        let mut attempts = 0;

        let last_error = loop {
            attempts += 1;

            let attempt = async {
                match run_with_timeout(options.timeout, operation()).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(AttemptError::Operation(e)),
                    Err(elapsed) => Err(AttemptError::TimedOut(elapsed)),
                }
            };
            let outcome = match token {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(AttemptError::Cancelled),
                    res = attempt => res,
                },
                None => attempt.await,
            };

            let error = match outcome {
                Ok(value) => {
                    metrics::record_retry_attempt(true);
                    metrics::record_retry_operation(true);
                    if attempts > 1 {
                        tracing::info!(retry = %self.label, attempts, "Operation succeeded after retry");
                    }
                    self.events.emit(
                        LifecycleEvent::new(EventKind::RetrySuccess, self.label.clone()).with_attempts(attempts),
                    );
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        total_time: started.elapsed(),
                    };
                }
                Err(AttemptError::Cancelled) => break AttemptError::Cancelled,
                Err(error) => error,
            };
            metrics::record_retry_attempt(false);

            let message = error.to_string();
            if !options.is_retryable(&message) {
                tracing::debug!(retry = %self.label, attempts, error = %message, "Error is not retryable");
                break error;
            }
            if attempts >= max_attempts {
                break error;
            }

            let delay = backoff.next_delay();
            let sleep_for = if options.jitter { with_jitter(delay) } else { delay };
            tracing::debug!(
                retry = %self.label,
                attempt = attempts,
                max_attempts,
                delay_ms = sleep_for.as_millis() as u64,
                error = %message,
                "Attempt failed, backing off"
            );

            match token {
                Some(token) => {
                    let cancelled = tokio::select! {
                        biased;
                        _ = token.cancelled() => true,
                        _ = tokio::time::sleep(sleep_for) => false,
                    };
                    if cancelled {
                        break AttemptError::Cancelled;
                    }
                }
                None => tokio::time::sleep(sleep_for).await,
            }
        };

        let message = last_error.to_string();
        metrics::record_retry_operation(false);
        tracing::warn!(retry = %self.label, attempts, error = %message, "Operation failed");
        self.events.emit(
            LifecycleEvent::new(EventKind::RetryFailure, self.label.clone())
                .with_attempts(attempts)
                .with_error(message),
        );

        RetryOutcome {
            result: Err(last_error),
            attempts,
            total_time: started.elapsed(),
        }
    }
}
