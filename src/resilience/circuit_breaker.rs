//! Circuit breaker for protected licensing dependencies.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency presumed down, calls fail fast (or use the fallback)
//! - Half-Open: bounded probing to detect recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: next call after reset_timeout since the last failure
//! Half-Open → Closed: half_open_retries successful probes
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per protected resource (see `registry.rs`)
//! - All state sits behind a single mutex; each (state, outcome) pair is
//!   applied exactly once
//! - Every admitted call holds a permit stamped with the breaker generation;
//!   outcomes of permits from an earlier generation are discarded
//! - Probes in flight never exceed the successes still needed to close
//! - Time comes from an injected `Clock`

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::lifecycle::CancelToken;
use crate::observability::events::{EventKind, EventSink, LifecycleEvent, NoopSink};
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerOptions {
    /// Failures that trip the breaker (>= 1).
    pub failure_threshold: u32,
    /// Cooldown after the last failure before a probe is allowed.
    pub reset_timeout: Duration,
    /// Successful probes required to close again (>= 1).
    pub half_open_retries: u32,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_retries: 3,
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`] and friends.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The circuit is open and no fallback was supplied.
    #[error("circuit breaker '{breaker}' is open")]
    Open { breaker: String },

    /// The caller's cancel token fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// The wrapped operation (or fallback) failed.
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The wrapped operation's error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Point-in-time view of a breaker, for admin and health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_successes: u32,
    pub probes_in_flight: u32,
    pub millis_since_last_failure: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_successes: u32,
    probes_in_flight: u32,
    generation: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            half_open_successes: 0,
            probes_in_flight: 0,
            generation: 0,
        }
    }
}

/// Admission ticket for one call.
///
/// Dropping an unsettled probe permit frees its slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

/// Circuit breaker guarding one protected resource.
pub struct CircuitBreaker {
    name: String,
    options: BreakerOptions,
    inner: Mutex<BreakerState>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a closed breaker using the system clock and no event sink.
    pub fn new(name: impl Into<String>, options: BreakerOptions) -> Self {
        Self {
            name: name.into(),
            options,
            inner: Mutex::new(BreakerState::new()),
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopSink),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BreakerOptions {
        &self.options
    }

    /// Current state. Does not perform the lazy Open → Half-Open move.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let st = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: st.state,
            failure_count: st.failure_count,
            half_open_successes: st.half_open_successes,
            probes_in_flight: st.probes_in_flight,
            millis_since_last_failure: st
                .last_failure
                .map(|t| now.saturating_duration_since(t).as_millis() as u64),
        }
    }

    /// Force the breaker back to Closed with zeroed counters.
    pub fn reset(&self) {
        let event = {
            let mut st = self.lock();
            let event = (st.state != CircuitState::Closed)
                .then(|| self.transition(&mut st, CircuitState::Closed, None));
            st.failure_count = 0;
            st.last_failure = None;
            event
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails with [`BreakerError::Open`] without invoking `operation` while
    /// the circuit is open and no probe is due.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some(permit) = self.try_acquire() else {
            return Err(self.rejected());
        };
        let result = operation().await;
        self.settle(permit, result)
    }

    /// Like [`execute`](Self::execute), but a rejected call resolves to
    /// `fallback` instead of an error. The fallback's outcome does not touch
    /// breaker state.
    pub async fn execute_with_fallback<T, E, F, Fut, G, GFut>(
        &self,
        operation: F,
        fallback: G,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some(permit) = self.try_acquire() else {
            metrics::record_circuit_rejection(&self.name);
            tracing::debug!(breaker = %self.name, "Circuit open, using fallback");
            return fallback().await.map_err(BreakerError::Operation);
        };
        let result = operation().await;
        self.settle(permit, result)
    }

    /// Like [`execute`](Self::execute), abandoning the operation when `token`
    /// fires. A cancelled call counts as neither success nor failure.
    pub async fn execute_cancellable<T, E, F, Fut>(
        &self,
        token: &CancelToken,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if token.is_cancelled() {
            return Err(BreakerError::Cancelled);
        }
        let Some(permit) = self.try_acquire() else {
            return Err(self.rejected());
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                drop(permit);
                Err(BreakerError::Cancelled)
            }
            result = operation() => self.settle(permit, result),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rejected<E>(&self) -> BreakerError<E> {
        metrics::record_circuit_rejection(&self.name);
        tracing::debug!(breaker = %self.name, "Circuit open, rejecting call");
        BreakerError::Open {
            breaker: self.name.clone(),
        }
    }

    fn try_acquire(&self) -> Option<Permit<'_>> {
        let now = self.clock.now();
        let mut event = None;

        let admitted = {
            let mut st = self.lock();
            if st.state == CircuitState::Open {
                let cooled = st
                    .last_failure
                    .map_or(true, |t| now.saturating_duration_since(t) >= self.options.reset_timeout);
                if cooled {
                    event = Some(self.transition(&mut st, CircuitState::HalfOpen, None));
                }
            }

            match st.state {
                CircuitState::Closed => Some((st.generation, false)),
                CircuitState::HalfOpen => {
                    let needed = self.options.half_open_retries.saturating_sub(st.half_open_successes);
                    if st.probes_in_flight < needed {
                        st.probes_in_flight += 1;
                        Some((st.generation, true))
                    } else {
                        None
                    }
                }
                CircuitState::Open => None,
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }

        admitted.map(|(generation, probe)| Permit {
            breaker: self,
            generation,
            probe,
            settled: false,
        })
    }

    fn settle<T, E: Display>(&self, mut permit: Permit<'_>, result: Result<T, E>) -> Result<T, BreakerError<E>> {
        permit.settled = true;
        match result {
            Ok(value) => {
                self.on_success(&permit);
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&permit, &e);
                Err(BreakerError::Operation(e))
            }
        }
    }

    fn on_success(&self, permit: &Permit<'_>) {
        let event = {
            let mut st = self.lock();
            if permit.generation != st.generation {
                return;
            }
            match st.state {
                CircuitState::Closed => {
                    st.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    st.probes_in_flight = st.probes_in_flight.saturating_sub(1);
                    st.half_open_successes += 1;
                    tracing::debug!(
                        breaker = %self.name,
                        successes = st.half_open_successes,
                        required = self.options.half_open_retries,
                        "Half-open probe succeeded"
                    );
                    (st.half_open_successes >= self.options.half_open_retries)
                        .then(|| self.transition(&mut st, CircuitState::Closed, None))
                }
                CircuitState::Open => None,
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn on_failure(&self, permit: &Permit<'_>, error: &dyn Display) {
        let now = self.clock.now();
        let event = {
            let mut st = self.lock();
            if permit.generation != st.generation {
                return;
            }
            match st.state {
                CircuitState::Closed => {
                    st.failure_count += 1;
                    st.last_failure = Some(now);
                    (st.failure_count >= self.options.failure_threshold)
                        .then(|| self.transition(&mut st, CircuitState::Open, Some(error)))
                }
                CircuitState::HalfOpen => {
                    st.probes_in_flight = st.probes_in_flight.saturating_sub(1);
                    st.failure_count += 1;
                    st.last_failure = Some(now);
                    Some(self.transition(&mut st, CircuitState::Open, Some(error)))
                }
                CircuitState::Open => None,
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut st = self.lock();
        if st.generation == generation && st.state == CircuitState::HalfOpen {
            st.probes_in_flight = st.probes_in_flight.saturating_sub(1);
        }
    }

    /// Apply a transition. Caller holds the lock and emits the returned event
    /// after releasing it.
    fn transition(
        &self,
        st: &mut BreakerState,
        to: CircuitState,
        error: Option<&dyn Display>,
    ) -> LifecycleEvent {
        let from = st.state;
        st.state = to;
        st.generation += 1;
        st.half_open_successes = 0;
        st.probes_in_flight = 0;
        if to == CircuitState::Closed {
            st.failure_count = 0;
        }

        let kind = match to {
            CircuitState::Open => {
                tracing::warn!(
                    breaker = %self.name,
                    from = %from,
                    failure_count = st.failure_count,
                    "Circuit opened"
                );
                EventKind::CircuitOpen
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Circuit half-open, probing");
                EventKind::CircuitHalfOpen
            }
            CircuitState::Closed => {
                tracing::info!(breaker = %self.name, from = %from, "Circuit closed");
                EventKind::CircuitClose
            }
        };
        metrics::record_circuit_transition(&self.name, to);

        let event = LifecycleEvent::new(kind, self.name.clone()).with_failure_count(st.failure_count);
        match error {
            Some(e) => event.with_error(e.to_string()),
            None => event,
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        self.events.emit(event);
    }
}
