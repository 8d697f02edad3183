//! Named circuit breakers, one per protected resource.

use dashmap::DashMap;
use std::sync::Arc;

use crate::observability::events::{EventSink, NoopSink};
use crate::resilience::circuit_breaker::{BreakerOptions, BreakerSnapshot, CircuitBreaker};
use crate::resilience::clock::{Clock, SystemClock};

/// Process-wide set of breakers keyed by resource name.
///
/// Breakers are created lazily and live until the registry is dropped.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: BreakerOptions,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl BreakerRegistry {
    pub fn new(defaults: BreakerOptions) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
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

    /// Breaker for `name`, created with the registry defaults if missing.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(name, self.defaults.clone())
    }

    /// Breaker for `name`, created with `options` if missing. Options of an
    /// existing breaker are left untouched.
    pub fn get_or_create_with(&self, name: &str, options: BreakerOptions) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = %name, "Creating circuit breaker");
                Arc::new(
                    CircuitBreaker::new(name, options)
                        .with_clock(self.clock.clone())
                        .with_events(self.events.clone()),
                )
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.iter().map(|r| r.value().snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn reset_all(&self) {
        for r in self.breakers.iter() {
            r.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use std::time::Duration;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(BreakerOptions {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(30),
            half_open_retries: 1,
        })
    }

    #[test]
    fn test_same_name_same_breaker() {
        let reg = registry();
        let a = reg.get_or_create("license-api");
        let b = reg.get_or_create("license-api");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn test_custom_options_only_on_creation() {
        let reg = registry();
        let custom = BreakerOptions {
            failure_threshold: 9,
            ..BreakerOptions::default()
        };
        let a = reg.get_or_create_with("db", custom);
        assert_eq!(a.options().failure_threshold, 9);

        let again = reg.get_or_create("db");
        assert_eq!(again.options().failure_threshold, 9);
    }

    #[tokio::test]
    async fn test_snapshots_and_reset_all() {
        let reg = registry();
        let api = reg.get_or_create("license-api");
        reg.get_or_create("activation-db");

        let _ = api.execute(|| async { Err::<(), _>("down".to_string()) }).await;
        let snaps = reg.snapshots();
        assert_eq!(snaps[0].name, "activation-db");
        assert_eq!(snaps[1].state, CircuitState::Open);

        reg.reset_all();
        assert!(reg.snapshots().iter().all(|s| s.state == CircuitState::Closed));
    }
}
