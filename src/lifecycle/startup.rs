//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics in dependency order
//! - Build the shared breaker registry and cancellation coordinator
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal
//! - The vault is derived on demand; commands that never touch it skip the KDF

use std::path::Path;
use std::sync::Arc;

use crate::config::{self, ConfigError, ResilienceConfig};
use crate::observability::{self, EventSink, TracingSink};
use crate::resilience::BreakerRegistry;
use crate::security::{CryptoVault, VaultError};
use crate::lifecycle::Shutdown;

/// Everything a command needs, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub config: ResilienceConfig,
    pub registry: Arc<BreakerRegistry>,
    pub events: Arc<dyn EventSink>,
    pub shutdown: Arc<Shutdown>,
}

impl Services {
    /// Derive the vault from the configured secret.
    pub fn vault(&self) -> Result<CryptoVault, VaultError> {
        CryptoVault::from_config(&self.config.vault)
    }
}

/// Load configuration (from `path`, or defaults plus environment) and
/// initialize subsystems.
///
/// Must be called from inside a tokio runtime when metrics are enabled.
pub fn start(path: Option<&Path>) -> Result<Services, ConfigError> {
    let config = match path {
        Some(path) => config::load_config(path)?,
        None => config::config_from_env()?,
    };
    Ok(init(config))
}

/// Initialize subsystems for an already validated configuration.
pub fn init(config: ResilienceConfig) -> Services {
    observability::logging::init(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let events: Arc<dyn EventSink> = Arc::new(TracingSink);
    let registry = BreakerRegistry::new(config.circuit_breaker.to_options()).with_events(events.clone());

    tracing::info!(
        failure_threshold = config.circuit_breaker.failure_threshold,
        max_attempts = config.retry.max_attempts,
        endpoint = %config.license.endpoint,
        "Configuration loaded"
    );

    Services {
        config,
        registry: Arc::new(registry),
        events,
        shutdown: Arc::new(Shutdown::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_builds_registry_from_config() {
        let mut config = ResilienceConfig::default();
        config.circuit_breaker.failure_threshold = 7;

        let services = init(config);
        let breaker = services.registry.get_or_create("license:test");
        assert_eq!(breaker.options().failure_threshold, 7);
        assert!(!services.shutdown.is_triggered());
        assert!(matches!(services.vault(), Err(VaultError::MissingSecret)));
    }
}
