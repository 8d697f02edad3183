//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, delays ordered, factor >= 1)
//! - Compile retry patterns and parse addresses up front
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: &ResilienceConfig → Result<(), Vec<ValidationError>>
//! - The vault secret is checked at vault construction, not here

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ResilienceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("circuit_breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("circuit_breaker.half_open_retries must be at least 1")]
    ZeroHalfOpenRetries,

    #[error("retry.max_attempts must be at least 1")]
    ZeroMaxAttempts,

    #[error("retry.backoff_factor must be a finite number >= 1 (got {0})")]
    InvalidBackoffFactor(f64),

    #[error("retry.initial_delay_ms ({initial}) exceeds retry.max_delay_ms ({max})")]
    DelayOrder { initial: u64, max: u64 },

    #[error("retry.timeout_ms must be greater than 0")]
    ZeroTimeout,

    #[error("retry pattern '{pattern}' is invalid: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("vault scrypt parameters are invalid: {0}")]
    InvalidScrypt(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("license.endpoint '{url}' is invalid: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if cb.half_open_retries == 0 {
        errors.push(ValidationError::ZeroHalfOpenRetries);
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::ZeroMaxAttempts);
    }
    if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
        errors.push(ValidationError::InvalidBackoffFactor(retry.backoff_factor));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            initial: retry.initial_delay_ms,
            max: retry.max_delay_ms,
        });
    }
    if retry.timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout);
    }
    for pattern in &retry.retryable_patterns {
        if let Err(e) = regex::Regex::new(pattern) {
            errors.push(ValidationError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    let vault = &config.vault;
    if let Err(e) = scrypt::Params::new(vault.scrypt_log_n, vault.scrypt_r, vault.scrypt_p, 32) {
        errors.push(ValidationError::InvalidScrypt(e.to_string()));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }

    match Url::parse(&config.license.endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidEndpoint {
            url: config.license.endpoint.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidEndpoint {
            url: config.license.endpoint.clone(),
            reason: e.to_string(),
        }),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
