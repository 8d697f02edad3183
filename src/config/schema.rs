//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! licensing resilience core. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::{BreakerOptions, ErrorPattern, RetryOptions};
use crate::security::KdfParams;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker defaults for protected resources.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Default retry policy.
    pub retry: RetryConfig,

    /// Vault key derivation settings and secret.
    pub vault: VaultConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Remote license service settings.
    pub license: LicenseConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens.
    pub failure_threshold: u32,

    /// Cooldown before a half-open probe, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Successful probes needed to close again.
    pub half_open_retries: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            half_open_retries: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn to_options(&self) -> BreakerOptions {
        BreakerOptions {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            half_open_retries: self.half_open_retries,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,

    /// First backoff delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,

    /// Per-attempt timeout in milliseconds. Unset means unbounded.
    pub timeout_ms: Option<u64>,

    /// Substrings marking an error as retryable. Empty retries everything.
    pub retryable_errors: Vec<String>,

    /// Regular expressions marking an error as retryable.
    pub retryable_patterns: Vec<String>,

    /// Add 0–10% jitter to backoff sleeps.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            timeout_ms: None,
            retryable_errors: Vec::new(),
            retryable_patterns: Vec::new(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Build runtime options. Fails only on an invalid regex.
    pub fn to_options(&self) -> Result<RetryOptions, regex::Error> {
        let mut retryable_errors: Vec<ErrorPattern> =
            self.retryable_errors.iter().map(ErrorPattern::contains).collect();
        for pattern in &self.retryable_patterns {
            retryable_errors.push(ErrorPattern::regex(pattern)?);
        }

        Ok(RetryOptions {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_factor: self.backoff_factor,
            timeout: self.timeout_ms.map(Duration::from_millis),
            retryable_errors,
            jitter: self.jitter,
        })
    }
}

/// Vault configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Master secret. Usually supplied through `LICENSE_VAULT_SECRET`.
    #[serde(skip_serializing)]
    pub secret: Option<String>,

    /// Fixed application salt for key derivation.
    pub kdf_salt: String,

    /// scrypt cost, log2(N).
    pub scrypt_log_n: u8,

    /// scrypt block size.
    pub scrypt_r: u32,

    /// scrypt parallelism.
    pub scrypt_p: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let params = KdfParams::default();
        Self {
            secret: None,
            kdf_salt: "licensing-resilience.vault".to_string(),
            scrypt_log_n: params.log_n,
            scrypt_r: params.r,
            scrypt_p: params.p,
        }
    }
}

impl VaultConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            log_n: self.scrypt_log_n,
            r: self.scrypt_r,
            p: self.scrypt_p,
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("kdf_salt", &self.kdf_salt)
            .field("scrypt_log_n", &self.scrypt_log_n)
            .field("scrypt_r", &self.scrypt_r)
            .field("scrypt_p", &self.scrypt_p)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Remote license service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Base URL of the license validation service.
    pub endpoint: String,

    /// Transport-level timeout for one HTTP request, in milliseconds.
    pub request_timeout_ms: u64,

    /// Where the encrypted license record is persisted.
    pub store_path: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 5000,
            store_path: "license.vault".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ResilienceConfig = toml::from_str("[retry]\nmax_attempts = 5\n").unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.vault.scrypt_log_n, 14);
    }

    #[test]
    fn test_retry_options_conversion() {
        let config = RetryConfig {
            timeout_ms: Some(250),
            retryable_errors: vec!["timeout".into()],
            retryable_patterns: vec![r"5\d\d".into()],
            ..RetryConfig::default()
        };
        let opts = config.to_options().unwrap();
        assert_eq!(opts.timeout, Some(Duration::from_millis(250)));
        assert_eq!(opts.retryable_errors.len(), 2);
        assert!(opts.retryable_errors[1].matches("HTTP 502"));

        let bad = RetryConfig {
            retryable_patterns: vec!["(".into()],
            ..RetryConfig::default()
        };
        assert!(bad.to_options().is_err());
    }

    #[test]
    fn test_secret_never_serialized_or_printed() {
        let vault = VaultConfig {
            secret: Some("hunter2".into()),
            ..VaultConfig::default()
        };
        let toml = toml::to_string(&vault).unwrap();
        assert!(!toml.contains("hunter2"));
        assert!(!format!("{vault:?}").contains("hunter2"));
    }
}
