//! Remote license validation.
//!
//! # Responsibilities
//! - POST license key + device fingerprint to the license service
//! - Classify responses: 2xx parsed, 4xx is a verdict, 5xx is a failure
//! - Route every call through `call_protected` so outages trip the breaker
//!
//! # Design Decisions
//! - One breaker per endpoint host, taken from a shared registry
//! - A 4xx is an answer, not an outage, so it never counts against the breaker
//! - Every request carries a fresh `x-request-id`

use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::config::schema::{LicenseConfig, ResilienceConfig};
use crate::licensing::types::{LicenseStatus, ValidationRequest, ValidationResponse};
use crate::licensing::LicenseError;
use crate::lifecycle::CancelToken;
use crate::observability::EventSink;
use crate::resilience::{call_protected, BreakerRegistry, CircuitBreaker, RetryExecutor, RetryOptions};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Why one request to the license service failed.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("license service error: HTTP {status}")]
    Server { status: u16 },

    #[error("malformed license service response: {0}")]
    Decode(String),
}

/// Client for the remote license service.
#[derive(Debug, Clone)]
pub struct LicenseClient {
    http: reqwest::Client,
    validate_url: Url,
    breaker: Arc<CircuitBreaker>,
    executor: Arc<RetryExecutor>,
}

impl LicenseClient {
    /// Build a client whose breaker is owned by `registry`. Retry events go
    /// to `events`.
    pub fn new(
        config: &ResilienceConfig,
        registry: &BreakerRegistry,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, LicenseError> {
        let validate_url = validate_url(&config.license)?;
        let breaker_name = format!("license:{}", validate_url.host_str().unwrap_or("unknown"));
        let breaker = registry.get_or_create_with(&breaker_name, config.circuit_breaker.to_options());

        let retry = config
            .retry
            .to_options()
            .map_err(|e| LicenseError::Config(e.to_string()))?;
        let executor = RetryExecutor::new(breaker_name, retry).with_events(events);

        Self::with_parts(&config.license, breaker, executor)
    }

    /// Build from an explicit breaker and executor.
    pub fn with_parts(
        config: &LicenseConfig,
        breaker: Arc<CircuitBreaker>,
        executor: RetryExecutor,
    ) -> Result<Self, LicenseError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| LicenseError::Config(e.to_string()))?;

        Ok(Self {
            http,
            validate_url: validate_url(config)?,
            breaker,
            executor: Arc::new(executor),
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Validate `license_key` for the device identified by `fingerprint`.
    pub async fn validate(&self, license_key: &str, fingerprint: &str) -> Result<ValidationResponse, LicenseError> {
        self.validate_with(license_key, fingerprint, self.executor.defaults())
            .await
    }

    /// Like [`validate`](Self::validate) with an explicit retry policy.
    pub async fn validate_with(
        &self,
        license_key: &str,
        fingerprint: &str,
        options: &RetryOptions,
    ) -> Result<ValidationResponse, LicenseError> {
        let request = ValidationRequest { license_key, fingerprint };
        let response = call_protected(&self.breaker, &self.executor, options, || self.send(&request)).await?;
        log_verdict(&response);
        Ok(response)
    }

    /// Like [`validate`](Self::validate), abandoned as soon as `token` fires.
    pub async fn validate_cancellable(
        &self,
        token: &CancelToken,
        license_key: &str,
        fingerprint: &str,
    ) -> Result<ValidationResponse, LicenseError> {
        let request = ValidationRequest { license_key, fingerprint };
        let executor = &self.executor;
        let response = self
            .breaker
            .execute_cancellable(token, || async {
                executor
                    .retry_cancellable(token, || self.send(&request), executor.defaults())
                    .await
                    .into_result()
            })
            .await?;
        log_verdict(&response);
        Ok(response)
    }

    async fn send(&self, request: &ValidationRequest<'_>) -> Result<ValidationResponse, RequestError> {
        let request_id = Uuid::new_v4().to_string();
        let res = self
            .http
            .post(self.validate_url.clone())
            .header(REQUEST_ID_HEADER, &request_id)
            .json(request)
            .send()
            .await?;

        let status = res.status();
        tracing::debug!(request_id = %request_id, status = status.as_u16(), "License service responded");

        if status.is_server_error() {
            return Err(RequestError::Server { status: status.as_u16() });
        }
        if status.is_client_error() {
            let body = res.text().await.unwrap_or_default();
            return Ok(ValidationResponse {
                status: LicenseStatus::Invalid,
                expires_at: None,
                message: Some(if body.is_empty() { status.to_string() } else { body }),
            });
        }

        let body = res.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

fn validate_url(config: &LicenseConfig) -> Result<Url, LicenseError> {
    let mut base = Url::parse(&config.endpoint)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("licenses/validate")?)
}

fn log_verdict(response: &ValidationResponse) {
    if response.is_valid() {
        tracing::info!(expires_at = ?response.expires_at, "License validated");
    } else {
        tracing::warn!(status = ?response.status, message = ?response.message, "License rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn license(endpoint: &str) -> LicenseConfig {
        LicenseConfig {
            endpoint: endpoint.to_string(),
            ..LicenseConfig::default()
        }
    }

    #[test]
    fn test_validate_url_keeps_base_path() {
        let url = validate_url(&license("https://licenses.example.com")).unwrap();
        assert_eq!(url.as_str(), "https://licenses.example.com/licenses/validate");

        let url = validate_url(&license("https://example.com/api/v2")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/v2/licenses/validate");

        assert!(validate_url(&license("not a url")).is_err());
    }

    #[test]
    fn test_breaker_named_after_host() {
        let registry = BreakerRegistry::new(Default::default());
        let mut config = ResilienceConfig::default();
        config.license = license("http://licenses.internal:9000");

        let client = LicenseClient::new(&config, &registry, Arc::new(crate::observability::NoopSink)).unwrap();
        assert_eq!(client.breaker().name(), "license:licenses.internal");
        assert!(registry.get("license:licenses.internal").is_some());
    }

    #[test]
    fn test_server_error_message_is_retryable_text() {
        let err = RequestError::Server { status: 503 };
        assert_eq!(err.to_string(), "license service error: HTTP 503");
    }
}
