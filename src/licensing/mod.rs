//! Licensing subsystem.
//!
//! # Data Flow
//! ```text
//! license-guard validate
//!     → client.rs (POST /licenses/validate through breaker + retry)
//!     → types.rs (ValidationResponse → LicenseRecord)
//!     → store.rs (vault-encrypted record on disk)
//!
//! offline check
//!     → store.rs load (tamper ⇒ Authentication error)
//!     → tokens.rs (signed fingerprint tokens)
//! ```

pub mod client;
pub mod store;
pub mod tokens;
pub mod types;

pub use client::{LicenseClient, RequestError};
pub use store::LicenseStore;
pub use tokens::{issue_token, verify_token, TokenClaims, TokenError};
pub use types::{LicenseRecord, LicenseStatus, ValidationResponse};

use crate::resilience::{AttemptError, BreakerError};
use crate::resilience::timeouts::Elapsed;
use crate::security::VaultError;

/// Errors surfaced by the licensing subsystem.
#[derive(Debug, thiserror::Error)]
pub enum LicenseError {
    /// The breaker is open; the service was not contacted.
    #[error("license service unavailable: circuit '{breaker}' is open")]
    Unavailable { breaker: String },

    #[error("license request cancelled")]
    Cancelled,

    #[error("license request {0}")]
    TimedOut(Elapsed),

    #[error("license request failed: {0}")]
    Request(RequestError),

    #[error("invalid license configuration: {0}")]
    Config(String),

    #[error("invalid license endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("license store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("license record is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BreakerError<AttemptError<RequestError>>> for LicenseError {
    fn from(err: BreakerError<AttemptError<RequestError>>) -> Self {
        match err {
            BreakerError::Open { breaker } => LicenseError::Unavailable { breaker },
            BreakerError::Cancelled | BreakerError::Operation(AttemptError::Cancelled) => LicenseError::Cancelled,
            BreakerError::Operation(AttemptError::TimedOut(elapsed)) => LicenseError::TimedOut(elapsed),
            BreakerError::Operation(AttemptError::Operation(e)) => LicenseError::Request(e),
        }
    }
}

impl LicenseError {
    /// The service could not be reached or gave no usable answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LicenseError::Unavailable { .. } | LicenseError::TimedOut(_) | LicenseError::Request(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_breaker_error_mapping() {
        let open: LicenseError = BreakerError::<AttemptError<RequestError>>::Open {
            breaker: "license:example".into(),
        }
        .into();
        assert!(matches!(open, LicenseError::Unavailable { .. }));
        assert!(open.is_unavailable());

        let timed_out: LicenseError =
            BreakerError::Operation(AttemptError::<RequestError>::TimedOut(Elapsed(Duration::from_millis(50)))).into();
        assert_eq!(timed_out.to_string(), "license request operation timed out (timeout: 50ms)");

        let cancelled: LicenseError = BreakerError::<AttemptError<RequestError>>::Cancelled.into();
        assert!(matches!(cancelled, LicenseError::Cancelled));
        assert!(!cancelled.is_unavailable());
    }
}
