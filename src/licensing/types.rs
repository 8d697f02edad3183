//! License data types.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Verdict of the license service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Valid,
    Invalid,
    Expired,
    Revoked,
}

/// Body of `POST /licenses/validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRequest<'a> {
    pub license_key: &'a str,
    pub fingerprint: &'a str,
}

/// Response of the license service.
///
/// A 4xx from the service is folded into a response with
/// `status: Invalid` and the body as `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub status: LicenseStatus,

    /// Expiry timestamp (seconds since epoch).
    #[serde(default)]
    pub expires_at: Option<u64>,

    #[serde(default)]
    pub message: Option<String>,
}

impl ValidationResponse {
    pub fn is_valid(&self) -> bool {
        self.status == LicenseStatus::Valid
    }
}

/// A validated license as persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub license_key: String,
    pub fingerprint: String,
    pub status: LicenseStatus,

    /// Expiry timestamp (seconds since epoch).
    pub expires_at: u64,

    /// When the service last confirmed this license.
    pub validated_at: u64,
}

impl LicenseRecord {
    /// Build a record from a positive service response.
    pub fn from_response(license_key: &str, fingerprint: &str, response: &ValidationResponse) -> Self {
        Self {
            license_key: license_key.to_string(),
            fingerprint: fingerprint.to_string(),
            status: response.status,
            expires_at: response.expires_at.unwrap_or(u64::MAX),
            validated_at: now_secs(),
        }
    }

    /// Valid and not past its expiry.
    pub fn is_active(&self) -> bool {
        self.is_active_at(now_secs())
    }

    pub fn is_active_at(&self, now: u64) -> bool {
        self.status == LicenseStatus::Valid && self.expires_at > now
    }

    /// Like [`is_active`](Self::is_active), tolerating `grace_secs` past expiry.
    pub fn is_active_with_grace(&self, grace_secs: u64) -> bool {
        self.status == LicenseStatus::Valid && self.expires_at.saturating_add(grace_secs) > now_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: LicenseStatus, expires_at: u64) -> LicenseRecord {
        LicenseRecord {
            license_key: "LIC-1".into(),
            fingerprint: "device-a".into(),
            status,
            expires_at,
            validated_at: 0,
        }
    }

    #[test]
    fn test_active_requires_valid_status() {
        assert!(record(LicenseStatus::Valid, 200).is_active_at(100));
        assert!(!record(LicenseStatus::Valid, 100).is_active_at(100));
        assert!(!record(LicenseStatus::Revoked, 200).is_active_at(100));
    }

    #[test]
    fn test_grace_period() {
        let expired = record(LicenseStatus::Valid, now_secs() - 10);
        assert!(!expired.is_active());
        assert!(expired.is_active_with_grace(30));
        assert!(!expired.is_active_with_grace(5));
    }

    #[test]
    fn test_response_wire_format() {
        let response: ValidationResponse =
            serde_json::from_str(r#"{"status":"valid","expires_at":1900000000}"#).unwrap();
        assert!(response.is_valid());
        assert_eq!(response.message, None);

        let record = LicenseRecord::from_response("LIC-1", "device-a", &response);
        assert_eq!(record.expires_at, 1_900_000_000);

        let body = serde_json::to_value(ValidationRequest {
            license_key: "LIC-1",
            fingerprint: "device-a",
        })
        .unwrap();
        assert_eq!(body["license_key"], "LIC-1");
    }
}
