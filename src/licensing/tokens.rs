//! Signed device tokens.
//!
//! A token binds a device fingerprint to an expiry:
//!
//! ```text
//! base64url(json{fingerprint, expires_at}) "." hex(hmac_sha256(payload))
//! ```
//!
//! The signature is checked before the payload is trusted or decoded.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::licensing::types::now_secs;
use crate::security::CryptoVault;

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub fingerprint: String,

    /// Expiry timestamp (seconds since epoch).
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token expired at {expires_at}")]
    Expired { expires_at: u64 },
}

/// Issue a token for `fingerprint` valid until `expires_at`.
pub fn issue_token(vault: &CryptoVault, fingerprint: &str, expires_at: u64) -> Result<String, serde_json::Error> {
    let claims = TokenClaims {
        fingerprint: fingerprint.to_string(),
        expires_at,
    };
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signature = vault.generate_signature(payload.as_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Verify `token` against the current time.
pub fn verify_token(vault: &CryptoVault, token: &str) -> Result<TokenClaims, TokenError> {
    verify_token_at(vault, token, now_secs())
}

/// Verify `token` as of `now` (seconds since epoch).
pub fn verify_token_at(vault: &CryptoVault, token: &str, now: u64) -> Result<TokenClaims, TokenError> {
    let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
    if payload.is_empty() {
        return Err(TokenError::Malformed);
    }
    if !vault.verify_signature(payload.as_bytes(), signature) {
        return Err(TokenError::BadSignature);
    }

    let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
    let claims: TokenClaims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

    if claims.expires_at <= now {
        return Err(TokenError::Expired {
            expires_at: claims.expires_at,
        });
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::KdfParams;

    fn vault(secret: &str) -> CryptoVault {
        let params = KdfParams {
            log_n: 10,
            ..KdfParams::default()
        };
        CryptoVault::new(secret, "token-tests", &params).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let v = vault("k1");
        let token = issue_token(&v, "device.a", 2_000).unwrap();
        assert_eq!(token.matches('.').count(), 1);

        let claims = verify_token_at(&v, &token, 1_000).unwrap();
        assert_eq!(claims.fingerprint, "device.a");
        assert_eq!(claims.expires_at, 2_000);
    }

    #[test]
    fn test_expired_after_valid_signature() {
        let v = vault("k1");
        let token = issue_token(&v, "device-a", 2_000).unwrap();
        assert_eq!(verify_token_at(&v, &token, 2_000), Err(TokenError::Expired { expires_at: 2_000 }));

        // A forged expiry is caught by the signature, not the clock.
        let forged = issue_token(&vault("k2"), "device-a", 1).unwrap();
        assert_eq!(verify_token_at(&v, &forged, 2_000), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload() {
        let v = vault("k1");
        let token = issue_token(&v, "device-a", 2_000).unwrap();
        let (payload, signature) = token.split_once('.').unwrap();
        let other = issue_token(&v, "device-b", 2_000).unwrap();
        let (other_payload, _) = other.split_once('.').unwrap();
        assert_ne!(payload, other_payload);

        let swapped = format!("{other_payload}.{signature}");
        assert_eq!(verify_token_at(&v, &swapped, 1_000), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed() {
        let v = vault("k1");
        assert_eq!(verify_token_at(&v, "no-separator", 0), Err(TokenError::Malformed));
        assert_eq!(verify_token_at(&v, ".abcd", 0), Err(TokenError::Malformed));
        assert_eq!(verify_token_at(&v, "payload.zz", 0), Err(TokenError::BadSignature));

        let sig = v.generate_signature(b"!!notbase64");
        assert_eq!(verify_token_at(&v, &format!("!!notbase64.{sig}"), 0), Err(TokenError::Malformed));
    }
}
