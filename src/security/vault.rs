//! Authenticated encryption and HMAC signing under one derived key.
//!
//! # Blob Format
//! ```text
//! base64( salt[64] ‖ iv[16] ‖ tag[16] ‖ ciphertext[..] )
//! ```
//!
//! # Design Decisions
//! - AES-256-GCM with a 16-byte IV; fresh random IV and salt per message
//! - Fixed-key model: the key is derived once from the configured secret and
//!   the application salt. The per-message salt is written for format
//!   compatibility and is not read back on decrypt, so it is also not
//!   covered by the tag
//! - Tag failure is a distinct error; no partial plaintext is ever returned
//! - Signatures are hex HMAC-SHA256, verified in constant time

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::schema::VaultConfig;
use crate::observability::metrics;
use crate::security::kdf::{derive_key, KdfParams};

pub const SALT_LEN: usize = 64;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
/// Bytes preceding the ciphertext in a decoded blob.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN + TAG_LEN;

type Aes256Gcm16 = AesGcm<Aes256, U16>;
type HmacSha256 = Hmac<Sha256>;

/// Vault failures.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No secret configured. Fatal at startup.
    #[error("vault secret is not configured")]
    MissingSecret,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed")]
    Encryption,

    #[error("blob is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("blob too short: {len} bytes, need at least {HEADER_LEN}")]
    Truncated { len: usize },

    /// Tag verification failed: tampered blob or wrong key.
    #[error("authentication failed: blob was tampered with or encrypted under another key")]
    Authentication,

    #[error("decrypted payload is not valid UTF-8")]
    Utf8,
}

/// Symmetric encryption and signing service.
///
/// Read-only after construction; share freely across tasks.
#[derive(Clone)]
pub struct CryptoVault {
    cipher: Aes256Gcm16,
    mac: HmacSha256,
}

impl std::fmt::Debug for CryptoVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CryptoVault { key: <redacted> }")
    }
}

impl CryptoVault {
    /// Derive the vault key from `secret` and the fixed application `salt`.
    pub fn new(secret: &str, salt: &str, params: &KdfParams) -> Result<Self, VaultError> {
        if secret.is_empty() {
            return Err(VaultError::MissingSecret);
        }
        let key = derive_key(secret.as_bytes(), salt.as_bytes(), params)?;

        let cipher = Aes256Gcm16::new_from_slice(&key[..])
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
        let mac = <HmacSha256 as Mac>::new_from_slice(&key[..])
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

        tracing::debug!(log_n = params.log_n, "Vault key derived");
        Ok(Self { cipher, mac })
    }

    /// Build from configuration. Fails with [`VaultError::MissingSecret`]
    /// when no secret was provided by file or environment.
    pub fn from_config(config: &VaultConfig) -> Result<Self, VaultError> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(VaultError::MissingSecret)?;
        Self::new(secret, &config.kdf_salt, &config.kdf_params())
    }

    /// Encrypt UTF-8 text into an opaque blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        self.encrypt_bytes(plaintext.as_bytes())
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, blob: &str) -> Result<String, VaultError> {
        let bytes = self.decrypt_bytes(blob)?;
        String::from_utf8(bytes).map_err(|_| VaultError::Utf8)
    }

    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| {
                metrics::record_vault_operation("encrypt", false);
                VaultError::Encryption
            })?;

        let mut blob = Vec::with_capacity(HEADER_LEN + buffer.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(tag.as_slice());
        blob.extend_from_slice(&buffer);

        metrics::record_vault_operation("encrypt", true);
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt_bytes(&self, blob: &str) -> Result<Vec<u8>, VaultError> {
        let result = self.open(blob);
        metrics::record_vault_operation("decrypt", result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Vault decrypt failed");
        }
        result
    }

    fn open(&self, blob: &str) -> Result<Vec<u8>, VaultError> {
        let raw = STANDARD.decode(blob.trim())?;
        if raw.len() < HEADER_LEN {
            return Err(VaultError::Truncated { len: raw.len() });
        }

        // Salt occupies raw[..SALT_LEN]; the fixed key does not depend on it.
        let (iv, rest) = raw[SALT_LEN..].split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| VaultError::Authentication)?;
        Ok(buffer)
    }

    /// Hex HMAC-SHA256 of `data` under the vault key.
    pub fn generate_signature(&self, data: &[u8]) -> String {
        hex::encode(self.sign_raw(data))
    }

    /// Check `signature` against `data` in constant time.
    ///
    /// Malformed hex or a wrong length is simply `false`.
    pub fn verify_signature(&self, data: &[u8], signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        let expected = self.sign_raw(data);
        bool::from(expected.as_slice().ct_eq(provided.as_slice()))
    }

    fn sign_raw(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
