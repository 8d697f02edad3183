//! scrypt key derivation for the vault key.

use zeroize::Zeroizing;

use crate::security::vault::VaultError;

/// Length of the derived vault key.
pub const KEY_LEN: usize = 32;

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// log2 of the CPU/memory cost `N`.
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // N = 16384, r = 8, p = 1
        Self { log_n: 14, r: 8, p: 1 }
    }
}

/// Derive a 32-byte key from `secret` and a fixed application `salt`.
pub fn derive_key(secret: &[u8], salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, KEY_LEN)
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(secret, salt, &scrypt_params, &mut key[..])
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
