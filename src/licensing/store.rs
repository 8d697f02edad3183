//! Encrypted persistence of the validated license.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::licensing::types::LicenseRecord;
use crate::licensing::LicenseError;
use crate::observability::metrics;
use crate::security::CryptoVault;

/// Stores one [`LicenseRecord`] on disk as a vault blob.
///
/// The file holds `base64(salt ∥ iv ∥ tag ∥ ciphertext)` of the record's
/// JSON; any modification fails authentication on load.
#[derive(Debug, Clone)]
pub struct LicenseStore {
    path: PathBuf,
    vault: CryptoVault,
}

impl LicenseStore {
    pub fn new(path: impl Into<PathBuf>, vault: CryptoVault) -> Self {
        Self {
            path: path.into(),
            vault,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypt and write `record`, replacing any previous one.
    ///
    /// Writes to a sibling temp file first so a crash never leaves a
    /// half-written blob behind.
    pub fn save(&self, record: &LicenseRecord) -> Result<(), LicenseError> {
        let json = serde_json::to_string(record)?;
        let blob = self.vault.encrypt(&json)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(blob.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        metrics::record_store_operation("save", true);
        tracing::info!(path = %self.path.display(), expires_at = record.expires_at, "License record saved");
        Ok(())
    }

    /// Load the stored record. `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<LicenseRecord>, LicenseError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let blob = fs::read_to_string(&self.path)?;

        let json = match self.vault.decrypt(blob.trim()) {
            Ok(json) => json,
            Err(e) => {
                metrics::record_store_operation("load", false);
                tracing::warn!(path = %self.path.display(), error = %e, "Stored license rejected");
                return Err(e.into());
            }
        };
        let record: LicenseRecord = serde_json::from_str(&json)?;

        metrics::record_store_operation("load", true);
        tracing::debug!(path = %self.path.display(), "License record loaded");
        Ok(Some(record))
    }

    /// Remove the stored record, if any.
    pub fn clear(&self) -> Result<(), LicenseError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
