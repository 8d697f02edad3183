//! Persistence tests for the encrypted license store.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use licensing_resilience::licensing::{LicenseError, LicenseRecord, LicenseStatus, LicenseStore};
use licensing_resilience::security::{vault, CryptoVault, VaultError};

mod common;

fn store(dir: &tempfile::TempDir) -> LicenseStore {
    let config = common::test_config(common::dead_address());
    let vault = CryptoVault::from_config(&config.vault).unwrap();
    LicenseStore::new(dir.path().join("license.vault"), vault)
}

fn record() -> LicenseRecord {
    LicenseRecord {
        license_key: "LIC-7".into(),
        fingerprint: "device-a".into(),
        status: LicenseStatus::Valid,
        expires_at: 1_900_000_000,
        validated_at: 1_700_000_000,
    }
}

#[test]
fn test_flipped_byte_fails_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&record()).unwrap();

    let blob = std::fs::read_to_string(store.path()).unwrap();
    let mut bytes = STANDARD.decode(blob.trim()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(store.path(), STANDARD.encode(&bytes)).unwrap();

    let err = store.load().unwrap_err();
    assert!(matches!(err, LicenseError::Vault(VaultError::Authentication)), "got {err}");
}

#[test]
fn test_truncated_blob() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    std::fs::write(store.path(), STANDARD.encode([0u8; vault::HEADER_LEN - 1])).unwrap();

    let err = store.load().unwrap_err();
    assert!(matches!(err, LicenseError::Vault(VaultError::Truncated { .. })), "got {err}");
}

#[test]
fn test_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    store(&dir).save(&record()).unwrap();

    let reopened = store(&dir);
    let loaded = reopened.load().unwrap().unwrap();
    assert_eq!(loaded, record());
    assert!(loaded.is_active_at(1_800_000_000));
}
