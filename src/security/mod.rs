//! Security subsystem.
//!
//! # Responsibilities
//! - Derive the vault key once at startup (kdf.rs)
//! - Encrypt persisted license payloads and sign tokens (vault.rs)
//!
//! # Design Decisions
//! - No key material is logged, serialised or printed by `Debug`
//! - Cryptographic failures surface immediately; nothing is recovered locally

pub mod kdf;
pub mod vault;

pub use kdf::KdfParams;
pub use vault::{CryptoVault, VaultError};
