//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply LICENSE_VAULT_SECRET)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → to_options() into breaker / retry / vault constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Durations are plain `*_ms` integers in the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{config_from_env, load_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, LicenseConfig, ObservabilityConfig, ResilienceConfig, RetryConfig, VaultConfig,
};
pub use validation::{validate_config, ValidationError};
