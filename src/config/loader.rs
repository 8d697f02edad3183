//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ResilienceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable carrying the vault secret.
pub const SECRET_ENV: &str = "LICENSE_VAULT_SECRET";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file, then apply
/// environment overrides.
pub fn load_config(path: &Path) -> Result<ResilienceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content, |key| std::env::var(key).ok())?;
    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Defaults plus environment overrides, for running without a file.
pub fn config_from_env() -> Result<ResilienceConfig, ConfigError> {
    let mut config = ResilienceConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse TOML text, apply overrides from `env`, and validate.
pub fn parse_config<F>(content: &str, env: F) -> Result<ResilienceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: ResilienceConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// The environment wins over the file for the vault secret.
pub fn apply_env_overrides<F>(config: &mut ResilienceConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = env(SECRET_ENV).filter(|s| !s.is_empty()) {
        config.vault.secret = Some(secret);
    }
}
