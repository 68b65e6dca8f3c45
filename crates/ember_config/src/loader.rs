//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::EmberConfig;
use std::path::Path;

/// File name looked up by [`load_config_from_dir`].
pub const CONFIG_FILE_NAME: &str = "ember.toml";

/// Loads and validates a configuration file at an explicit path.
pub fn load_config(path: &Path) -> Result<EmberConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Loads `<dir>/ember.toml` if it exists, or returns the defaults.
pub fn load_config_from_dir(dir: &Path) -> Result<EmberConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(EmberConfig::default());
    }
    load_config(&path)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<EmberConfig, ConfigError> {
    let config: EmberConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks value ranges that the type system cannot express.
fn validate_config(config: &EmberConfig) -> Result<(), ConfigError> {
    if config.sim.max_settle_passes == 0 {
        return Err(ConfigError::Invalid {
            key: "sim.max_settle_passes",
            reason: "must be at least 1".to_string(),
        });
    }
    if config.lower.indent > 8 {
        return Err(ConfigError::Invalid {
            key: "lower.indent",
            reason: format!("must be at most 8, got {}", config.lower.indent),
        });
    }
    if config.lower.clock.is_empty() {
        return Err(ConfigError::Invalid {
            key: "lower.clock",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}
