//! Errors raised while reading `ember.toml`.

use std::path::PathBuf;

/// Why a configuration file was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The content is not valid TOML or does not match the settings schema.
    #[error("malformed configuration: {0}")]
    Parse(String),

    /// A setting is outside its allowed range.
    #[error("invalid setting '{key}': {reason}")]
    Invalid {
        /// Dotted key of the setting, e.g. `sim.max_settle_passes`.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_key() {
        let err = ConfigError::Invalid {
            key: "lower.indent",
            reason: "must be at most 8, got 12".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting 'lower.indent': must be at most 8, got 12"
        );
    }

    #[test]
    fn read_error_names_the_file() {
        let err = ConfigError::Read {
            path: PathBuf::from("/work/ember.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot read '/work/ember.toml': denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
