//! Error types for the fe-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related errors
//! that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use fe_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::NotFound(Utf8PathBuf::from("/etc/fe-watch.json"));
/// assert!(error.to_string().contains("/etc/fe-watch.json"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = ConfigError::NotFound(Utf8PathBuf::from("/missing/config.json"));
        assert_eq!(
            error.to_string(),
            "configuration file not found: /missing/config.json"
        );
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("watch.channel_capacity", "must be positive");
        let msg = error.to_string();
        assert!(msg.contains("watch.channel_capacity"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_parse_error_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json")
            .expect_err("input is malformed");
        let error = ConfigError::from(parse);
        assert!(error.to_string().starts_with("failed to parse configuration"));
    }
}
