//! Configuration structures for the file-events workspace.
//!
//! This module provides configuration types for all components:
//!
//! - [`WatchConfig`] - Watch session settings (backend, recursion, callback policy)
//! - [`LoggingConfig`] - Default log filter for binaries
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`], and every field may be
//! omitted from a JSON configuration file.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which OS notification mechanism a session is built on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
#[non_exhaustive]
pub enum BackendKind {
    /// The platform-native watcher (inotify, FSEvents, `ReadDirectoryChangesW`).
    #[default]
    Recommended,
    /// A portable polling watcher that re-scans watched paths periodically.
    Poll {
        /// Interval between scans in milliseconds.
        interval_ms: u64,
    },
}

/// What the callback bridge does when an application callback panics.
///
/// A panic never unwinds into backend-owned code regardless of the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CallbackFailurePolicy {
    /// Report the panic through the application's error callback.
    #[default]
    ReportError,
    /// Log the panic and abort the process.
    Abort,
}

/// Configuration for a watch session.
///
/// # Examples
///
/// ```
/// use fe_core::{BackendKind, CallbackFailurePolicy, WatchConfig};
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert_eq!(config.backend, BackendKind::Recommended);
/// assert_eq!(config.callback_failure, CallbackFailurePolicy::ReportError);
/// assert_eq!(config.channel_capacity, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether watched directories are observed recursively.
    pub recursive: bool,

    /// Which notification backend to use.
    pub backend: BackendKind,

    /// How panics raised inside application callbacks are handled.
    pub callback_failure: CallbackFailurePolicy,

    /// Capacity of the event channel used by channel-based consumers.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            backend: BackendKind::Recommended,
            callback_failure: CallbackFailurePolicy::ReportError,
            channel_capacity: 100,
        }
    }
}

impl WatchConfig {
    /// Checks that every option holds a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero channel capacity or a
    /// zero polling interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "watch.channel_capacity",
                "must be greater than zero",
            ));
        }
        if let BackendKind::Poll { interval_ms: 0 } = self.backend {
            return Err(ConfigError::invalid_option(
                "watch.backend.interval_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Logging defaults for binaries in the workspace.
///
/// `RUST_LOG` always takes precedence over [`LoggingConfig::filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `"info,fe_watcher=debug"`.
    pub filter: Option<String>,
}

/// Root configuration for the file-events tools.
///
/// # Examples
///
/// ```
/// use fe_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"watch": {"recursive": false}}"#).unwrap();
/// assert!(!config.watch.recursive);
/// assert_eq!(config.watch.channel_capacity, 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watch session configuration.
    pub watch: WatchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist,
    /// [`ConfigError::Io`] or [`ConfigError::Parse`] if it cannot be read, and
    /// [`ConfigError::InvalidOption`] if validation fails.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_owned()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all nested configuration sections.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::InvalidOption`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watch.validate()
    }
}
