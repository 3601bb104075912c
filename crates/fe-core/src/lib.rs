//! Core configuration types and errors for the file-events workspace.
//!
//! This crate provides the foundational types shared by the watcher and the
//! command-line front end:
//!
//! - [`Config`] - Root configuration loaded from JSON
//! - [`WatchConfig`] - Session settings (backend selection, recursion, callback policy)
//! - [`LoggingConfig`] - Default tracing directive for binaries
//! - [`ConfigError`] - Errors raised while loading or validating configuration

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{BackendKind, CallbackFailurePolicy, Config, LoggingConfig, WatchConfig};
pub use error::ConfigError;
