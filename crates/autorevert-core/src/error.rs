//! Core error types for autorevert-core.
//!
//! The revert timer itself never fails; these errors come from the
//! collaborators around it (configuration, git, validation).

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Home/config directory could not be prepared
    #[error("Config directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by a [`RevertAction`](crate::revert::RevertAction).
///
/// The timer does not inspect these; they are logged and handed to the
/// notifier as-is.
#[derive(Error, Debug)]
pub enum RevertError {
    /// There is no commit that can be reverted (empty history, detached state...)
    #[error("Nothing to revert: {0}")]
    NothingToRevert(String),

    /// The underlying VCS command exited unsuccessfully
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The VCS command could not be spawned
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
