//! Core error types for adaptload-core.
//!
//! Missing host signals are never errors here: they are modelled as
//! [`HostSignal::Unavailable`](crate::signal::HostSignal) and resolved by a
//! fail-open default. The types below cover caller mistakes and I/O.

use std::path::PathBuf;
use thiserror::Error;

use crate::progress::LoadingProgress;
use crate::resource::ResourceId;

/// Core error type for adaptload-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A handler was invoked for a resource the engine does not track
    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),

    /// A load callback arrived out of order
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected [`LoadingProgress`] transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: LoadingProgress,
    pub to: LoadingProgress,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home directory could not be resolved
    #[error("Could not determine configuration directory")]
    NoConfigDir,
}

/// A prefetch hint could not be delivered.
///
/// Only ever logged; hints are fire-and-forget.
#[derive(Error, Debug)]
pub enum HintError {
    #[error("no async runtime available to send hint for {0}")]
    NoRuntime(String),

    #[error("invalid hint url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("hint request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The host viewport observer refused an observation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("viewport observer failed: {0}")]
pub struct ObserverError(pub String);

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
