//! Error types.
//!
//! Tracking and triggering never fail; the only fallible surface is loading
//! configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}
