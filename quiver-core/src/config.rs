//! Runtime configuration.
//!
//! Every field has a default, so an empty document (`{}`) is a valid
//! configuration.
//!
//! ```json
//! { "debug_hooks": false, "sweep_interval": 256 }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Default number of new registry entries between automatic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: usize = 64;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Fire `on_track` / `on_trigger` hooks. Turn off in production builds
    /// to skip building debugger events.
    pub debug_hooks: bool,

    /// New observed objects between automatic registry sweeps. 0 disables
    /// automatic sweeping.
    pub sweep_interval: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug_hooks: true,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&source)?;
        debug!(path = %path.display(), ?config, "loaded runtime config");
        Ok(config)
    }
}
