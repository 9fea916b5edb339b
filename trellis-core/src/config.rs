//! Runtime configuration.
//!
//! Configuration is plain data. It can be built in code or deserialized from
//! JSON, with every field optional:
//!
//! ```rust
//! use trellis_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "batched": false }"#).unwrap();
//! assert!(!config.batched);
//! assert!(config.diagnostics);
//! ```

use serde::{Deserialize, Serialize};

/// Default cap on how many times one watcher may run during a single flush.
pub const DEFAULT_MAX_UPDATE_COUNT: usize = 100;

/// Settings for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Defer watcher re-runs to the scheduler's flush.
    ///
    /// When false, subscribers are notified in ascending id order and the
    /// default scheduler flushes on every enqueue.
    pub batched: bool,

    /// Server rendering mode. No value is observed while this is set.
    pub server_rendering: bool,

    /// Emit developer-misuse warnings and run custom setter hooks.
    pub diagnostics: bool,

    /// Runs allowed for one watcher within one flush before the flush is
    /// aborted as an infinite update loop.
    pub max_update_count: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batched: true,
            server_rendering: false,
            diagnostics: true,
            max_update_count: DEFAULT_MAX_UPDATE_COUNT,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Configuration for synchronous, deterministic runs (tests, scripts).
    pub fn unbatched() -> Self {
        Self {
            batched: false,
            ..Self::default()
        }
    }
}
