// src/config.rs

//! Defines the configuration structures for `clipbridge`.
//!
//! Settings are deserialized from a JSON file whose path is taken from the
//! `CLIPBRIDGE_CONFIG` environment variable. Every field has a default, so a
//! missing file or a partial one is fine.
//!
//! The library itself never reads `CONFIG`; `ClipboardService::new` is handed a
//! `SelectionConfig` explicitly so independent instances can coexist in tests.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Environment variable naming the JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "CLIPBRIDGE_CONFIG";

/// Process-wide configuration, loaded on first use.
pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

// --- Top-Level Configuration Structure ---

/// Represents the complete configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Selection protocol behaviour.
    pub selection: SelectionConfig,
    /// Logging defaults for the command-line front end.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads the configuration from `$CLIPBRIDGE_CONFIG`, or returns defaults.
    ///
    /// A file that cannot be read or parsed is reported and ignored.
    pub fn load() -> Self {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_path(Path::new(&path)).unwrap_or_else(|e| {
                warn!("Ignoring configuration file: {:#}", e);
                Self::default()
            }),
            None => {
                debug!("{} not set, using default configuration.", CONFIG_ENV_VAR);
                Self::default()
            }
        }
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parses a JSON document into a configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse configuration JSON")
    }
}

// --- Selection Configuration ---

/// Settings for host selection ownership and conversions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Claim PRIMARY alongside CLIPBOARD when data is supplied, and fall back
    /// to PRIMARY when reading if nobody owns CLIPBOARD.
    pub use_primary: bool,
    /// Upper bound on one inbound conversion round trip, in milliseconds.
    pub conversion_timeout_ms: u64,
    /// Sleep between polls of the host event queue while waiting, in microseconds.
    pub poll_interval_us: u64,
    /// Number of 32-bit items read from TARGETS and MULTIPLE property lists.
    pub max_property_longs: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            use_primary: true,
            conversion_timeout_ms: 500,
            poll_interval_us: 1000,
            max_property_longs: 0x3FFF,
        }
    }
}

impl SelectionConfig {
    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_millis(self.conversion_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin; one microsecond is the floor.
        Duration::from_micros(self.poll_interval_us.max(1))
    }
}

// --- Logging Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}
