//! Configuration types for LiveStyle
//!
//! Defines:
//! - `Settings` - Global application settings
//! - `TimingSettings` - Debounce windows and timeouts
//! - `PersistenceSettings` - Where and how often page configuration is saved

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global settings from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub timing: TimingSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,
}

/// Debounce windows and timeouts, in milliseconds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimingSettings {
    /// Quiet period after a browser edit before it is diffed
    #[serde(default = "default_diff_debounce_ms")]
    pub diff_debounce_ms: u64,

    /// Quiet period after queued patches before they are applied
    #[serde(default = "default_patch_debounce_ms")]
    pub patch_debounce_ms: u64,

    /// Diff engine call timeout
    #[serde(default = "default_timeout_ms")]
    pub engine_timeout_ms: u64,

    /// Resource host request timeout
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            diff_debounce_ms: default_diff_debounce_ms(),
            patch_debounce_ms: default_patch_debounce_ms(),
            engine_timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

impl TimingSettings {
    pub fn diff_debounce(&self) -> Duration {
        Duration::from_millis(self.diff_debounce_ms)
    }

    pub fn patch_debounce(&self) -> Duration {
        Duration::from_millis(self.patch_debounce_ms)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Page configuration persistence
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersistenceSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum spacing between writes
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// State file; defaults to `state.json` in the platform data dir
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            throttle_ms: default_throttle_ms(),
            path: None,
        }
    }
}

impl PersistenceSettings {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Configured path, else `<data dir>/livestyle/state.json`
    pub fn state_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            dirs::data_local_dir().map(|dir| dir.join("livestyle").join("state.json"))
        })
    }
}

fn default_diff_debounce_ms() -> u64 {
    150
}

fn default_patch_debounce_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_throttle_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}
