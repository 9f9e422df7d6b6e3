//! Configuration loading
//!
//! All values have compiled defaults; an optional TOML file overrides
//! them. Resolution order: `TEMPO_CONFIG` environment variable, then the
//! platform config directory (`<config dir>/tempo/config.toml`), then
//! defaults. A missing or unreadable file is not an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Timer intervals used by the discovery engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineTiming {
    /// Periodic fallback scan interval in milliseconds.
    pub rescan_interval_ms: u64,
    /// Delay before the deferred full scan that follows a subtree
    /// insertion containing media.
    pub deferred_scan_delay_ms: u64,
    /// Debounce applied to self-heal reapplication after a rate drift.
    pub heal_debounce_ms: u64,
    /// Delay before creating the on-page overlay (lets the page settle).
    pub overlay_settle_delay_ms: u64,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            rescan_interval_ms: 1500,
            deferred_scan_delay_ms: 100,
            heal_debounce_ms: 10,
            overlay_settle_delay_ms: 500,
        }
    }
}

/// Retry policy for the control panel's state fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelTiming {
    /// Additional attempts after the first failed `GET_STATE`.
    pub max_retries: u32,
    /// Fixed backoff between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for PanelTiming {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 500,
        }
    }
}

/// Full tempo configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineTiming,
    pub panel: PanelTiming,
    /// Preference database path; `None` selects an in-memory store.
    pub prefs_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the resolved config file, falling back to
    /// defaults when no file exists or the file does not parse.
    pub fn load() -> Config {
        match resolve_config_file() {
            Some(path) => Config::load_from(&path),
            None => Config::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults.
    pub fn load_from(path: &Path) -> Config {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Config::default(),
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring malformed config file {}: {}", path.display(), e);
                Config::default()
            }
        }
    }
}

/// Config file resolution: env var first, then the platform config dir.
fn resolve_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TEMPO_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("tempo").join("config.toml"))
}
