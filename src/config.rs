//! Configuration loading: `.aide/config/aide.json` plus environment
//! variables recognized at startup (spec §6).

use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Analyzer thresholds and share settings, all keys optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub findings: FindingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingsConfig {
    #[serde(default)]
    pub complexity: ComplexityConfig,
    #[serde(default)]
    pub coupling: CouplingConfig,
    #[serde(default)]
    pub clones: ClonesConfig,
}

impl Default for FindingsConfig {
    fn default() -> Self {
        Self {
            complexity: ComplexityConfig::default(),
            coupling: CouplingConfig::default(),
            clones: ClonesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComplexityConfig {
    #[serde(default = "default_complexity_threshold")]
    pub threshold: u32,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            threshold: default_complexity_threshold(),
        }
    }
}

const fn default_complexity_threshold() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CouplingConfig {
    pub fan_out: Option<u32>,
    pub fan_in: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClonesConfig {
    #[serde(default = "default_window_size")]
    pub window_size: u32,
    #[serde(default = "default_min_lines")]
    pub min_lines: u32,
}

impl Default for ClonesConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_lines: default_min_lines(),
        }
    }
}

const fn default_window_size() -> u32 {
    50
}

const fn default_min_lines() -> u32 {
    20
}

impl Config {
    /// Loads `<root>/.aide/config/aide.json`. A missing file yields
    /// `Config::default()`; a malformed one is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the file exists but cannot be
    /// parsed.
    pub fn load(root: &Path) -> crate::error::Result<Self> {
        let path = root.join(".aide").join("config").join("aide.json");
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| ServerError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

/// Environment variables recognized at startup (spec §6).
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// `AIDE_DEBUG=1` — enable debug logging to `.aide/_logs/`.
    pub debug: bool,
    /// `AIDE_FORCE_INIT=1` — allow initialization outside a VCS root.
    pub force_init: bool,
    /// `AIDE_CODE_WATCH=1` — start the watcher with the code indexer subscribed.
    pub code_watch: bool,
    /// `AIDE_CODE_WATCH_DELAY` — debounce duration, default 30s.
    pub code_watch_delay: Duration,
    /// `AIDE_CODE_STORE_DISABLE=1` — do not open the code store.
    pub code_store_disable: bool,
    /// `AIDE_CODE_STORE_SYNC=1` — initialize the code store synchronously at startup.
    pub code_store_sync: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            debug: false,
            force_init: false,
            code_watch: false,
            code_watch_delay: Duration::from_secs(30),
            code_store_disable: false,
            code_store_sync: false,
        }
    }
}

fn flag_set(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

impl EnvConfig {
    /// Reads the recognized environment variables from the process
    /// environment.
    #[must_use]
    pub fn from_env() -> Self {
        let code_watch_delay = std::env::var("AIDE_CODE_WATCH_DELAY")
            .ok()
            .and_then(|v| humantime::parse_duration(&v).ok())
            .unwrap_or(Duration::from_secs(30));

        Self {
            debug: flag_set("AIDE_DEBUG"),
            force_init: flag_set("AIDE_FORCE_INIT"),
            code_watch: flag_set("AIDE_CODE_WATCH"),
            code_watch_delay,
            code_store_disable: flag_set("AIDE_CODE_STORE_DISABLE"),
            code_store_sync: flag_set("AIDE_CODE_STORE_SYNC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.findings.complexity.threshold, 10);
        assert_eq!(config.findings.clones.window_size, 50);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(".aide").join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("aide.json"),
            r#"{"findings": {"complexity": {"threshold": 15}}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.findings.complexity.threshold, 15);
        assert_eq!(config.findings.clones.min_lines, 20);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(".aide").join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("aide.json"), "not json").unwrap();

        assert!(Config::load(dir.path()).is_err());
    }
}
