//! Configuration for tspterm.
//!
//! Loaded from `~/.tspterm/config.toml`; every key is optional:
//!
//! ```toml
//! # Instrument to connect to on startup
//! address = "192.168.0.42"
//!
//! # Raw socket port (instrument default is 5025)
//! port = 5025
//!
//! # Log level for ~/.tspterm/tspterm.log: error, warn, info, debug, trace
//! log_level = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::Level;

use crate::device::DEVICE_PORT;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default instrument address
    pub address: Option<String>,
    /// Instrument port
    pub port: u16,
    /// Log level name
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: None,
            port: DEVICE_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    ///
    /// Runs before logging is set up (the log level lives in here), so
    /// problems are reported on stderr while the terminal is still cooked.
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| Self::parse(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    /// Log level, defaulting to INFO for unknown names
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// `~/.tspterm`, created on first use
pub fn data_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".tspterm");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
