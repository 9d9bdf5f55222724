//! Weft configuration system.
//!
//! Loads configuration from YAML files with a cascading search order:
//! 1. `./weft.yaml` (current directory - highest priority)
//! 2. `~/.config/weft/weft.yaml` (user config directory)
//! 3. `/etc/weft/weft.yaml` (system - lowest priority)
//!
//! The first file found wins; absent files fall through and a fully
//! absent cascade yields the built-in defaults.
//!
//! # YAML Structure
//!
//! The YAML structure mirrors the dotted parameter paths used in the doc
//! comments. For example, `router.resolver.query_timeout_ms` corresponds
//! to:
//!
//! ```yaml
//! router:
//!   resolver:
//!     query_timeout_ms: 2000
//! ```

mod fabric;
mod router;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use fabric::{FabricConfig, NeighborConfig, UdpFabricConfig};
pub use router::{
    BuffersConfig, ChildConfig, PendingConfig, ResolverConfig, RouterConfig, TopologyConfig,
};

/// Default config filename.
const CONFIG_FILENAME: &str = "weft.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Router configuration (`router.*`).
    #[serde(default)]
    pub router: RouterConfig,

    /// On-mesh prefixes bounding plausible endpoint identifiers
    /// (`prefixes`).
    #[serde(default = "Config::default_prefixes")]
    pub prefixes: Vec<String>,

    /// Fabric configuration (`fabric.*`).
    #[serde(default)]
    pub fabric: FabricConfig,

    /// Static child registrations (`children`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            prefixes: Self::default_prefixes(),
            fabric: FabricConfig::default(),
            children: Vec::new(),
        }
    }
}

impl Config {
    fn default_prefixes() -> Vec<String> {
        vec!["2003::/64".to_string()]
    }

    /// Create a configuration with built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns the parsed config and the path it came from, or the
    /// defaults and `None` when no file exists. A file that exists but
    /// fails to read or parse is an error, never silently skipped.
    pub fn load() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                let config = Self::load_file(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Standard search paths in priority order (highest first).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("weft").join(CONFIG_FILENAME));
        }

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/weft").join(CONFIG_FILENAME));

        paths
    }
}
