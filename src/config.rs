//! Configuration.
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./lcbus.yaml` (current directory - highest priority)
//! 2. `~/.config/lcbus/lcbus.yaml` (user config directory)
//! 3. `/etc/lcbus/lcbus.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority
//! files.
//!
//! # YAML Structure
//!
//! ```yaml
//! node:
//!   id: "05.01.01.01.03.01"
//!   snip:
//!     manufacturer: "lcbus"
//!     user_name: "Yard throat"
//! hub:
//!   addr: "192.168.1.20:12021"
//! ```

use crate::identity::{IdentityError, NodeID};
use crate::node::Snip;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config filename.
const CONFIG_FILENAME: &str = "lcbus.yaml";

/// Default GridConnect hub address (JMRI's conventional port).
const DEFAULT_HUB_ADDR: &str = "127.0.0.1:12021";

/// Default delay before reconnecting to a lost hub, in seconds.
const DEFAULT_RECONNECT_SECS: u64 = 5;

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

    #[error("no node id configured (set node.id)")]
    MissingNodeId,

    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] IdentityError),
}

/// Self-description strings (`node.snip.*`), served to SNIP requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnipConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_description: Option<String>,
}

impl SnipConfig {
    fn merge(&mut self, other: SnipConfig) {
        if other.manufacturer.is_some() {
            self.manufacturer = other.manufacturer;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.hardware_version.is_some() {
            self.hardware_version = other.hardware_version;
        }
        if other.software_version.is_some() {
            self.software_version = other.software_version;
        }
        if other.user_name.is_some() {
            self.user_name = other.user_name;
        }
        if other.user_description.is_some() {
            self.user_description = other.user_description;
        }
    }
}

/// Node configuration (`node.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// The node's id in dotted-hex form (`node.id`). Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Self-description (`node.snip.*`).
    #[serde(default)]
    pub snip: SnipConfig,
}

/// GridConnect hub connection (`hub.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    /// Hub address as host:port (`hub.addr`). Defaults to
    /// "127.0.0.1:12021".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,

    /// Seconds to wait before reconnecting after a drop
    /// (`hub.reconnect_secs`). Defaults to 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_secs: Option<u64>,
}

impl HubConfig {
    /// Get the hub address, using the default if not configured.
    pub fn addr(&self) -> &str {
        self.addr.as_deref().unwrap_or(DEFAULT_HUB_ADDR)
    }

    /// Get the reconnect delay, using the default if not configured.
    pub fn reconnect_secs(&self) -> u64 {
        self.reconnect_secs.unwrap_or(DEFAULT_RECONNECT_SECS)
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node configuration (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,

    /// Hub connection (`hub.*`).
    #[serde(default)]
    pub hub: HubConfig,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Files are loaded in reverse priority order and merged; returns the
    /// merged config plus the paths that were actually loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        Self::load_from_paths(&Self::search_paths())
    }

    /// Load configuration from specific paths, later paths overriding
    /// earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
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

    /// Get the standard search paths in priority order (lowest to
    /// highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/lcbus").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("lcbus").join(CONFIG_FILENAME));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one. Values from `other`
    /// override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        if other.node.id.is_some() {
            self.node.id = other.node.id;
        }
        self.node.snip.merge(other.node.snip);
        if other.hub.addr.is_some() {
            self.hub.addr = other.hub.addr;
        }
        if other.hub.reconnect_secs.is_some() {
            self.hub.reconnect_secs = other.hub.reconnect_secs;
        }
    }

    /// The configured node id.
    pub fn node_id(&self) -> Result<NodeID, ConfigError> {
        let id = self.node.id.as_deref().ok_or(ConfigError::MissingNodeId)?;
        Ok(id.parse()?)
    }

    /// Build the SNIP record served for this node.
    pub fn snip(&self) -> Snip {
        let snip = &self.node.snip;
        Snip {
            manufacturer: snip.manufacturer.clone().unwrap_or_default(),
            model: snip.model.clone().unwrap_or_default(),
            hardware_version: snip.hardware_version.clone().unwrap_or_default(),
            software_version: snip
                .software_version
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            user_name: snip.user_name.clone().unwrap_or_default(),
            user_description: snip.user_description.clone().unwrap_or_default(),
            ..Snip::default()
        }
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
