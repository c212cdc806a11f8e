//! Local Node Configuration
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./localnode.yaml` (current directory - highest priority)
//! 2. `~/.config/localnode/localnode.yaml` (user config directory)
//! 3. `/etc/localnode/localnode.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! # YAML Structure
//!
//! ```yaml
//! addressing:
//!   enable_ipv6: true
//!   direct_routing_device: eth0
//! nodeport:
//!   devices: [eth0, eth1]
//! encryption:
//!   mode: wireguard
//! ```

mod addressing;
mod datapath;
mod restore;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use addressing::{
    AddressingConfig, DEFAULT_IPV4_PREFIX_LEN, DEFAULT_IPV6_CLUSTER_ALLOC_CIDR_BASE,
};
pub use datapath::{EncryptionConfig, MasqueradeConfig, NodePortConfig};
pub use restore::{RestoreConfig, DEFAULT_HOST_DEVICE, DEFAULT_STATE_DIR};

/// Default config filename.
const CONFIG_FILENAME: &str = "localnode.yaml";

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
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Node addressing (`addressing.*`).
    #[serde(default)]
    pub addressing: AddressingConfig,

    /// NodePort devices (`nodeport.*`).
    #[serde(default)]
    pub nodeport: NodePortConfig,

    /// BPF masquerade devices (`masquerade.*`).
    #[serde(default)]
    pub masquerade: MasqueradeConfig,

    /// Host address restore (`restore.*`).
    #[serde(default)]
    pub restore: RestoreConfig,

    /// Traffic encryption (`encryption.*`).
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
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

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        paths.push(PathBuf::from("/etc/localnode").join(CONFIG_FILENAME));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("localnode").join(CONFIG_FILENAME));
        }

        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        self.addressing.merge(other.addressing);

        if !other.nodeport.devices.is_empty() {
            self.nodeport.devices = other.nodeport.devices;
        }
        if other.nodeport.inherit_ip_from_device.is_some() {
            self.nodeport.inherit_ip_from_device = other.nodeport.inherit_ip_from_device;
        }

        if !other.masquerade.devices.is_empty() {
            self.masquerade.devices = other.masquerade.devices;
        }
        if other.masquerade.derive_ip_from_device.is_some() {
            self.masquerade.derive_ip_from_device = other.masquerade.derive_ip_from_device;
        }

        self.restore.merge(other.restore);

        if other.encryption.mode.is_some() {
            self.encryption.mode = other.encryption.mode;
        }
    }

    /// Devices to build masquerade addresses for.
    ///
    /// Falls back to the NodePort devices when none are listed.
    pub fn masquerade_devices(&self) -> &[String] {
        if self.masquerade.devices.is_empty() {
            &self.nodeport.devices
        } else {
            &self.masquerade.devices
        }
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
