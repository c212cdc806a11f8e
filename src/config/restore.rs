//! Host address restore configuration (`restore.*`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default runtime state directory.
pub const DEFAULT_STATE_DIR: &str = "/var/run/cilium/state";

/// Default host-facing device of the node.
pub const DEFAULT_HOST_DEVICE: &str = "cilium_host";

/// Node config header inside the globals directory.
const NODE_CONFIG_FILE: &str = "node_config.h";

const GLOBALS_DIR: &str = "globals";

/// Restore of the router addresses assigned on a previous run (`restore.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreConfig {
    /// Enable host IP restore (`restore.enabled`). Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Runtime state directory (`restore.state_dir`).
    /// Defaults to "/var/run/cilium/state".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Host-facing device used when the header holds no addresses
    /// (`restore.host_device`). Defaults to "cilium_host".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_device: Option<String>,
}

impl RestoreConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_STATE_DIR))
    }

    /// Path of the generated node config header.
    pub fn node_config_path(&self) -> PathBuf {
        self.state_dir().join(GLOBALS_DIR).join(NODE_CONFIG_FILE)
    }

    pub fn host_device(&self) -> &str {
        self.host_device.as_deref().unwrap_or(DEFAULT_HOST_DEVICE)
    }

    /// Merge another restore section into this one.
    pub fn merge(&mut self, other: RestoreConfig) {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.state_dir.is_some() {
            self.state_dir = other.state_dir;
        }
        if other.host_device.is_some() {
            self.host_device = other.host_device;
        }
    }
}
