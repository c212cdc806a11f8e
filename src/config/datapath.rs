//! Datapath-facing configuration: NodePort and masquerade devices and the
//! encryption mode.

use serde::{Deserialize, Serialize};

use crate::encryption::EncryptionMode;

/// NodePort devices (`nodeport.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodePortConfig {
    /// Devices NodePort services are exposed on (`nodeport.devices`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,

    /// Device whose address is used for every NodePort device
    /// (`nodeport.inherit_ip_from_device`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit_ip_from_device: Option<String>,
}

impl NodePortConfig {
    pub fn inherit_ip_from_device(&self) -> Option<&str> {
        self.inherit_ip_from_device.as_deref()
    }
}

/// BPF masquerade devices (`masquerade.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasqueradeConfig {
    /// Devices traffic is masqueraded on (`masquerade.devices`).
    /// Defaults to the NodePort devices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,

    /// Device the masquerade address is taken from for every device
    /// (`masquerade.derive_ip_from_device`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derive_ip_from_device: Option<String>,
}

impl MasqueradeConfig {
    pub fn derive_ip_from_device(&self) -> Option<&str> {
        self.derive_ip_from_device.as_deref()
    }
}

/// Traffic encryption (`encryption.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptionConfig {
    /// Active encryption mode (`encryption.mode`). Defaults to `none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EncryptionMode>,
}

impl EncryptionConfig {
    pub fn mode(&self) -> EncryptionMode {
        self.mode.unwrap_or_default()
    }
}
