//! Encryption key index selection.
//!
//! Node traffic is tagged with a one-byte key index telling the datapath
//! which encryption, if any, applies to it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::LocalNode;

/// Key index used for all traffic when WireGuard is active.
pub const STATIC_ENCRYPT_KEY: u8 = 1;

/// Active transparent encryption mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionMode {
    #[default]
    #[serde(rename = "none")]
    Disabled,
    #[serde(rename = "ipsec")]
    IPsec,
    #[serde(rename = "wireguard")]
    WireGuard,
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EncryptionMode::Disabled => "none",
            EncryptionMode::IPsec => "ipsec",
            EncryptionMode::WireGuard => "wireguard",
        };
        write!(f, "{}", s)
    }
}

/// Encryption key index for traffic of the local node.
///
/// With IPsec this is the node's IPsec key identity. With WireGuard it is
/// [`STATIC_ENCRYPT_KEY`] once the node has published a public key.
/// Otherwise 0.
pub fn encrypt_key_index(mode: EncryptionMode, node: &LocalNode) -> u8 {
    match mode {
        EncryptionMode::IPsec => node.encryption_key,
        EncryptionMode::WireGuard if node.has_wireguard_key() => STATIC_ENCRYPT_KEY,
        _ => 0,
    }
}
