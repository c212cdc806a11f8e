//! localnode: local node addressing for a container-networking control plane
//!
//! Tracks the addresses and allocation ranges that represent this node,
//! derives defaults from the host's devices, keeps per-device NodePort and
//! masquerade addresses, and restores router addresses across restarts.

pub mod addressing;
pub mod cache;
pub mod config;
pub mod device;
pub mod encryption;
pub mod node;
pub mod resolver;
pub mod restore;

// Re-export addressing types
pub use addressing::{
    initial_node, Addressing, AddressingError, NodeAddressing, NodeAddressingElement,
};

// Re-export config types
pub use config::{
    AddressingConfig, Config, ConfigError, EncryptionConfig, MasqueradeConfig, NodePortConfig,
    RestoreConfig,
};

// Re-export node types
pub use node::{AddressKind, IpFamily, LocalNode, NodeAddress, NodeStore, NodeWatch, StoreError};

// Re-export cache types
pub use cache::{AddrPurpose, AddressCache, CacheError, RouterInfo, StaticRouterInfo};

// Re-export device types
pub use device::{
    AddrScope, DeviceAddr, DeviceError, DeviceSource, NetlinkDevices, StaticDevices,
};

// Re-export resolver, restore and encryption types
pub use encryption::{encrypt_key_index, EncryptionMode, STATIC_ENCRYPT_KEY};
pub use resolver::{set_default_prefix, ResolveError};
pub use restore::{restore_host_ips, HostIps, RestoreError};
