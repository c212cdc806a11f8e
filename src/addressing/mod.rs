//! Node Addressing
//!
//! [`Addressing`] ties the local node store, the derived address cache and a
//! device source together under one configuration. It owns the bootstrap
//! sequence (restore, default completion, address map initialization and
//! validation) and the accessor API other components use to read and adjust
//! the node's addressing.


use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{AddressCache, CacheError, RouterInfo};
use crate::config::{AddressingConfig, Config};
use crate::device::DeviceSource;
use crate::encryption::{encrypt_key_index, EncryptionMode};
use crate::node::{IpFamily, LocalNode, NodeStore, StoreError};
use crate::resolver::{set_default_prefix, ResolveError};
use crate::restore::{restore_host_ips, HostIps};

/// Errors surfaced by [`Addressing`] operations.
#[derive(Debug, Error)]
pub enum AddressingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidDefaultPrefix(#[from] ResolveError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{} allocation CIDR is not configured. Please specify --{}", .family.label(), .flag)]
    MissingAllocRange {
        family: IpFamily,
        flag: &'static str,
    },

    #[error("external IPv4 node address could not be derived, please configure via --ipv4-node")]
    MissingNodeIpv4,

    #[error("BUG: Internal IPv4 node address was not configured")]
    MissingRouterIpv4,
}

/// Addressing of one family as reported to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddressingElement {
    pub enabled: bool,
    /// Router address.
    pub ip: Option<IpAddr>,
    pub alloc_range: Option<IpNet>,
}

/// Summary of the node's addressing; families that are disabled are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddressing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<NodeAddressingElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<NodeAddressingElement>,
}

/// Build the initial local node record from the addressing configuration.
pub fn initial_node(config: &AddressingConfig) -> LocalNode {
    let mut node = LocalNode::new(config.node_name());
    if let Some(ip) = config.ipv4_node {
        node.set_internal_ip(IpAddr::V4(ip));
    }
    if let Some(ip) = config.ipv6_node {
        node.set_internal_ip(IpAddr::V6(ip));
    }
    if let Some(ip) = config.router_ipv4 {
        node.set_router_ip(IpAddr::V4(ip));
    }
    if let Some(ip) = config.router_ipv6 {
        node.set_router_ip(IpAddr::V6(ip));
    }
    node.ipv4_alloc_cidr = config.ipv4_range;
    node.ipv6_alloc_cidr = config.ipv6_range;
    node.k8s_node_ip = config.k8s_node_ip;
    node
}

fn to_v4(ip: Option<IpAddr>) -> Option<Ipv4Addr> {
    match ip {
        Some(IpAddr::V4(ip)) => Some(ip),
        _ => None,
    }
}

fn to_v6(ip: Option<IpAddr>) -> Option<Ipv6Addr> {
    match ip {
        Some(IpAddr::V6(ip)) => Some(ip),
        _ => None,
    }
}

/// Local node addressing bound to a configuration and a device source.
#[derive(Debug)]
pub struct Addressing<S> {
    config: Config,
    store: Arc<NodeStore>,
    cache: Arc<AddressCache>,
    source: S,
}

impl<S: DeviceSource> Addressing<S> {
    /// Bind existing store and cache instances.
    pub fn new(config: Config, store: Arc<NodeStore>, cache: Arc<AddressCache>, source: S) -> Self {
        Self {
            config,
            store,
            cache,
            source,
        }
    }

    /// Create fresh store and cache instances seeded from `config`.
    pub fn from_config(config: Config, source: S) -> Self {
        let store = Arc::new(NodeStore::new(initial_node(&config.addressing)));
        Self::new(config, store, Arc::new(AddressCache::new()), source)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<AddressCache> {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn read<T>(&self, f: impl FnOnce(&LocalNode) -> T) -> Result<T, StoreError> {
        self.store.snapshot().map(|node| f(&node))
    }

    // === Bootstrap ===

    /// Derive unset node addresses and allocation ranges from the direct
    /// routing device (every device when none is configured).
    ///
    /// A device that cannot be listed counts as having no addresses. On a
    /// template error the record is left unchanged.
    pub async fn init_default_prefix(&self) -> Result<(), AddressingError> {
        let device = self.config.addressing.direct_routing_device();
        let addrs = match self.source.addresses(device).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(device = device.unwrap_or("any"), error = %e, "Cannot list device addresses");
                Vec::new()
            }
        };

        let mut result = Ok(());
        self.store.update(|node| {
            let mut next = node.clone();
            match set_default_prefix(&self.config.addressing, &addrs, &mut next) {
                Ok(()) => *node = next,
                Err(e) => result = Err(e),
            }
        })?;
        Ok(result?)
    }

    /// Complete defaults and check that every enabled family has an
    /// allocation range.
    pub async fn auto_complete(&self) -> Result<(), AddressingError> {
        self.init_default_prefix().await?;

        let node = self.store.snapshot()?;
        if self.config.addressing.enable_ipv6() && node.ipv6_alloc_cidr.is_none() {
            return Err(AddressingError::MissingAllocRange {
                family: IpFamily::V6,
                flag: "ipv6-range",
            });
        }
        if self.config.addressing.enable_ipv4() && node.ipv4_alloc_cidr.is_none() {
            return Err(AddressingError::MissingAllocRange {
                family: IpFamily::V4,
                flag: "ipv4-range",
            });
        }
        Ok(())
    }

    /// Check the addressing once initialization has finished.
    pub fn validate_post_init(&self) -> Result<(), AddressingError> {
        let cfg = &self.config.addressing;
        let node = self.store.snapshot()?;

        if (cfg.enable_ipv4() || cfg.tunneling()) && node.node_ip(IpFamily::V4).is_none() {
            return Err(AddressingError::MissingNodeIpv4);
        }
        if cfg.enable_ipv4() && node.router_ip(IpFamily::V4).is_none() {
            return Err(AddressingError::MissingRouterIpv4);
        }
        Ok(())
    }

    /// Recover router addresses of a previous run into the store.
    ///
    /// A recovered address only fills a router address that is still unset
    /// and whose family is enabled.
    pub async fn restore_host_ips(&self) -> Result<HostIps, AddressingError> {
        let ips = restore_host_ips(&self.config.restore, &self.source).await;
        let cfg = &self.config.addressing;

        self.store.update(|node| {
            let restored = [
                ips.ipv4_gateway.map(IpAddr::V4),
                ips.ipv6_router.map(IpAddr::V6),
            ];
            for ip in restored.into_iter().flatten() {
                let family = IpFamily::of(&ip);
                if cfg.is_enabled(family) && node.router_ip(family).is_none() {
                    info!(%family, %ip, "Using restored router address");
                    node.set_router_ip(ip);
                }
            }
        })?;
        Ok(ips)
    }

    /// Rebuild the NodePort address maps from `nodeport.devices`.
    ///
    /// The orchestrator-reported node IP is the preferred address.
    pub async fn init_nodeport_addrs(&self) -> Result<(), AddressingError> {
        let hint = self.read(|n| n.k8s_node_ip)?;
        self.cache
            .init_nodeport_addrs(
                &self.source,
                &self.config.addressing.enabled_families(),
                &self.config.nodeport.devices,
                self.config.nodeport.inherit_ip_from_device(),
                hint,
            )
            .await?;
        Ok(())
    }

    /// Rebuild the BPF masquerade address maps.
    pub async fn init_masquerade_addrs(&self) -> Result<(), AddressingError> {
        self.cache
            .init_masquerade_addrs(
                &self.source,
                &self.config.addressing.enabled_families(),
                self.config.masquerade_devices(),
                self.config.masquerade.derive_ip_from_device(),
            )
            .await?;
        Ok(())
    }

    /// Addressing summary for API consumers.
    pub fn node_addressing(&self) -> Result<NodeAddressing, StoreError> {
        let cfg = &self.config.addressing;
        self.read(|node| NodeAddressing {
            ipv4: cfg.enable_ipv4().then(|| NodeAddressingElement {
                enabled: true,
                ip: node.router_ip(IpFamily::V4),
                alloc_range: node.ipv4_alloc_cidr.map(IpNet::V4),
            }),
            ipv6: cfg.enable_ipv6().then(|| NodeAddressingElement {
                enabled: true,
                ip: node.router_ip(IpFamily::V6),
                alloc_range: node.ipv6_alloc_cidr.map(IpNet::V6),
            }),
        })
    }

    // === Node addresses ===

    /// Node IPv4 address (internal, then external, then other).
    pub fn ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.read(|n| to_v4(n.node_ip(IpFamily::V4)))
    }

    /// Node IPv6 address (internal, then external, then other).
    pub fn ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.read(|n| to_v6(n.node_ip(IpFamily::V6)))
    }

    pub fn internal_ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.read(|n| to_v4(n.internal_ip(IpFamily::V4)))
    }

    pub fn internal_ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.read(|n| to_v6(n.internal_ip(IpFamily::V6)))
    }

    pub fn external_ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.read(|n| to_v4(n.external_ip(IpFamily::V4)))
    }

    pub fn external_ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.read(|n| to_v6(n.external_ip(IpFamily::V6)))
    }

    pub fn set_internal_ip(&self, ip: IpAddr) -> Result<(), StoreError> {
        self.store.update(|n| n.set_internal_ip(ip))
    }

    pub fn set_external_ip(&self, ip: IpAddr) -> Result<(), StoreError> {
        self.store.update(|n| n.set_external_ip(ip))
    }

    /// Node IP referenced by endpoints on this node: IPv4 when enabled,
    /// IPv6 otherwise.
    pub fn endpoint_node_ip(&self) -> Result<Option<IpAddr>, StoreError> {
        let family = if self.config.addressing.enable_ipv4() {
            IpFamily::V4
        } else {
            IpFamily::V6
        };
        self.read(|n| n.node_ip(family))
    }

    pub fn k8s_node_ip(&self) -> Result<Option<IpAddr>, StoreError> {
        self.read(|n| n.k8s_node_ip)
    }

    // === Router addresses ===

    pub fn router_ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.read(|n| to_v4(n.router_ip(IpFamily::V4)))
    }

    pub fn router_ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.read(|n| to_v6(n.router_ip(IpFamily::V6)))
    }

    pub fn set_router_ipv4(&self, ip: Ipv4Addr) -> Result<(), StoreError> {
        self.store.update(|n| n.set_router_ip(IpAddr::V4(ip)))
    }

    pub fn set_router_ipv6(&self, ip: Ipv6Addr) -> Result<(), StoreError> {
        self.store.update(|n| n.set_router_ip(IpAddr::V6(ip)))
    }

    /// Source address for host traffic masqueraded into the cluster.
    pub fn host_masquerade_ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.router_ipv4()
    }

    pub fn host_masquerade_ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.router_ipv6()
    }

    // === Allocation ranges ===

    pub fn ipv4_alloc_range(&self) -> Result<Option<Ipv4Net>, StoreError> {
        self.read(|n| n.ipv4_alloc_cidr)
    }

    pub fn ipv6_alloc_range(&self) -> Result<Option<Ipv6Net>, StoreError> {
        self.read(|n| n.ipv6_alloc_cidr)
    }

    pub fn set_ipv4_alloc_range(&self, range: Ipv4Net) -> Result<(), StoreError> {
        self.store.update(|n| n.ipv4_alloc_cidr = Some(range))
    }

    pub fn set_ipv6_alloc_range(&self, range: Ipv6Net) -> Result<(), StoreError> {
        self.store.update(|n| n.ipv6_alloc_cidr = Some(range))
    }

    // === Health and ingress ===

    pub fn health_ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.read(|n| n.ipv4_health_ip)
    }

    pub fn health_ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.read(|n| n.ipv6_health_ip)
    }

    pub fn set_health_ipv4(&self, ip: Ipv4Addr) -> Result<(), StoreError> {
        self.store.update(|n| n.ipv4_health_ip = Some(ip))
    }

    pub fn set_health_ipv6(&self, ip: Ipv6Addr) -> Result<(), StoreError> {
        self.store.update(|n| n.ipv6_health_ip = Some(ip))
    }

    pub fn ingress_ipv4(&self) -> Result<Option<Ipv4Addr>, StoreError> {
        self.read(|n| n.ipv4_ingress_ip)
    }

    pub fn ingress_ipv6(&self) -> Result<Option<Ipv6Addr>, StoreError> {
        self.read(|n| n.ipv6_ingress_ip)
    }

    pub fn set_ingress_ipv4(&self, ip: Ipv4Addr) -> Result<(), StoreError> {
        self.store.update(|n| n.ipv4_ingress_ip = Some(ip))
    }

    pub fn set_ingress_ipv6(&self, ip: Ipv6Addr) -> Result<(), StoreError> {
        self.store.update(|n| n.ipv6_ingress_ip = Some(ip))
    }

    // === Encryption ===

    pub fn wireguard_pub_key(&self) -> Result<Option<String>, StoreError> {
        self.read(|n| n.wireguard_pub_key.clone())
    }

    pub fn set_wireguard_pub_key(&self, key: impl Into<String>) -> Result<(), StoreError> {
        let key = key.into();
        self.store.update(|n| n.wireguard_pub_key = Some(key))
    }

    pub fn opt_out_node_encryption(&self) -> Result<bool, StoreError> {
        self.read(|n| n.opt_out_node_encryption)
    }

    pub fn set_opt_out_node_encryption(&self, opt_out: bool) -> Result<(), StoreError> {
        self.store.update(|n| n.opt_out_node_encryption = opt_out)
    }

    /// Opaque identity of the IPsec keys used on this node.
    pub fn ipsec_key_identity(&self) -> Result<u8, StoreError> {
        self.read(|n| n.encryption_key)
    }

    pub fn set_ipsec_key_identity(&self, id: u8) -> Result<(), StoreError> {
        self.store.update(|n| n.encryption_key = id)
    }

    pub fn encryption_mode(&self) -> EncryptionMode {
        self.config.encryption.mode()
    }

    /// Key index tagging this node's encrypted traffic.
    pub fn encrypt_key_index(&self) -> Result<u8, StoreError> {
        let mode = self.encryption_mode();
        self.read(|n| encrypt_key_index(mode, n))
    }

    // === Derived address cache ===

    pub fn loopback_ipv4(&self) -> Option<Ipv4Addr> {
        self.cache.loopback()
    }

    pub fn set_loopback_ipv4(&self, ip: Option<Ipv4Addr>) {
        self.cache.set_loopback(ip)
    }

    pub fn router_info(&self) -> Option<Arc<dyn RouterInfo>> {
        self.cache.router_info()
    }

    pub fn set_router_info(&self, info: Option<Arc<dyn RouterInfo>>) {
        self.cache.set_router_info(info)
    }

    pub fn nodeport_ipv4_addrs(&self) -> Vec<IpAddr> {
        self.cache.nodeport_addrs(IpFamily::V4)
    }

    pub fn nodeport_ipv6_addrs(&self) -> Vec<IpAddr> {
        self.cache.nodeport_addrs(IpFamily::V6)
    }

    pub fn nodeport_ipv4_addrs_with_devices(&self) -> HashMap<String, IpAddr> {
        self.cache.nodeport_addrs_with_devices(IpFamily::V4)
    }

    pub fn nodeport_ipv6_addrs_with_devices(&self) -> HashMap<String, IpAddr> {
        self.cache.nodeport_addrs_with_devices(IpFamily::V6)
    }

    pub fn masquerade_ipv4_addrs_with_devices(&self) -> HashMap<String, IpAddr> {
        self.cache.masquerade_addrs_with_devices(IpFamily::V4)
    }

    pub fn masquerade_ipv6_addrs_with_devices(&self) -> HashMap<String, IpAddr> {
        self.cache.masquerade_addrs_with_devices(IpFamily::V6)
    }
}
