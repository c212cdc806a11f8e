//! The local node record.

use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{AddressKind, IpFamily, NodeAddress};

/// Address and identity record of the local node.
///
/// Values are never shared mutably: the [`NodeStore`](super::NodeStore)
/// hands out clones and installs whole replacements on update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNode {
    /// Node name (hostname by default).
    #[serde(default)]
    pub name: String,

    /// All addresses of the node, each tagged with its role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<NodeAddress>,

    /// Prefix for local workload IPv4 allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_alloc_cidr: Option<Ipv4Net>,

    /// Prefix for local workload IPv6 allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_alloc_cidr: Option<Ipv6Net>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_health_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_health_ip: Option<Ipv6Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_ingress_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_ingress_ip: Option<Ipv6Addr>,

    /// IPsec key generation in use on this node; 0 means unset.
    #[serde(default)]
    pub encryption_key: u8,

    /// WireGuard public key; set once WireGuard is up on this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wireguard_pub_key: Option<String>,

    /// Node-level opt-out of traffic encryption.
    #[serde(default)]
    pub opt_out_node_encryption: bool,

    /// Address reported for this node by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_node_ip: Option<IpAddr>,
}

impl LocalNode {
    /// Create an empty record with the given node name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First address of the given kind and family.
    pub fn address(&self, kind: AddressKind, family: IpFamily) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|a| a.kind == kind && a.family() == family)
            .map(|a| a.ip)
    }

    /// Replace the address of `kind` in the family of `ip`.
    ///
    /// Any existing address of the same kind and family is dropped.
    pub fn set_address(&mut self, kind: AddressKind, ip: IpAddr) {
        let family = IpFamily::of(&ip);
        self.addresses
            .retain(|a| !(a.kind == kind && a.family() == family));
        self.addresses.push(NodeAddress::new(kind, ip));
    }

    /// Drop the address of `kind` in `family`.
    pub fn clear_address(&mut self, kind: AddressKind, family: IpFamily) {
        self.addresses
            .retain(|a| !(a.kind == kind && a.family() == family));
    }

    /// Node address reachable on the network.
    ///
    /// Priority: internal IP, then external IP, then any other address that
    /// is not the router address.
    pub fn node_ip(&self, family: IpFamily) -> Option<IpAddr> {
        self.address(AddressKind::InternalIP, family)
            .or_else(|| self.address(AddressKind::ExternalIP, family))
            .or_else(|| self.address(AddressKind::Other, family))
    }

    pub fn internal_ip(&self, family: IpFamily) -> Option<IpAddr> {
        self.address(AddressKind::InternalIP, family)
    }

    pub fn set_internal_ip(&mut self, ip: IpAddr) {
        self.set_address(AddressKind::InternalIP, ip);
    }

    pub fn external_ip(&self, family: IpFamily) -> Option<IpAddr> {
        self.address(AddressKind::ExternalIP, family)
    }

    pub fn set_external_ip(&mut self, ip: IpAddr) {
        self.set_address(AddressKind::ExternalIP, ip);
    }

    /// Router address of the node's host interface.
    pub fn router_ip(&self, family: IpFamily) -> Option<IpAddr> {
        self.address(AddressKind::CiliumInternalIP, family)
    }

    pub fn set_router_ip(&mut self, ip: IpAddr) {
        self.set_address(AddressKind::CiliumInternalIP, ip);
    }

    /// Check whether this node advertises a WireGuard public key.
    pub fn has_wireguard_key(&self) -> bool {
        self.wireguard_pub_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }
}
