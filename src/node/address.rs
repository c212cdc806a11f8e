//! Typed node addresses and IP families.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// IP address family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Family of the given address.
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    /// Check whether `ip` belongs to this family.
    pub fn matches(&self, ip: &IpAddr) -> bool {
        IpFamily::of(ip) == *self
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, IpFamily::V6)
    }

    /// Human-readable family name for messages ("IPv4" or "IPv6").
    pub fn label(&self) -> &'static str {
        match self {
            IpFamily::V4 => "IPv4",
            IpFamily::V6 => "IPv6",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => write!(f, "ipv4"),
            IpFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// Role of an address attached to the local node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    /// Address reachable inside the cluster network, as reported by the orchestrator.
    InternalIP,
    /// Publicly routable address, as reported by the orchestrator.
    ExternalIP,
    /// Router address of the node's overlay/host interface.
    CiliumInternalIP,
    /// Any other address type (hostname resolution, etc).
    Other,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddressKind::InternalIP => "InternalIP",
            AddressKind::ExternalIP => "ExternalIP",
            AddressKind::CiliumInternalIP => "CiliumInternalIP",
            AddressKind::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

/// A single address of the local node together with its role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub kind: AddressKind,
    pub ip: IpAddr,
}

impl NodeAddress {
    pub fn new(kind: AddressKind, ip: IpAddr) -> Self {
        Self { kind, ip }
    }

    pub fn family(&self) -> IpFamily {
        IpFamily::of(&self.ip)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ip, self.kind)
    }
}
