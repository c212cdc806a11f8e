//! Addressing configuration (`addressing.*`).

use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::node::IpFamily;

/// Default prefix length of the auto-generated IPv4 allocation range.
pub const DEFAULT_IPV4_PREFIX_LEN: u8 = 16;

/// Default base of the cluster IPv6 allocation range.
pub const DEFAULT_IPV6_CLUSTER_ALLOC_CIDR_BASE: &str = "f00d::";

/// Default node name when none is configured or found in the environment.
const DEFAULT_NODE_NAME: &str = "localhost";

/// Node addressing (`addressing.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressingConfig {
    /// Node name (`addressing.node_name`). Defaults to `$HOSTNAME`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Enable IPv4 (`addressing.enable_ipv4`). Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ipv4: Option<bool>,

    /// Enable IPv6 (`addressing.enable_ipv6`). Defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ipv6: Option<bool>,

    /// Device the default allocation prefixes are derived from
    /// (`addressing.direct_routing_device`). All devices when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_routing_device: Option<String>,

    /// Explicit IPv4 allocation range (`addressing.ipv4_range`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_range: Option<Ipv4Net>,

    /// Explicit IPv6 allocation range (`addressing.ipv6_range`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_range: Option<Ipv6Net>,

    /// Explicit node IPv4 address (`addressing.ipv4_node`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_node: Option<Ipv4Addr>,

    /// Explicit node IPv6 address (`addressing.ipv6_node`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_node: Option<Ipv6Addr>,

    /// Router IPv4 address of the host interface (`addressing.router_ipv4`).
    /// Takes precedence over a restored address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_ipv4: Option<Ipv4Addr>,

    /// Router IPv6 address of the host interface (`addressing.router_ipv6`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_ipv6: Option<Ipv6Addr>,

    /// Node address reported by the orchestrator (`addressing.k8s_node_ip`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_node_ip: Option<IpAddr>,

    /// Prefix length of the auto-generated IPv4 range
    /// (`addressing.ipv4_prefix_len`). Defaults to 16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_prefix_len: Option<u8>,

    /// Base of the auto-generated IPv6 range
    /// (`addressing.ipv6_cluster_alloc_cidr_base`). Defaults to "f00d::".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_cluster_alloc_cidr_base: Option<String>,

    /// Overlay tunneling in use (`addressing.tunneling`). Defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunneling: Option<bool>,
}

impl AddressingConfig {
    /// Get the node name, falling back to `$HOSTNAME`.
    pub fn node_name(&self) -> String {
        self.node_name
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| DEFAULT_NODE_NAME.to_string())
    }

    pub fn enable_ipv4(&self) -> bool {
        self.enable_ipv4.unwrap_or(true)
    }

    pub fn enable_ipv6(&self) -> bool {
        self.enable_ipv6.unwrap_or(false)
    }

    /// Check whether `family` is enabled.
    pub fn is_enabled(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.enable_ipv4(),
            IpFamily::V6 => self.enable_ipv6(),
        }
    }

    /// Enabled families, IPv4 first.
    pub fn enabled_families(&self) -> Vec<IpFamily> {
        [IpFamily::V4, IpFamily::V6]
            .into_iter()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }

    pub fn direct_routing_device(&self) -> Option<&str> {
        self.direct_routing_device.as_deref()
    }

    pub fn ipv4_prefix_len(&self) -> u8 {
        self.ipv4_prefix_len.unwrap_or(DEFAULT_IPV4_PREFIX_LEN)
    }

    pub fn ipv6_cluster_alloc_cidr_base(&self) -> &str {
        self.ipv6_cluster_alloc_cidr_base
            .as_deref()
            .unwrap_or(DEFAULT_IPV6_CLUSTER_ALLOC_CIDR_BASE)
    }

    pub fn tunneling(&self) -> bool {
        self.tunneling.unwrap_or(false)
    }

    /// Merge another addressing section into this one.
    pub fn merge(&mut self, other: AddressingConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            node_name,
            enable_ipv4,
            enable_ipv6,
            direct_routing_device,
            ipv4_range,
            ipv6_range,
            ipv4_node,
            ipv6_node,
            router_ipv4,
            router_ipv6,
            k8s_node_ip,
            ipv4_prefix_len,
            ipv6_cluster_alloc_cidr_base,
            tunneling
        );
    }
}
