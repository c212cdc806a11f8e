//! Address Resolution
//!
//! Completes the local node's addressing from the host's devices: the node
//! addresses when none were configured, and the IPv4/IPv6 allocation ranges
//! when only one or neither family was given.

mod prefix;

use std::net::{IpAddr, Ipv6Addr};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AddressingConfig;
use crate::device::{first_global_addr, DeviceAddr};
use crate::node::{IpFamily, LocalNode};

pub use prefix::{
    default_ipv4_alloc_cidr, ipv4_seed_from_ipv6, ipv6_alloc_cidr_from_ipv4,
    DERIVED_IPV6_PREFIX_LEN,
};

/// Prefer publicly routable addresses when picking the node address.
pub const PREFER_PUBLIC_IP: bool = true;

/// Router address used when no global IPv6 address exists on the device.
pub const IPV6_HOST_PLACEHOLDER: Ipv6Addr = Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0x10ca, 1);

/// Errors raised while deriving default addressing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A built-in default prefix template produced an unparseable CIDR.
    #[error("BUG: invalid default {family} prefix {prefix}: {reason}")]
    InvalidDefaultPrefix {
        family: IpFamily,
        prefix: String,
        reason: String,
    },
}

/// Fill in the node addresses and allocation ranges that are still unset.
///
/// `device_addrs` are the addresses of the device the defaults are derived
/// from. Values already present on `node` are never overwritten.
///
/// IPv4: the first global address (preferring the node's router IPv4 and
/// public addresses) becomes the internal IPv4 if none is set; if no IPv4
/// range exists one is generated from the IPv6 range's embedded IPv4, or else
/// from that address. Without any global IPv4 address IPv4 is left alone.
///
/// IPv6: the first global IPv6 address, or [`IPV6_HOST_PLACEHOLDER`], becomes
/// the internal IPv6 if none is set; if no IPv6 range exists but an IPv4 range
/// does, the IPv6 range is derived from it.
pub fn set_default_prefix(
    config: &AddressingConfig,
    device_addrs: &[DeviceAddr],
    node: &mut LocalNode,
) -> Result<(), ResolveError> {
    if config.enable_ipv4() {
        set_default_ipv4(config, device_addrs, node)?;
    }

    if config.enable_ipv6() {
        set_default_ipv6(config, device_addrs, node)?;
    }

    Ok(())
}

fn set_default_ipv4(
    config: &AddressingConfig,
    device_addrs: &[DeviceAddr],
    node: &mut LocalNode,
) -> Result<(), ResolveError> {
    let hint = node.router_ip(IpFamily::V4);
    let ip = match first_global_addr(device_addrs, IpFamily::V4, hint, PREFER_PUBLIC_IP) {
        Some(IpAddr::V4(ip)) => ip,
        _ => {
            debug!("No global IPv4 address found, keeping IPv4 addressing as is");
            return Ok(());
        }
    };

    if node.node_ip(IpFamily::V4).is_none() {
        node.set_internal_ip(IpAddr::V4(ip));
    }

    if node.ipv4_alloc_cidr.is_none() {
        let seed = match &node.ipv6_alloc_cidr {
            Some(ipv6) => ipv4_seed_from_ipv6(ipv6),
            None => ip,
        };
        let range = default_ipv4_alloc_cidr(seed, config.ipv4_prefix_len())?;
        info!(v4_prefix = %range, "Using autogenerated IPv4 allocation range");
        node.ipv4_alloc_cidr = Some(range);
    }

    Ok(())
}

fn set_default_ipv6(
    config: &AddressingConfig,
    device_addrs: &[DeviceAddr],
    node: &mut LocalNode,
) -> Result<(), ResolveError> {
    if node.node_ip(IpFamily::V6).is_none() {
        let hint = node.router_ip(IpFamily::V6);
        let ip = first_global_addr(device_addrs, IpFamily::V6, hint, PREFER_PUBLIC_IP)
            .unwrap_or_else(|| {
                debug!(ip = %IPV6_HOST_PLACEHOLDER, "No global IPv6 address found, using placeholder");
                IpAddr::V6(IPV6_HOST_PLACEHOLDER)
            });
        node.set_internal_ip(ip);
    }

    if node.ipv6_alloc_cidr.is_none() {
        if let Some(ipv4) = &node.ipv4_alloc_cidr {
            let range = ipv6_alloc_cidr_from_ipv4(config.ipv6_cluster_alloc_cidr_base(), ipv4)?;
            info!(v6_prefix = %range, "Using autogenerated IPv6 allocation range");
            node.ipv6_alloc_cidr = Some(range);
        }
    }

    Ok(())
}
