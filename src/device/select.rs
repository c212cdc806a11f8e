//! Address selection over a device's configured addresses.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::DeviceAddr;
use crate::node::IpFamily;

/// Select the address representing a device for `family`.
///
/// Candidates are the global-scope addresses of `family`; secondary addresses
/// are skipped unless they equal `hint`. Among the candidates:
/// 1. `hint`, if present,
/// 2. the first publicly routable address, when `prefer_public` is set,
/// 3. the first candidate in enumeration order.
pub fn first_global_addr(
    addrs: &[DeviceAddr],
    family: IpFamily,
    hint: Option<IpAddr>,
    prefer_public: bool,
) -> Option<IpAddr> {
    let candidates: Vec<IpAddr> = addrs
        .iter()
        .filter(|a| a.family() == family && a.scope.is_global())
        .filter(|a| !a.secondary || Some(a.ip) == hint)
        .map(|a| a.ip)
        .collect();

    if let Some(hint) = hint {
        if candidates.contains(&hint) {
            return Some(hint);
        }
    }

    if prefer_public {
        if let Some(public) = candidates.iter().find(|ip| is_public_addr(ip)) {
            return Some(*public);
        }
    }

    candidates.first().copied()
}

/// Check whether `ip` is publicly routable.
///
/// Private (RFC 1918), shared (RFC 6598), loopback, link-local, documentation
/// and unique-local ranges are not public.
pub fn is_public_addr(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    let shared = octets[0] == 100 && (octets[1] & 0xc0) == 64;
    !(ip.is_private()
        || shared
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_documentation()
        || ip.is_unspecified()
        || ip.is_broadcast())
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    let documentation = first == 0x2001 && ip.segments()[1] == 0x0db8;
    !(unique_local || link_local || documentation || ip.is_loopback() || ip.is_unspecified())
}
