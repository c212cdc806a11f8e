//! Default allocation prefix templates.

use ipnet::{Ipv4Net, Ipv6Net};
use std::net::Ipv4Addr;

use super::ResolveError;
use crate::node::IpFamily;

/// Length of the IPv6 allocation prefix derived from an IPv4 one.
pub const DERIVED_IPV6_PREFIX_LEN: u8 = 96;

/// Build the auto-generated IPv4 allocation range `10.<seed>.0.0/<len>`.
///
/// The last octet of `seed` selects the second octet of the range.
pub fn default_ipv4_alloc_cidr(seed: Ipv4Addr, prefix_len: u8) -> Result<Ipv4Net, ResolveError> {
    let prefix = format!("10.{}.0.0/{}", seed.octets()[3], prefix_len);
    prefix
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|e| ResolveError::InvalidDefaultPrefix {
            family: IpFamily::V4,
            reason: e.to_string(),
            prefix,
        })
}

/// Derive the IPv6 allocation range from an IPv4 one.
///
/// The four octets of the IPv4 network address are embedded hex-encoded
/// after `base`, giving `<base><o0o1>:<o2o3>:0:0/96`.
pub fn ipv6_alloc_cidr_from_ipv4(base: &str, ipv4: &Ipv4Net) -> Result<Ipv6Net, ResolveError> {
    let o = ipv4.addr().octets();
    let prefix = format!(
        "{}{:02x}{:02x}:{:02x}{:02x}:0:0/{}",
        base, o[0], o[1], o[2], o[3], DERIVED_IPV6_PREFIX_LEN
    );
    prefix
        .parse::<Ipv6Net>()
        .map(|net| net.trunc())
        .map_err(|e| ResolveError::InvalidDefaultPrefix {
            family: IpFamily::V6,
            reason: e.to_string(),
            prefix,
        })
}

/// IPv4 seed embedded in an IPv6 allocation range (bytes 8 to 11).
pub fn ipv4_seed_from_ipv6(ipv6: &Ipv6Net) -> Ipv4Addr {
    let b = ipv6.addr().octets();
    Ipv4Addr::new(b[8], b[9], b[10], b[11])
}
