//! Node config header line decoding.
//!
//! The header carries the router addresses in one of two encodings. The
//! current one is a marker followed by a 16-byte C array:
//!
//! ```text
//!  * cilium.v4.internal.raw 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xff, 0xff, 0xa, 0x0, 0x1, 0x1c
//!  * cilium.v6.internal.raw 0xf0, 0xd, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x8a, 0xd6
//! ```
//!
//! Older headers used plain defines:
//!
//! ```text
//! #define IPV4_GATEWAY 0xee1c000a
//! #define ROUTER_IP 0xf0, 0xd, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x8a, 0xd6
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::node::IpFamily;

/// Marker of the current IPv4 router encoding.
pub const RESTORE_V4_MARKER: &str = "cilium.v4.internal.raw ";

/// Marker of the current IPv6 router encoding.
pub const RESTORE_V6_MARKER: &str = "cilium.v6.internal.raw ";

const LEGACY_IPV4_GATEWAY: &str = "IPV4_GATEWAY";
const LEGACY_ROUTER_IP: &str = " ROUTER_IP ";

/// Width of every encoded address, IPv4 included.
const ENCODED_ADDR_LEN: usize = 16;

/// One recognized encoding of a router address line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMatcher {
    CurrentIpv6,
    CurrentIpv4,
    LegacyIpv4Gateway,
    LegacyRouterIp,
}

/// Matchers in the order they are tried against each line.
pub const LINE_MATCHERS: [LineMatcher; 4] = [
    LineMatcher::CurrentIpv6,
    LineMatcher::CurrentIpv4,
    LineMatcher::LegacyIpv4Gateway,
    LineMatcher::LegacyRouterIp,
];

impl LineMatcher {
    /// Address family this matcher recovers.
    pub fn family(self) -> IpFamily {
        match self {
            LineMatcher::CurrentIpv4 | LineMatcher::LegacyIpv4Gateway => IpFamily::V4,
            LineMatcher::CurrentIpv6 | LineMatcher::LegacyRouterIp => IpFamily::V6,
        }
    }

    fn trigger(self) -> &'static str {
        match self {
            LineMatcher::CurrentIpv6 => RESTORE_V6_MARKER,
            LineMatcher::CurrentIpv4 => RESTORE_V4_MARKER,
            LineMatcher::LegacyIpv4Gateway => LEGACY_IPV4_GATEWAY,
            LineMatcher::LegacyRouterIp => LEGACY_ROUTER_IP,
        }
    }

    /// Whether `line` is claimed by this matcher.
    ///
    /// A claimed line is never offered to the matchers after this one, even
    /// when [`decode`](Self::decode) then rejects it.
    pub fn claims(self, line: &str) -> bool {
        line.contains(self.trigger())
    }

    /// Decode the address carried by a claimed line.
    pub fn decode(self, line: &str) -> Option<IpAddr> {
        match self {
            LineMatcher::CurrentIpv6 | LineMatcher::LegacyRouterIp => {
                decode_array_after(line, self.trigger()).map(|b| IpAddr::V6(Ipv6Addr::from(b)))
            }
            LineMatcher::CurrentIpv4 => decode_array_after(line, self.trigger())
                .and_then(|b| Ipv6Addr::from(b).to_ipv4_mapped())
                .map(IpAddr::V4),
            LineMatcher::LegacyIpv4Gateway => decode_gateway_define(line).map(IpAddr::V4),
        }
    }
}

/// Split `line` around `marker` and decode the trailing 16-byte array.
fn decode_array_after(line: &str, marker: &str) -> Option<[u8; ENCODED_ADDR_LEN]> {
    let mut parts = line.split(marker);
    let (_, tail) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    parse_c_array(tail)?.try_into().ok()
}

/// Decode `#define IPV4_GATEWAY 0x<hex>`.
///
/// The value is laid out in host byte order. Zero means no gateway.
fn decode_gateway_define(line: &str) -> Option<Ipv4Addr> {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() != 3 {
        return None;
    }
    let hex = fields[2].strip_prefix("0x").unwrap_or(fields[2]);
    let value = u32::from_str_radix(hex, 16).ok()?;
    if value == 0 {
        return None;
    }
    Some(Ipv4Addr::from(value.to_ne_bytes()))
}

/// Parse a C byte-array literal such as `{ 0xa, 0x0, 0x1 }`.
///
/// Braces, surrounding whitespace and a trailing comma are accepted. Any
/// token that is not a `0x`-prefixed byte rejects the whole literal.
pub fn parse_c_array(literal: &str) -> Option<Vec<u8>> {
    let mut body = literal.trim();
    if let Some(inner) = body.strip_prefix('{') {
        body = inner.strip_suffix('}')?.trim();
    }
    if body.is_empty() {
        return Some(Vec::new());
    }
    let body = body.strip_suffix(',').unwrap_or(body);

    body.split(',')
        .map(|token| {
            let token = token.trim();
            let hex = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))?;
            u8::from_str_radix(hex, 16).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_c_array_plain() {
        assert_eq!(parse_c_array("0xa, 0x0, 0x1, 0x1c"), Some(vec![10, 0, 1, 28]));
    }

    #[test]
    fn test_parse_c_array_braces_and_trailing_comma() {
        assert_eq!(parse_c_array(" { 0xf0, 0xD, } "), Some(vec![0xf0, 0x0d]));
        assert_eq!(parse_c_array("{}"), Some(vec![]));
    }

    #[test]
    fn test_parse_c_array_rejects_bad_tokens() {
        assert_eq!(parse_c_array("0xa, zz"), None);
        assert_eq!(parse_c_array("0xa, 10"), None);
        assert_eq!(parse_c_array("0xa,, 0x1"), None);
        assert_eq!(parse_c_array("0x100"), None);
        assert_eq!(parse_c_array("{ 0xa"), None);
    }

    #[test]
    fn test_claims_in_order() {
        let line = " * cilium.v6.internal.raw 0x0";
        let claimed: Vec<_> = LINE_MATCHERS.iter().filter(|m| m.claims(line)).collect();
        assert_eq!(claimed, vec![&LineMatcher::CurrentIpv6]);
    }

    #[test]
    fn test_current_ipv4_requires_mapped_form() {
        let mapped = " * cilium.v4.internal.raw 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xff, 0xff, 0xa, 0x0, 0x1, 0x1c";
        assert_eq!(
            LineMatcher::CurrentIpv4.decode(mapped),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 1, 28)))
        );

        let unmapped = " * cilium.v4.internal.raw 0xf0, 0xd, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x8a, 0xd6";
        assert_eq!(LineMatcher::CurrentIpv4.decode(unmapped), None);
    }

    #[test]
    fn test_current_wrong_length_rejected() {
        let line = " * cilium.v6.internal.raw 0xa, 0x0, 0x1, 0x1c";
        assert_eq!(LineMatcher::CurrentIpv6.decode(line), None);
    }

    #[test]
    fn test_marker_twice_rejected() {
        let line = "cilium.v6.internal.raw 0x0 cilium.v6.internal.raw 0x0";
        assert_eq!(LineMatcher::CurrentIpv6.decode(line), None);
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_gateway_define_host_byte_order() {
        assert_eq!(
            LineMatcher::LegacyIpv4Gateway.decode("#define IPV4_GATEWAY 0x0a00011c"),
            Some(IpAddr::V4(Ipv4Addr::new(28, 1, 0, 10)))
        );
    }

    #[test]
    fn test_gateway_define_rejects() {
        let m = LineMatcher::LegacyIpv4Gateway;
        assert_eq!(m.decode("#define IPV4_GATEWAY 0x0"), None);
        assert_eq!(m.decode("#define  IPV4_GATEWAY 0x1"), None);
        assert_eq!(m.decode("#define IPV4_GATEWAY 0xnothex"), None);
        assert_eq!(m.decode("#define IPV4_GATEWAY 0x1ffffffff"), None);
    }

    #[test]
    fn test_legacy_router_ip() {
        let line = "#define ROUTER_IP 0xf0, 0xd, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x0, 0x0, 0x0, 0x0, 0x0, 0x8a, 0xd6";
        assert_eq!(
            LineMatcher::LegacyRouterIp.decode(line),
            Some(IpAddr::V6("f00d::a00:0:0:8ad6".parse().unwrap()))
        );
    }
}
