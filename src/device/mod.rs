//! Network Device Addresses
//!
//! Enumerates the addresses configured on host network devices and selects
//! the address that represents a device for a given IP family.
//!
//! The [`DeviceSource`] trait is the seam between address derivation and the
//! host: [`NetlinkDevices`] queries the kernel over rtnetlink, while
//! [`StaticDevices`] serves a fixed table.

mod netlink;
mod select;
mod fixed;

use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

use crate::node::IpFamily;

pub use fixed::StaticDevices;
pub use netlink::NetlinkDevices;
pub use select::{first_global_addr, is_public_addr};

/// Errors related to device address lookups.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("no {family} address found on {device}")]
    NoAddressFound { device: String, family: IpFamily },

    #[error("netlink error: {0}")]
    Netlink(#[from] rtnetlink::Error),

    #[error("netlink connection failed: {0}")]
    Connection(#[from] std::io::Error),
}

/// Kernel address scope, ordered from widest to narrowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddrScope {
    /// Global scope, routable beyond this host.
    Universe,
    Site,
    Link,
    Host,
    Nowhere,
}

impl AddrScope {
    pub fn is_global(&self) -> bool {
        matches!(self, AddrScope::Universe)
    }
}

impl fmt::Display for AddrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddrScope::Universe => "global",
            AddrScope::Site => "site",
            AddrScope::Link => "link",
            AddrScope::Host => "host",
            AddrScope::Nowhere => "nowhere",
        };
        write!(f, "{}", s)
    }
}

/// One address configured on a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceAddr {
    pub ip: IpAddr,
    pub scope: AddrScope,
    /// Secondary address on the device (kernel `IFA_F_SECONDARY`).
    pub secondary: bool,
}

impl DeviceAddr {
    /// A primary address with the scope implied by the address itself.
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            scope: implied_scope(&ip),
            secondary: false,
        }
    }

    pub fn with_scope(mut self, scope: AddrScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn secondary(mut self) -> Self {
        self.secondary = true;
        self
    }

    pub fn family(&self) -> IpFamily {
        IpFamily::of(&self.ip)
    }
}

/// Scope the kernel would assign to `ip` by default.
fn implied_scope(ip: &IpAddr) -> AddrScope {
    match ip {
        IpAddr::V4(v4) if v4.is_loopback() => AddrScope::Host,
        IpAddr::V4(v4) if v4.is_link_local() => AddrScope::Link,
        IpAddr::V6(v6) if v6.is_loopback() => AddrScope::Host,
        IpAddr::V6(v6) if (v6.segments()[0] & 0xffc0) == 0xfe80 => AddrScope::Link,
        _ => AddrScope::Universe,
    }
}

/// Source of device address information.
///
/// `device = None` asks for the addresses of every device on the host.
/// Implementations return addresses in kernel enumeration order and fail with
/// [`DeviceError::DeviceNotFound`] when a named device does not exist.
#[allow(async_fn_in_trait)]
pub trait DeviceSource {
    async fn addresses(&self, device: Option<&str>) -> Result<Vec<DeviceAddr>, DeviceError>;
}

impl<T: DeviceSource + ?Sized> DeviceSource for &T {
    async fn addresses(&self, device: Option<&str>) -> Result<Vec<DeviceAddr>, DeviceError> {
        (**self).addresses(device).await
    }
}

impl<T: DeviceSource + ?Sized> DeviceSource for std::sync::Arc<T> {
    async fn addresses(&self, device: Option<&str>) -> Result<Vec<DeviceAddr>, DeviceError> {
        (**self).addresses(device).await
    }
}

/// Look up the first global-scope address of `family` on `device`.
///
/// See [`first_global_addr`] for the selection rules.
pub async fn resolve_global_addr<S: DeviceSource>(
    source: &S,
    device: Option<&str>,
    family: IpFamily,
    hint: Option<IpAddr>,
    prefer_public: bool,
) -> Result<IpAddr, DeviceError> {
    let addrs = source.addresses(device).await?;
    first_global_addr(&addrs, family, hint, prefer_public).ok_or_else(|| {
        DeviceError::NoAddressFound {
            device: device.unwrap_or("any").to_string(),
            family,
        }
    })
}
