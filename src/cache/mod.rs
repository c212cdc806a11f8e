//! Address Cache
//!
//! Per-device addresses derived from the host's interfaces: the NodePort
//! addresses used for service NAT, the addresses used for BPF masquerading,
//! the IPv4 loopback address and the router information of the host device.
//!
//! Maps are rebuilt wholesale whenever the device set changes. Every device is
//! resolved before the write lock is taken, so a failed rebuild leaves the
//! previous maps untouched and readers never see a partial replacement.

mod router;
#[cfg(test)]
mod tests;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::device::{resolve_global_addr, DeviceError, DeviceSource};
use crate::node::IpFamily;

pub use router::{RouterInfo, StaticRouterInfo};

/// Purpose an address map is resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrPurpose {
    NodePort,
    Masquerade,
}

impl fmt::Display for AddrPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrPurpose::NodePort => write!(f, "NodePort"),
            AddrPurpose::Masquerade => write!(f, "BPF masquerade"),
        }
    }
}

/// Errors related to address cache rebuilds.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to determine {family} address of {device} for {purpose}: {source}")]
    AddressResolution {
        purpose: AddrPurpose,
        device: String,
        family: IpFamily,
        #[source]
        source: DeviceError,
    },
}

#[derive(Debug, Default)]
struct Addresses {
    ipv4_loopback: Option<Ipv4Addr>,
    ipv4_nodeport: HashMap<String, IpAddr>,
    ipv6_nodeport: HashMap<String, IpAddr>,
    ipv4_masquerade: HashMap<String, IpAddr>,
    ipv6_masquerade: HashMap<String, IpAddr>,
    router_info: Option<Arc<dyn RouterInfo>>,
}

impl Addresses {
    fn map(&self, purpose: AddrPurpose, family: IpFamily) -> &HashMap<String, IpAddr> {
        match (purpose, family) {
            (AddrPurpose::NodePort, IpFamily::V4) => &self.ipv4_nodeport,
            (AddrPurpose::NodePort, IpFamily::V6) => &self.ipv6_nodeport,
            (AddrPurpose::Masquerade, IpFamily::V4) => &self.ipv4_masquerade,
            (AddrPurpose::Masquerade, IpFamily::V6) => &self.ipv6_masquerade,
        }
    }

    fn map_mut(&mut self, purpose: AddrPurpose, family: IpFamily) -> &mut HashMap<String, IpAddr> {
        match (purpose, family) {
            (AddrPurpose::NodePort, IpFamily::V4) => &mut self.ipv4_nodeport,
            (AddrPurpose::NodePort, IpFamily::V6) => &mut self.ipv6_nodeport,
            (AddrPurpose::Masquerade, IpFamily::V4) => &mut self.ipv4_masquerade,
            (AddrPurpose::Masquerade, IpFamily::V6) => &mut self.ipv6_masquerade,
        }
    }
}

/// Process-wide cache of derived per-device addresses.
///
/// Reads take the shared lock and return owned copies.
#[derive(Debug, Default)]
pub struct AddressCache {
    inner: RwLock<Addresses>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// IPv4 loopback address of this node.
    pub fn loopback(&self) -> Option<Ipv4Addr> {
        self.inner.read().ipv4_loopback
    }

    pub fn set_loopback(&self, ip: Option<Ipv4Addr>) {
        self.inner.write().ipv4_loopback = ip;
    }

    /// Router information of the host device.
    pub fn router_info(&self) -> Option<Arc<dyn RouterInfo>> {
        self.inner.read().router_info.clone()
    }

    pub fn set_router_info(&self, info: Option<Arc<dyn RouterInfo>>) {
        self.inner.write().router_info = info;
    }

    /// Rebuild the NodePort address maps for `devices`.
    ///
    /// Each device is resolved to one global-scope address per family in
    /// `families`, preferring `hint` (the orchestrator-reported node IP) and
    /// private addresses. With `inherit_from` set, that device is resolved
    /// once and its address is used for every device.
    pub async fn init_nodeport_addrs<S: DeviceSource>(
        &self,
        source: &S,
        families: &[IpFamily],
        devices: &[String],
        inherit_from: Option<&str>,
        hint: Option<IpAddr>,
    ) -> Result<(), CacheError> {
        let mut maps = Vec::with_capacity(families.len());
        for &family in families {
            let map = resolve_map(
                source,
                AddrPurpose::NodePort,
                family,
                devices,
                inherit_from,
                hint,
                false,
            )
            .await?;
            maps.push((family, map));
        }

        self.commit(AddrPurpose::NodePort, maps);
        Ok(())
    }

    /// Rebuild the BPF masquerade address maps for `devices`.
    ///
    /// Resolution prefers public addresses. With `derive_from` set, the
    /// address of that device is used for every device instead.
    pub async fn init_masquerade_addrs<S: DeviceSource>(
        &self,
        source: &S,
        families: &[IpFamily],
        devices: &[String],
        derive_from: Option<&str>,
    ) -> Result<(), CacheError> {
        let mut maps = Vec::with_capacity(families.len());
        for &family in families {
            let map = resolve_map(
                source,
                AddrPurpose::Masquerade,
                family,
                devices,
                derive_from,
                None,
                true,
            )
            .await?;
            maps.push((family, map));
        }

        self.commit(AddrPurpose::Masquerade, maps);
        Ok(())
    }

    fn commit(&self, purpose: AddrPurpose, maps: Vec<(IpFamily, HashMap<String, IpAddr>)>) {
        let mut inner = self.inner.write();
        for (family, map) in maps {
            info!(%purpose, %family, devices = map.len(), "Address map updated");
            *inner.map_mut(purpose, family) = map;
        }
    }

    /// NodePort addresses of `family`, in unspecified order.
    pub fn nodeport_addrs(&self, family: IpFamily) -> Vec<IpAddr> {
        self.inner
            .read()
            .map(AddrPurpose::NodePort, family)
            .values()
            .copied()
            .collect()
    }

    /// NodePort addresses of `family` keyed by device name.
    pub fn nodeport_addrs_with_devices(&self, family: IpFamily) -> HashMap<String, IpAddr> {
        self.inner.read().map(AddrPurpose::NodePort, family).clone()
    }

    /// BPF masquerade addresses of `family` keyed by device name.
    pub fn masquerade_addrs_with_devices(&self, family: IpFamily) -> HashMap<String, IpAddr> {
        self.inner.read().map(AddrPurpose::Masquerade, family).clone()
    }
}

async fn resolve_map<S: DeviceSource>(
    source: &S,
    purpose: AddrPurpose,
    family: IpFamily,
    devices: &[String],
    inherit_from: Option<&str>,
    hint: Option<IpAddr>,
    prefer_public: bool,
) -> Result<HashMap<String, IpAddr>, CacheError> {
    let resolve = |device: &str| {
        let device = device.to_string();
        async move {
            resolve_global_addr(source, Some(&device), family, hint, prefer_public)
                .await
                .map_err(|source| CacheError::AddressResolution {
                    purpose,
                    device,
                    family,
                    source,
                })
        }
    };

    let mut map = HashMap::with_capacity(devices.len());
    match inherit_from {
        Some(from) => {
            let ip = resolve(from).await?;
            debug!(%purpose, %family, device = from, %ip, "Inheriting address for all devices");
            for device in devices {
                map.insert(device.clone(), ip);
            }
        }
        None => {
            for device in devices {
                let ip = resolve(device).await?;
                map.insert(device.clone(), ip);
            }
        }
    }
    Ok(map)
}
