//! Host Address Restore
//!
//! Recovers the router addresses assigned on a previous run so that a
//! restarted node keeps its IPv4 gateway and IPv6 router address. The
//! addresses are read from the node config header written by the datapath
//! loader; when the header yields nothing, the IPv4 address is taken from the
//! host device instead.

mod header;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RestoreConfig;
use crate::device::DeviceSource;
use crate::node::IpFamily;

pub use header::{parse_c_array, LineMatcher, LINE_MATCHERS, RESTORE_V4_MARKER, RESTORE_V6_MARKER};

/// Errors reading the node config header.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("failed to open node config {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Router addresses recovered from a previous run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostIps {
    pub ipv4_gateway: Option<Ipv4Addr>,
    pub ipv6_router: Option<Ipv6Addr>,
}

impl HostIps {
    pub fn is_empty(&self) -> bool {
        self.ipv4_gateway.is_none() && self.ipv6_router.is_none()
    }

    fn has(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.ipv4_gateway.is_some(),
            IpFamily::V6 => self.ipv6_router.is_some(),
        }
    }

    fn record(&mut self, ip: IpAddr) {
        match ip {
            IpAddr::V4(ip) => self.ipv4_gateway = Some(ip),
            IpAddr::V6(ip) => self.ipv6_router = Some(ip),
        }
    }
}

/// Read router addresses from the node config header at `path`.
pub fn host_ips_from_file(path: &Path) -> Result<HostIps, RestoreError> {
    let file = File::open(path).map_err(|e| RestoreError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(scan_host_ips(BufReader::new(file), path))
}

/// Scan a node config header for router addresses.
///
/// Each line is offered to the first [`LineMatcher`] that claims it among
/// those whose family is still missing. Lines that fail to decode are
/// skipped; each family is recovered at most once. A read error ends the
/// scan but keeps whatever was decoded before it.
pub(crate) fn scan_host_ips<R: BufRead>(reader: R, path: &Path) -> HostIps {
    let mut ips = HostIps::default();
    for line in reader.split(b'\n') {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %e,
                    "Node config read failed, keeping earlier lines"
                );
                break;
            }
        };
        let line = String::from_utf8_lossy(&line);

        let Some(matcher) = LINE_MATCHERS
            .iter()
            .find(|m| !ips.has(m.family()) && m.claims(&line))
        else {
            continue;
        };

        match matcher.decode(&line) {
            Some(ip) => {
                debug!(?matcher, %ip, "Decoded router address line");
                ips.record(ip);
            }
            None => debug!(?matcher, "Skipping malformed router address line"),
        }

        if ips.has(IpFamily::V4) && ips.has(IpFamily::V6) {
            break;
        }
    }

    ips
}

/// Recover the router addresses of a previous run.
///
/// Returns nothing when restore is disabled. Falls back to the first IPv4
/// address of the host device when the header is missing or holds neither
/// address; IPv6 cannot be recovered that way.
pub async fn restore_host_ips<S: DeviceSource>(config: &RestoreConfig, source: &S) -> HostIps {
    if !config.enabled() {
        debug!("Host IP restore disabled");
        return HostIps::default();
    }

    let path = config.node_config_path();
    match host_ips_from_file(&path) {
        Ok(ips) if !ips.is_empty() => {
            info!(
                ipv4 = ?ips.ipv4_gateway,
                ipv6 = ?ips.ipv6_router,
                file = %path.display(),
                "Restored router address from node config"
            );
            return ips;
        }
        Ok(_) => debug!(file = %path.display(), "No router address in node config"),
        Err(RestoreError::Open { source, .. }) => {
            debug!(file = %path.display(), error = %source, "Node config not available")
        }
    }

    HostIps {
        ipv4_gateway: host_device_ipv4(source, config.host_device()).await,
        ipv6_router: None,
    }
}

async fn host_device_ipv4<S: DeviceSource>(source: &S, device: &str) -> Option<Ipv4Addr> {
    let addrs = match source.addresses(Some(device)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!(device, error = %e, "Cannot list host device addresses");
            return None;
        }
    };

    let ip = addrs.iter().find_map(|a| match a.ip {
        IpAddr::V4(ip) if !a.secondary => Some(ip),
        _ => None,
    });
    if let Some(ip) = ip {
        info!(device, %ip, "Restored router IPv4 from host device");
    }
    ip
}
