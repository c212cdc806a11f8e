//! Router information of the host device.

use ipnet::Ipv4Net;
use std::fmt;

/// Network-mode specific information about the node's router.
pub trait RouterInfo: fmt::Debug + Send + Sync {
    /// IPv4 CIDRs owned by the router.
    fn ipv4_cidrs(&self) -> Vec<Ipv4Net>;
}

/// Router information with a fixed set of CIDRs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticRouterInfo {
    cidrs: Vec<Ipv4Net>,
}

impl StaticRouterInfo {
    pub fn new(cidrs: Vec<Ipv4Net>) -> Self {
        Self { cidrs }
    }
}

impl RouterInfo for StaticRouterInfo {
    fn ipv4_cidrs(&self) -> Vec<Ipv4Net> {
        self.cidrs.clone()
    }
}
