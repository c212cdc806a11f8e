//! Kernel device addresses over rtnetlink.

use futures::TryStreamExt;
use netlink_packet_route::address::{
    AddressAttribute, AddressHeaderFlag, AddressMessage, AddressScope,
};
use rtnetlink::{new_connection, Handle};
use std::net::IpAddr;
use tracing::debug;

use super::{AddrScope, DeviceAddr, DeviceError, DeviceSource};

/// A [`DeviceSource`] backed by the kernel's rtnetlink interface.
///
/// Each lookup opens a short-lived netlink connection, so this type holds no
/// state and must be used from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetlinkDevices;

impl NetlinkDevices {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceSource for NetlinkDevices {
    async fn addresses(&self, device: Option<&str>) -> Result<Vec<DeviceAddr>, DeviceError> {
        let (connection, handle, _) = new_connection()?;
        tokio::spawn(connection);

        let mut request = handle.address().get();
        if let Some(name) = device {
            let index = get_interface_index(&handle, name).await?;
            request = request.set_link_index_filter(index);
        }

        let mut messages = request.execute();
        let mut addrs = Vec::new();
        while let Some(msg) = messages.try_next().await? {
            if let Some(addr) = device_addr(&msg) {
                addrs.push(addr);
            }
        }

        debug!(device = device.unwrap_or("any"), count = addrs.len(), "Listed device addresses");
        Ok(addrs)
    }
}

/// Get the interface index by name.
async fn get_interface_index(handle: &Handle, name: &str) -> Result<u32, DeviceError> {
    let mut links = handle.link().get().match_name(name.to_string()).execute();

    match links.try_next().await {
        Ok(Some(link)) => Ok(link.header.index),
        Ok(None) | Err(rtnetlink::Error::NetlinkError(_)) => {
            Err(DeviceError::DeviceNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Convert a netlink address message into a [`DeviceAddr`].
///
/// IPv4 point-to-point links carry the peer in `IFA_ADDRESS`, so the local
/// address is preferred when present.
fn device_addr(msg: &AddressMessage) -> Option<DeviceAddr> {
    let mut local = None;
    let mut address = None;
    for attr in &msg.attributes {
        match attr {
            AddressAttribute::Local(ip) => local = Some(*ip),
            AddressAttribute::Address(ip) => address = Some(*ip),
            _ => {}
        }
    }

    let ip: IpAddr = match (local, address) {
        (Some(ip @ IpAddr::V4(_)), _) => ip,
        (_, Some(ip)) => ip,
        (Some(ip), None) => ip,
        (None, None) => return None,
    };

    Some(DeviceAddr {
        ip,
        scope: scope_from(msg.header.scope),
        secondary: msg.header.flags.contains(&AddressHeaderFlag::Secondary),
    })
}

fn scope_from(scope: AddressScope) -> AddrScope {
    match scope {
        AddressScope::Universe => AddrScope::Universe,
        AddressScope::Site => AddrScope::Site,
        AddressScope::Link => AddrScope::Link,
        AddressScope::Host => AddrScope::Host,
        _ => AddrScope::Nowhere,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(scope: AddressScope, attributes: Vec<AddressAttribute>) -> AddressMessage {
        let mut msg = AddressMessage::default();
        msg.header.scope = scope;
        msg.attributes = attributes;
        msg
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipv4_local_preferred_over_peer() {
        let msg = message(
            AddressScope::Universe,
            vec![
                AddressAttribute::Address(ip("10.0.0.2")),
                AddressAttribute::Local(ip("10.0.0.1")),
            ],
        );

        let addr = device_addr(&msg).unwrap();
        assert_eq!(addr.ip, ip("10.0.0.1"));
        assert_eq!(addr.scope, AddrScope::Universe);
        assert!(!addr.secondary);
    }

    #[test]
    fn test_address_used_without_local() {
        let msg = message(
            AddressScope::Universe,
            vec![AddressAttribute::Address(ip("2001:db8::1"))],
        );
        assert_eq!(device_addr(&msg).unwrap().ip, ip("2001:db8::1"));
    }

    #[test]
    fn test_ipv6_address_wins_over_local() {
        let msg = message(
            AddressScope::Universe,
            vec![
                AddressAttribute::Local(ip("2001:db8::2")),
                AddressAttribute::Address(ip("2001:db8::1")),
            ],
        );
        assert_eq!(device_addr(&msg).unwrap().ip, ip("2001:db8::1"));
    }

    #[test]
    fn test_secondary_flag() {
        let mut msg = message(
            AddressScope::Universe,
            vec![AddressAttribute::Local(ip("10.0.0.9"))],
        );
        msg.header.flags = vec![AddressHeaderFlag::Secondary];

        assert!(device_addr(&msg).unwrap().secondary);
    }

    #[test]
    fn test_link_scope() {
        let msg = message(
            AddressScope::Link,
            vec![AddressAttribute::Address(ip("fe80::1"))],
        );
        assert_eq!(device_addr(&msg).unwrap().scope, AddrScope::Link);
    }

    #[test]
    fn test_no_address_attributes() {
        let msg = message(AddressScope::Universe, vec![AddressAttribute::Label("eth0".into())]);
        assert_eq!(device_addr(&msg), None);
    }

    #[test]
    fn test_scope_mapping() {
        assert_eq!(scope_from(AddressScope::Universe), AddrScope::Universe);
        assert_eq!(scope_from(AddressScope::Site), AddrScope::Site);
        assert_eq!(scope_from(AddressScope::Link), AddrScope::Link);
        assert_eq!(scope_from(AddressScope::Host), AddrScope::Host);
        assert_eq!(scope_from(AddressScope::Nowhere), AddrScope::Nowhere);
    }
}
