use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use ipnet::Ipv4Net;

use super::*;
use crate::device::{AddrScope, DeviceAddr, StaticDevices};

fn addr(s: &str) -> DeviceAddr {
    DeviceAddr::new(s.parse::<IpAddr>().unwrap())
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn names(devices: &[&str]) -> Vec<String> {
    devices.iter().map(|d| d.to_string()).collect()
}

fn three_devices() -> StaticDevices {
    StaticDevices::new()
        .with_device("eth0", vec![addr("10.0.0.1"), addr("fd00::1")])
        .with_device("eth1", vec![addr("10.0.1.1"), addr("fd00:1::1")])
        .with_device("eth2", vec![addr("10.0.2.1"), addr("fd00:2::1")])
        .with_device("bond0", vec![addr("192.168.7.7"), addr("fd00:7::7")])
}

// ============================================================================
// Scalar fields
// ============================================================================

#[test]
fn test_loopback_roundtrip() {
    let cache = AddressCache::new();
    assert_eq!(cache.loopback(), None);

    cache.set_loopback(Some(Ipv4Addr::new(169, 254, 42, 1)));
    assert_eq!(cache.loopback(), Some(Ipv4Addr::new(169, 254, 42, 1)));
}

#[test]
fn test_router_info() {
    let cache = AddressCache::new();
    assert!(cache.router_info().is_none());

    let cidr: Ipv4Net = "10.0.0.0/24".parse().unwrap();
    cache.set_router_info(Some(Arc::new(StaticRouterInfo::new(vec![cidr]))));

    let info = cache.router_info().unwrap();
    assert_eq!(info.ipv4_cidrs(), vec![cidr]);
}

// ============================================================================
// NodePort
// ============================================================================

#[tokio::test]
async fn test_nodeport_per_device() {
    let cache = AddressCache::new();
    let devices = three_devices();

    cache
        .init_nodeport_addrs(
            &devices,
            &[IpFamily::V4, IpFamily::V6],
            &names(&["eth0", "eth1"]),
            None,
            None,
        )
        .await
        .unwrap();

    let v4 = cache.nodeport_addrs_with_devices(IpFamily::V4);
    assert_eq!(v4.len(), 2);
    assert_eq!(v4["eth0"], ip("10.0.0.1"));
    assert_eq!(v4["eth1"], ip("10.0.1.1"));

    let v6 = cache.nodeport_addrs_with_devices(IpFamily::V6);
    assert_eq!(v6["eth1"], ip("fd00:1::1"));

    let mut flat = cache.nodeport_addrs(IpFamily::V4);
    flat.sort();
    assert_eq!(flat, vec![ip("10.0.0.1"), ip("10.0.1.1")]);
}

#[tokio::test]
async fn test_nodeport_inherits_single_address() {
    let cache = AddressCache::new();
    let devices = three_devices();

    cache
        .init_nodeport_addrs(
            &devices,
            &[IpFamily::V4, IpFamily::V6],
            &names(&["eth0", "eth1", "eth2"]),
            Some("bond0"),
            None,
        )
        .await
        .unwrap();

    let v4 = cache.nodeport_addrs_with_devices(IpFamily::V4);
    assert_eq!(v4.len(), 3);
    assert!(v4.values().all(|a| *a == ip("192.168.7.7")));

    let v6 = cache.nodeport_addrs_with_devices(IpFamily::V6);
    assert_eq!(v6.len(), 3);
    assert!(v6.values().all(|a| *a == ip("fd00:7::7")));
}

#[tokio::test]
async fn test_nodeport_inheritance_ignores_listed_devices() {
    // Listed devices need not exist when inheriting.
    let cache = AddressCache::new();
    let devices = StaticDevices::new().with_device("bond0", vec![addr("10.9.9.9")]);

    cache
        .init_nodeport_addrs(&devices, &[IpFamily::V4], &names(&["x", "y"]), Some("bond0"), None)
        .await
        .unwrap();

    assert_eq!(cache.nodeport_addrs(IpFamily::V4), vec![ip("10.9.9.9"); 2]);
}

#[tokio::test]
async fn test_nodeport_prefers_hint() {
    let cache = AddressCache::new();
    let devices =
        StaticDevices::new().with_device("eth0", vec![addr("10.0.0.1"), addr("10.0.0.2")]);

    cache
        .init_nodeport_addrs(
            &devices,
            &[IpFamily::V4],
            &names(&["eth0"]),
            None,
            Some(ip("10.0.0.2")),
        )
        .await
        .unwrap();

    assert_eq!(cache.nodeport_addrs(IpFamily::V4), vec![ip("10.0.0.2")]);
}

#[tokio::test]
async fn test_nodeport_failure_leaves_previous_map() {
    let cache = AddressCache::new();
    let devices = three_devices();

    cache
        .init_nodeport_addrs(&devices, &[IpFamily::V4], &names(&["eth0"]), None, None)
        .await
        .unwrap();
    let before = cache.nodeport_addrs_with_devices(IpFamily::V4);

    // eth3 only has a link-local address.
    devices.set_device(
        "eth3",
        vec![addr("169.254.3.3"), addr("10.3.3.3").with_scope(AddrScope::Link)],
    );
    let err = cache
        .init_nodeport_addrs(&devices, &[IpFamily::V4], &names(&["eth1", "eth3"]), None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CacheError::AddressResolution { purpose: AddrPurpose::NodePort, ref device, .. } if device == "eth3"
    ));
    assert_eq!(cache.nodeport_addrs_with_devices(IpFamily::V4), before);
}

#[tokio::test]
async fn test_nodeport_v6_failure_keeps_v4_untouched() {
    let cache = AddressCache::new();
    let devices = StaticDevices::new()
        .with_device("eth0", vec![addr("10.0.0.1"), addr("fd00::1")])
        .with_device("eth1", vec![addr("10.0.1.1")]);

    cache
        .init_nodeport_addrs(&devices, &[IpFamily::V4, IpFamily::V6], &names(&["eth0"]), None, None)
        .await
        .unwrap();

    let result = cache
        .init_nodeport_addrs(
            &devices,
            &[IpFamily::V4, IpFamily::V6],
            &names(&["eth0", "eth1"]),
            None,
            None,
        )
        .await;
    assert!(result.is_err());

    let v4 = cache.nodeport_addrs_with_devices(IpFamily::V4);
    assert_eq!(v4.len(), 1);
    assert_eq!(v4["eth0"], ip("10.0.0.1"));
}

#[tokio::test]
async fn test_nodeport_missing_inherit_device() {
    let cache = AddressCache::new();
    let devices = three_devices();

    let err = cache
        .init_nodeport_addrs(&devices, &[IpFamily::V4], &names(&["eth0"]), Some("nope"), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(cache.nodeport_addrs(IpFamily::V4).is_empty());
}

#[tokio::test]
async fn test_returned_maps_are_copies() {
    let cache = AddressCache::new();
    let devices = three_devices();
    cache
        .init_nodeport_addrs(&devices, &[IpFamily::V4], &names(&["eth0"]), None, None)
        .await
        .unwrap();

    let mut copy = cache.nodeport_addrs_with_devices(IpFamily::V4);
    copy.insert("evil".to_string(), ip("1.2.3.4"));
    copy.remove("eth0");

    let fresh = cache.nodeport_addrs_with_devices(IpFamily::V4);
    assert_eq!(fresh.len(), 1);
    assert!(fresh.contains_key("eth0"));
}

// ============================================================================
// Masquerade
// ============================================================================

#[tokio::test]
async fn test_masquerade_prefers_public() {
    let cache = AddressCache::new();
    let devices =
        StaticDevices::new().with_device("eth0", vec![addr("10.0.0.1"), addr("8.8.4.4")]);

    cache
        .init_masquerade_addrs(&devices, &[IpFamily::V4], &names(&["eth0"]), None)
        .await
        .unwrap();

    assert_eq!(
        cache.masquerade_addrs_with_devices(IpFamily::V4)["eth0"],
        ip("8.8.4.4")
    );
}

#[tokio::test]
async fn test_masquerade_derive_from_device() {
    let cache = AddressCache::new();
    let devices = three_devices();

    cache
        .init_masquerade_addrs(
            &devices,
            &[IpFamily::V4, IpFamily::V6],
            &names(&["eth0", "eth1"]),
            Some("bond0"),
        )
        .await
        .unwrap();

    let v4 = cache.masquerade_addrs_with_devices(IpFamily::V4);
    assert_eq!(v4["eth0"], ip("192.168.7.7"));
    assert_eq!(v4["eth1"], ip("192.168.7.7"));
    let v6 = cache.masquerade_addrs_with_devices(IpFamily::V6);
    assert_eq!(v6["eth0"], ip("fd00:7::7"));

    // NodePort maps are independent of masquerade maps.
    assert!(cache.nodeport_addrs_with_devices(IpFamily::V4).is_empty());
}

#[tokio::test]
async fn test_masquerade_error_names_purpose() {
    let cache = AddressCache::new();
    let devices = StaticDevices::new().with_device("eth0", vec![]);

    let err = cache
        .init_masquerade_addrs(&devices, &[IpFamily::V6], &names(&["eth0"]), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to determine ipv6 address of eth0 for BPF masquerade: no ipv6 address found on eth0"
    );
}
