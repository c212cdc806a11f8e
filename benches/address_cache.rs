//! Benchmarks for hot-path address reads.
//!
//! Run with: cargo bench --bench address_cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use localnode::{AddressCache, DeviceAddr, IpFamily, LocalNode, NodeStore, StaticDevices};
use std::net::{IpAddr, Ipv4Addr};

fn device_names(n: u8) -> Vec<String> {
    (0..n).map(|i| format!("eth{}", i)).collect()
}

/// Cache with NodePort and masquerade maps for `n` devices.
fn populated_cache(n: u8) -> AddressCache {
    let devices = StaticDevices::new();
    for i in 0..n {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, i, 1));
        devices.set_device(&format!("eth{}", i), vec![DeviceAddr::new(ip)]);
    }

    let cache = AddressCache::new();
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    rt.block_on(async {
        let names = device_names(n);
        cache
            .init_nodeport_addrs(&devices, &[IpFamily::V4], &names, None, None)
            .await
            .unwrap();
        cache
            .init_masquerade_addrs(&devices, &[IpFamily::V4], &names, None)
            .await
            .unwrap();
    });
    cache
}

// ===== AddressCache Benchmarks =====

fn bench_nodeport_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("nodeport_addrs");

    for n in [1u8, 8, 64] {
        let cache = populated_cache(n);
        group.bench_with_input(BenchmarkId::new("flat", n), &cache, |b, cache| {
            b.iter(|| black_box(cache.nodeport_addrs(IpFamily::V4)))
        });
        group.bench_with_input(BenchmarkId::new("with_devices", n), &cache, |b, cache| {
            b.iter(|| black_box(cache.nodeport_addrs_with_devices(IpFamily::V4)))
        });
    }

    group.finish();
}

fn bench_scalar_reads(c: &mut Criterion) {
    let cache = populated_cache(4);
    cache.set_loopback(Some(Ipv4Addr::new(169, 254, 42, 1)));

    c.bench_function("loopback", |b| b.iter(|| black_box(cache.loopback())));
}

// ===== NodeStore Benchmarks =====

fn bench_store(c: &mut Criterion) {
    let mut node = LocalNode::new("bench");
    node.set_internal_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    node.ipv4_alloc_cidr = Some("10.1.0.0/16".parse().unwrap());
    let store = NodeStore::new(node);

    c.bench_function("store_snapshot", |b| {
        b.iter(|| black_box(store.snapshot().unwrap()))
    });

    c.bench_function("store_update", |b| {
        b.iter(|| {
            store
                .update(|n| n.encryption_key = n.encryption_key.wrapping_add(1))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_nodeport_reads, bench_scalar_reads, bench_store);
criterion_main!(benches);
