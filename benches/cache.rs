//! Benchmarks for the resolution cache.
//!
//! Run with: cargo bench --bench cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weft::addr::{Eid, Rloc16, RouterId};
use weft::cache::{EidCache, QueryAttempt};

const NOW_MS: u64 = 1_000_000;
const LIFETIME_MS: u64 = 300_000;

fn make_eid(val: u16) -> Eid {
    let mut octets = [0u8; 16];
    octets[0] = 0x20;
    octets[1] = 0x03;
    octets[14..16].copy_from_slice(&val.to_be_bytes());
    Eid::from_octets(octets)
}

/// Locators spread over 32 owner routers so bulk invalidation has
/// realistic fan-out.
fn make_locator(val: u16) -> Rloc16 {
    Rloc16::from_u16(((val % 32) + 1) << 10)
}

/// Pre-populate a cache with `n` valid bindings for realistic benchmarks.
fn populated_cache(n: u16) -> EidCache {
    let mut cache = EidCache::new(2048, LIFETIME_MS);
    for i in 0..n {
        cache.apply_resolution(make_eid(i), make_locator(i), 0, NOW_MS, true);
    }
    cache
}

// ===== EidCache Benchmarks =====

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_lookup");

    for &count in &[64u16, 256, 1024] {
        let mut cache = populated_cache(count);
        let present = make_eid(count / 2);
        let absent = make_eid(u16::MAX);

        group.bench_with_input(BenchmarkId::new("hit", count), &count, |b, _| {
            b.iter(|| cache.lookup(black_box(&present), NOW_MS + 1))
        });

        group.bench_with_input(BenchmarkId::new("miss", count), &count, |b, _| {
            b.iter(|| cache.lookup(black_box(&absent), NOW_MS + 1))
        });
    }

    group.finish();
}

fn bench_apply_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_apply_resolution");

    let eid = make_eid(9999);
    let locator = make_locator(9999);

    // Insert into empty cache
    group.bench_function("empty", |b| {
        b.iter(|| {
            let mut cache = EidCache::new(256, LIFETIME_MS);
            cache.apply_resolution(black_box(eid), locator, 0, NOW_MS, true);
        })
    });

    // Insert alongside 256 existing bindings (typical occupancy)
    let base = populated_cache(256);
    group.bench_function("256_entries", |b| {
        b.iter(|| {
            let mut cache = base.clone();
            cache.apply_resolution(black_box(eid), locator, 0, NOW_MS, true);
        })
    });

    // Insert into a full arena, forcing an eviction scan
    let mut full = EidCache::new(256, LIFETIME_MS);
    for i in 0..256u16 {
        full.apply_resolution(make_eid(i), make_locator(i), 0, NOW_MS, true);
    }
    group.bench_function("full_evicting", |b| {
        b.iter(|| {
            let mut cache = full.clone();
            cache.apply_resolution(black_box(eid), locator, 0, NOW_MS, true);
        })
    });

    group.finish();
}

fn bench_invalidate_by_owner(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_invalidate_by_owner");

    // Each owner holds roughly count/32 of the bindings
    let owner = RouterId::new(1).unwrap();

    for &count in &[64u16, 256, 1024] {
        let base = populated_cache(count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut cache = base.clone();
                cache.invalidate_by_owner(black_box(owner))
            })
        });
    }

    group.finish();
}

fn bench_due_attempts(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_due_attempts");

    // Valid bindings plus a band of in-flight cycles, half of them due
    for &count in &[64u16, 256] {
        let mut cache = populated_cache(count);
        for i in 0..32u16 {
            let attempt = QueryAttempt {
                request_id: u64::from(i) + 1,
                sent_at_ms: NOW_MS,
                deadline_ms: if i % 2 == 0 { NOW_MS + 500 } else { NOW_MS + 5_000 },
            };
            cache.begin_cycle(make_eid(0x4000 + i), attempt, NOW_MS);
        }

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| cache.due_attempts(black_box(NOW_MS + 1_000)))
        });
    }

    group.finish();
}

fn bench_sweep_expired(c: &mut Criterion) {
    // Half the bindings aged past their lifetime
    let mut base = EidCache::new(2048, LIFETIME_MS);
    for i in 0..256u16 {
        let created = if i % 2 == 0 { NOW_MS } else { NOW_MS - LIFETIME_MS - 1 };
        base.apply_resolution(make_eid(i), make_locator(i), 0, created, true);
    }

    c.bench_function("cache_sweep_expired_256", |b| {
        b.iter(|| {
            let mut cache = base.clone();
            cache.sweep_expired(black_box(NOW_MS + 1))
        })
    });
}

fn bench_stats(c: &mut Criterion) {
    let cache = populated_cache(256);

    c.bench_function("cache_stats_256", |b| {
        b.iter(|| cache.stats(black_box(NOW_MS + 1)))
    });
}

criterion_group!(
    benches,
    bench_lookup,
    bench_apply_resolution,
    bench_invalidate_by_owner,
    bench_due_attempts,
    bench_sweep_expired,
    bench_stats,
);
criterion_main!(benches);
