//! Multi-router scenarios over an in-memory mesh.

use super::*;

#[tokio::test]
async fn test_retry_until_exhaustion_without_owner() {
    let hub = MeshHub::new();
    let mut config = make_config(1);
    config.router.resolver.query_timeout_ms = 1000;
    config.router.resolver.max_retries = 2;
    let mut r1 = start_router_with(&hub, config).await;

    r1.send_data(eid("2003::dead"), b"no one home".to_vec())
        .await
        .unwrap();
    assert_eq!(r1.resolver_stats().queries_sent, 1);
    assert_eq!(r1.stats().queued, 1);

    let t0 = lifecycle::unix_now_ms();
    r1.run_tick(t0 + 1_100).await;
    r1.run_tick(t0 + 2_200).await;
    assert_eq!(r1.resolver_stats().retries, 2);
    assert_eq!(r1.resolver_stats().exhausted, 0);

    r1.run_tick(t0 + 3_300).await;
    let stats = r1.resolver_stats();
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.exhausted, 1);
    assert_eq!(r1.resolver.pending_stats().total_packets, 0);
}

#[tokio::test]
async fn test_concurrent_traffic_shares_one_cycle() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &[]).await;
    let mut r2 = start_router(&hub, 2, &["2003::aa"]).await;
    let mut deliveries = r2.take_deliveries().unwrap();

    for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
        r1.send_data(eid("2003::aa"), payload).await.unwrap();
    }
    assert_eq!(r1.resolver_stats().queries_sent, 1);
    assert_eq!(r1.stats().queued, 3);

    settle(&mut [&mut r1, &mut r2]).await;

    assert_eq!(deliveries.try_recv().unwrap().payload, b"one");
    assert_eq!(deliveries.try_recv().unwrap().payload, b"two");
    assert_eq!(deliveries.try_recv().unwrap().payload, b"three");
    assert_eq!(r1.resolver_stats().resolved, 1);
}

#[tokio::test]
async fn test_bidirectional_resolution() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &["2003::11"]).await;
    let mut r2 = start_router(&hub, 2, &["2003::22"]).await;
    let mut d1 = r1.take_deliveries().unwrap();
    let mut d2 = r2.take_deliveries().unwrap();

    r1.send_data(eid("2003::22"), b"ping".to_vec()).await.unwrap();
    r2.send_data(eid("2003::11"), b"pong".to_vec()).await.unwrap();
    settle(&mut [&mut r1, &mut r2]).await;

    assert_eq!(d2.try_recv().unwrap().payload, b"ping");
    assert_eq!(d1.try_recv().unwrap().payload, b"pong");
}

#[tokio::test]
async fn test_owner_restart_resolves_fresh_cycle() {
    let hub = MeshHub::new();
    let mut config = make_config(1);
    config.router.resolver.query_timeout_ms = 1000;
    config.router.resolver.max_retries = 0;
    let mut r1 = start_router_with(&hub, config).await;
    let mut r2 = start_router(&hub, 2, &["2003::aa"]).await;

    r2.stop().await.unwrap();

    r1.send_data(eid("2003::aa"), b"lost".to_vec()).await.unwrap();
    let t0 = lifecycle::unix_now_ms();
    r1.run_tick(t0 + 1_100).await;
    assert_eq!(r1.resolver_stats().exhausted, 1);

    // The owner comes back; a fresh cycle succeeds.
    r2.start().await.unwrap();
    let mut deliveries = r2.take_deliveries().unwrap();
    r1.send_data(eid("2003::aa"), b"found".to_vec())
        .await
        .unwrap();
    settle(&mut [&mut r1, &mut r2]).await;

    assert_eq!(deliveries.try_recv().unwrap().payload, b"found");
    assert_eq!(r1.resolver_stats().queries_sent, 2);
}
