//! End-to-end resolution over an in-memory mesh.

use super::*;
use crate::fabric::ReceivedDatagram;
use crate::protocol::MeshData;
use crate::resolver::Resolution;

#[tokio::test]
async fn test_query_answer_forward_deliver() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &[]).await;
    let mut r2 = start_router(&hub, 2, &["2003::aa"]).await;
    let mut deliveries = r2.take_deliveries().unwrap();

    r1.send_data(eid("2003::aa"), b"hello".to_vec())
        .await
        .unwrap();
    settle(&mut [&mut r1, &mut r2]).await;

    let got = deliveries.try_recv().unwrap();
    assert_eq!(got.dest, eid("2003::aa"));
    assert_eq!(got.src, rloc(1));
    assert_eq!(got.payload, b"hello");

    let stats = r1.resolver_stats();
    assert_eq!(stats.queries_sent, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(r1.stats().queued, 1);
    assert_eq!(r1.stats().forwarded, 1);
}

#[tokio::test]
async fn test_cached_binding_forwards_without_new_query() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &[]).await;
    let mut r2 = start_router(&hub, 2, &["2003::aa"]).await;
    let mut deliveries = r2.take_deliveries().unwrap();

    r1.send_data(eid("2003::aa"), b"first".to_vec())
        .await
        .unwrap();
    settle(&mut [&mut r1, &mut r2]).await;
    r1.send_data(eid("2003::aa"), b"again".to_vec())
        .await
        .unwrap();
    settle(&mut [&mut r1, &mut r2]).await;

    assert_eq!(r1.resolver_stats().queries_sent, 1);
    assert_eq!(r1.stats().forwarded, 2);

    assert_eq!(deliveries.try_recv().unwrap().payload, b"first");
    assert_eq!(deliveries.try_recv().unwrap().payload, b"again");
}

#[tokio::test]
async fn test_owner_answers_for_child_endpoint() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &[]).await;
    let mut r2 = start_router(&hub, 2, &[]).await;
    r2.register_child(child_id(5), vec![eid("2003::c5")], None)
        .await;
    // The registration announce reaches r1 but is not learned: nothing
    // there has asked about the endpoint.
    settle(&mut [&mut r1, &mut r2]).await;
    let mut deliveries = r2.take_deliveries().unwrap();

    r1.send_data(eid("2003::c5"), b"for the child".to_vec())
        .await
        .unwrap();
    settle(&mut [&mut r1, &mut r2]).await;

    let got = deliveries.try_recv().unwrap();
    assert_eq!(got.dest, eid("2003::c5"));
    assert_eq!(got.payload, b"for the child");

    // The learned locator is the child's, carried by its parent.
    match r1.resolver.resolve(eid("2003::c5"), lifecycle::unix_now_ms()) {
        Resolution::Deliver(locator) => assert_eq!(locator, child_rloc(2, 5)),
        other => panic!("expected bound locator, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transit_frame_queues_and_forwards() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &[]).await;
    let mut r2 = start_router(&hub, 2, &[]).await;
    let mut r3 = start_router(&hub, 3, &["2003::33"]).await;
    let mut deliveries = r3.take_deliveries().unwrap();

    // A frame in transit arrives at r2 for an endpoint it knows nothing
    // about; r2 must resolve before it can pass the frame on.
    let frame = MeshData::new(eid("2003::33"), b"through".to_vec()).encode();
    r2.process_datagram(ReceivedDatagram::new(rloc(1), frame))
        .await;
    settle(&mut [&mut r1, &mut r2, &mut r3]).await;

    let got = deliveries.try_recv().unwrap();
    assert_eq!(got.src, rloc(2));
    assert_eq!(got.payload, b"through");
    assert_eq!(r2.stats().queued, 1);
    assert_eq!(r2.stats().forwarded, 1);
}

#[tokio::test]
async fn test_local_destination_loops_back() {
    let hub = MeshHub::new();
    let mut r1 = start_router(&hub, 1, &["2003::1"]).await;
    let mut deliveries = r1.take_deliveries().unwrap();

    r1.send_data(eid("2003::1"), b"to self".to_vec())
        .await
        .unwrap();

    let got = deliveries.try_recv().unwrap();
    assert_eq!(got.dest, eid("2003::1"));
    assert_eq!(got.src, rloc(1));
    assert_eq!(r1.stats().delivered, 1);
    assert_eq!(r1.resolver_stats().queries_sent, 0);
}

#[tokio::test]
async fn test_send_before_start_refused() {
    let mut router = Router::new(make_config(1)).unwrap();
    let result = router.send_data(eid("2003::9"), vec![1]).await;
    assert!(matches!(result, Err(RouterError::NotStarted)));
}
