use super::*;
use crate::addr::ChildId;
use crate::fabric::MeshHub;

mod resolution;
mod scenarios;

pub(super) fn make_config(router_id: u8) -> Config {
    let mut config = Config::new();
    config.router.router_id = router_id;
    config
}

pub(super) fn eid(s: &str) -> Eid {
    s.parse().unwrap()
}

pub(super) fn rloc(router: u8) -> Rloc16 {
    Rloc16::from_u16((router as u16) << 10)
}

pub(super) fn child_rloc(router: u8, child: u16) -> Rloc16 {
    Rloc16::from_u16(((router as u16) << 10) | child)
}

pub(super) fn child_id(id: u16) -> ChildId {
    ChildId::new(id).unwrap()
}

/// Build a router attached to the hub, owning the given endpoints, and
/// start it.
pub(super) async fn start_router(hub: &MeshHub, router_id: u8, eids: &[&str]) -> Router {
    let mut config = make_config(router_id);
    config.router.eids = eids.iter().map(|s| s.to_string()).collect();
    start_router_with(hub, config).await
}

/// Build a router from an explicit config, attach it to the hub, and
/// start it.
pub(super) async fn start_router_with(hub: &MeshHub, config: Config) -> Router {
    let mut router = Router::new(config).unwrap();
    router.set_fabric(FabricHandle::Mem(hub.port(router.origin())));
    router.start().await.unwrap();
    router
}

/// Drain and process every datagram already sitting in the router's
/// channel. Returns how many were handled.
pub(super) async fn pump_once(router: &mut Router) -> usize {
    let Some(mut rx) = router.datagram_rx.take() else {
        return 0;
    };
    let mut handled = 0;
    while let Ok(dgram) = rx.try_recv() {
        router.process_datagram(dgram).await;
        handled += 1;
    }
    router.datagram_rx = Some(rx);
    handled
}

/// Pump routers round-robin until no datagrams remain anywhere.
pub(super) async fn settle(routers: &mut [&mut Router]) {
    loop {
        let mut handled = 0;
        for router in routers.iter_mut() {
            handled += pump_once(router).await;
        }
        if handled == 0 {
            break;
        }
    }
}
