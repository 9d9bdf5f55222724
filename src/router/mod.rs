//! Mesh Router Entity
//!
//! Top-level structure representing a running mesh router. The Router
//! holds all state required for address resolution and forwarding: the
//! resolution engine, the peer router set, the child table, and the
//! fabric it speaks through.

mod handlers;
mod lifecycle;
#[cfg(test)]
mod tests;

use crate::addr::{AddrError, ChildId, Eid, MeshPrefix, Rloc16, RouterId};
use crate::config::Config;
use crate::fabric::{FabricError, FabricHandle, FabricRx};
use crate::protocol::AddressNotification;
use crate::resolver::{AddressResolver, ResolverStats};
use crate::topology::{ChildTable, RouterSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Errors related to router operations.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("router not started")]
    NotStarted,

    #[error("router already started")]
    AlreadyStarted,

    #[error("address error: {0}")]
    Addr(#[from] AddrError),

    #[error("fabric error: {0}")]
    Fabric(#[from] FabricError),
}

/// Router operational state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterState {
    /// Created but not started.
    Created,
    /// Starting up (bringing the fabric online).
    Starting,
    /// Fully operational.
    Running,
    /// Shutting down.
    Stopping,
    /// Stopped.
    Stopped,
}

impl RouterState {
    /// Check if the router is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, RouterState::Running)
    }

    /// Check if the router can be started.
    pub fn can_start(&self) -> bool {
        matches!(self, RouterState::Created | RouterState::Stopped)
    }

    /// Check if the router can be stopped.
    pub fn can_stop(&self) -> bool {
        matches!(self, RouterState::Running)
    }
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouterState::Created => "created",
            RouterState::Starting => "starting",
            RouterState::Running => "running",
            RouterState::Stopping => "stopping",
            RouterState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Local Delivery
// ============================================================================

/// A datagram that terminated at this router: addressed to one of its
/// own endpoints or to a registered child.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Destination endpoint.
    pub dest: Eid,
    /// Previous-hop router.
    pub src: Rloc16,
    /// Application payload.
    pub payload: Vec<u8>,
}

/// Channel sender for local deliveries.
pub type DeliveryTx = tokio::sync::mpsc::Sender<Delivery>;

/// Channel receiver for local deliveries.
pub type DeliveryRx = tokio::sync::mpsc::Receiver<Delivery>;

// ============================================================================
// Counters
// ============================================================================

/// Running counters over the forwarding plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Datagrams that terminated here.
    pub delivered: u64,
    /// Datagrams sent onward with a known locator.
    pub forwarded: u64,
    /// Datagrams parked awaiting resolution.
    pub queued: u64,
    /// Datagrams dropped on the forwarding path.
    pub dropped: u64,
}

/// A statically configured child, parsed and ready to register at start.
struct StaticChild {
    child_id: ChildId,
    eids: Vec<Eid>,
    timeout_secs: Option<u64>,
}

/// A running mesh router instance.
///
/// The router's locator is derived from its configured id. Everything it
/// knows about remote endpoints lives in the resolver; everything it
/// owns locally lives in `own_eids` and the child table, and those are
/// consulted first on every forwarding decision.
pub struct Router {
    // === Configuration ===
    /// Loaded configuration.
    config: Config,

    // === Identity ===
    /// This router's id.
    router_id: RouterId,
    /// This router's locator on the fabric.
    origin: Rloc16,
    /// Endpoints owned by the router itself.
    own_eids: Vec<Eid>,
    /// On-mesh prefixes bounding plausible endpoints.
    prefixes: Vec<MeshPrefix>,

    // === State ===
    /// Router operational state.
    state: RouterState,

    // === Resolution ===
    /// The address resolution engine.
    resolver: AddressResolver,

    // === Topology ===
    /// Peer routers heard from recently.
    routers: RouterSet,
    /// Directly attached children and their endpoints.
    children: ChildTable,
    /// Children from configuration, registered at start.
    static_children: Vec<StaticChild>,

    // === Fabric ===
    /// The fabric this router speaks through.
    fabric: Option<FabricHandle>,
    /// Datagram receiver (for the event loop).
    datagram_rx: Option<FabricRx>,

    // === Local Delivery ===
    /// Sender for datagrams that terminate here.
    deliver_tx: Option<DeliveryTx>,
    /// Receiver handed to the host via [`Router::take_deliveries`].
    deliver_rx: Option<DeliveryRx>,

    // === Counters ===
    /// Forwarding-plane counters.
    stats: RouterStats,
}

impl Router {
    /// Create a new router from configuration.
    pub fn new(config: Config) -> Result<Self, RouterError> {
        let router_id = RouterId::new(config.router.router_id)?;
        let origin = Rloc16::router(router_id);

        let own_eids = config
            .router
            .eids
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<Eid>, _>>()?;

        let prefixes = config
            .prefixes
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<MeshPrefix>, _>>()?;

        let mut static_children = Vec::new();
        for child in &config.children {
            let child_id = ChildId::new(child.child_id)?;
            let eids = child
                .eids
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<Eid>, _>>()?;
            static_children.push(StaticChild {
                child_id,
                eids,
                timeout_secs: child.timeout_secs,
            });
        }

        let resolver = AddressResolver::new(
            config.router.resolver.clone(),
            &config.router.pending,
            origin,
            prefixes.clone(),
        );
        let routers = RouterSet::new(config.router.topology.router_timeout_secs * 1000);
        let children = ChildTable::new(config.router.topology.child_timeout_secs * 1000);

        Ok(Self {
            config,
            router_id,
            origin,
            own_eids,
            prefixes,
            state: RouterState::Created,
            resolver,
            routers,
            children,
            static_children,
            fabric: None,
            datagram_rx: None,
            deliver_tx: None,
            deliver_rx: None,
            stats: RouterStats::default(),
        })
    }

    /// Replace the fabric that `start` would otherwise build from
    /// configuration. Only honored before the router is started.
    pub fn set_fabric(&mut self, fabric: FabricHandle) {
        self.fabric = Some(fabric);
    }

    // === Identity Accessors ===

    /// This router's id.
    pub fn router_id(&self) -> RouterId {
        self.router_id
    }

    /// This router's locator.
    pub fn origin(&self) -> Rloc16 {
        self.origin
    }

    /// Endpoints owned by the router itself.
    pub fn own_eids(&self) -> &[Eid] {
        &self.own_eids
    }

    // === Configuration ===

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // === State ===

    /// Get the router state.
    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Check if the router is operational.
    pub fn is_running(&self) -> bool {
        self.state.is_operational()
    }

    // === Counters ===

    /// Forwarding-plane counters.
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Resolution-engine counters.
    pub fn resolver_stats(&self) -> ResolverStats {
        self.resolver.stats()
    }

    /// Number of peer routers heard from recently.
    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    /// Number of registered children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    // === Local Delivery ===

    /// Take the delivery receiver. Datagrams addressed to this router's
    /// endpoints or its children arrive here once the router is started.
    pub fn take_deliveries(&mut self) -> Option<DeliveryRx> {
        self.deliver_rx.take()
    }

    // === Resolution ===

    /// Drop any binding held for `eid`. The next datagram for it opens a
    /// fresh query cycle.
    pub fn invalidate(&mut self, eid: &Eid) -> bool {
        self.resolver.invalidate(eid)
    }

    // === Topology Events ===

    /// Handle the explicit loss of a peer router: forget it and drop
    /// every binding its locators backed, ahead of any protocol timer.
    /// The next forwarding attempt for an affected endpoint opens a
    /// fresh query cycle. Returns how many bindings went.
    pub fn peer_departed(&mut self, router_id: RouterId) -> usize {
        self.routers.remove(&router_id);
        let affected = self.resolver.invalidate_for_router(router_id);
        if !affected.is_empty() {
            info!(
                router_id = %router_id,
                invalidated = affected.len(),
                "Peer router departed, bindings invalidated"
            );
        }
        affected.len()
    }

    // === Child Management ===

    /// Register a child and its endpoints, announcing the new bindings
    /// to the all-routers group so stale caches elsewhere roll over.
    ///
    /// Replaces any prior registration under the same id. `timeout_secs`
    /// overrides the configured supervision timeout.
    pub async fn register_child(
        &mut self,
        child_id: ChildId,
        eids: Vec<Eid>,
        timeout_secs: Option<u64>,
    ) {
        let now_ms = lifecycle::unix_now_ms();
        self.children.register(
            child_id,
            eids.clone(),
            timeout_secs.map(|s| s * 1000),
            now_ms,
        );
        info!(
            child_id = %child_id,
            eids = eids.len(),
            "Child registered"
        );

        let locator = Rloc16::child(self.router_id, child_id);
        for eid in &eids {
            self.announce_binding(AddressNotification::unsolicited(*eid, locator, 0))
                .await;
        }
    }

    /// Record a sign of life from a child, restarting its supervision
    /// timer. Returns false if the child is not registered.
    pub fn touch_child(&mut self, child_id: &ChildId) -> bool {
        self.children.touch(child_id, lifecycle::unix_now_ms())
    }

    /// Remove a child and its endpoint associations.
    pub fn remove_child(&mut self, child_id: &ChildId) -> bool {
        let removed = self.children.remove(child_id);
        if removed {
            debug!(child_id = %child_id, "Child removed");
        }
        removed
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("router_id", &self.router_id)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .field("own_eids", &self.own_eids.len())
            .field("children", &self.children.len())
            .field("routers", &self.routers.len())
            .finish()
    }
}
