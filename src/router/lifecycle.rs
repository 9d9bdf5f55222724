//! Router lifecycle management: start, stop, and the maintenance tick.

use super::{Router, RouterError, RouterState};
use crate::fabric::{Destination, FabricHandle, UdpFabric, fabric_channel};
use crate::protocol::URI_ADDRESS_QUERY;
use crate::resolver::QueryEvent;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Current wall clock in Unix milliseconds.
pub(crate) fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Router {
    // === State Transitions ===

    /// Start the router.
    ///
    /// Brings the fabric online, registers configured children (their
    /// bindings are announced once the fabric is up), and transitions to
    /// the Running state.
    pub async fn start(&mut self) -> Result<(), RouterError> {
        if !self.state.can_start() {
            return Err(RouterError::AlreadyStarted);
        }
        self.state = RouterState::Starting;

        // Delivery channel for datagrams that terminate here
        let (deliver_tx, deliver_rx) =
            tokio::sync::mpsc::channel(self.config.router.buffers.deliver_channel);
        self.deliver_tx = Some(deliver_tx);
        self.deliver_rx = Some(deliver_rx);

        // Datagram channel for fabric -> router
        let (fabric_tx, fabric_rx) = fabric_channel(self.config.router.buffers.fabric_channel);

        if self.fabric.is_none() {
            match UdpFabric::from_config(&self.config.fabric.udp) {
                Ok(udp) => self.fabric = Some(FabricHandle::Udp(udp)),
                Err(e) => {
                    self.state = RouterState::Stopped;
                    return Err(e.into());
                }
            }
        }
        if let Some(fabric) = self.fabric.as_mut()
            && let Err(e) = fabric.start(fabric_tx).await
        {
            self.state = RouterState::Stopped;
            return Err(e.into());
        }
        self.datagram_rx = Some(fabric_rx);

        for child in std::mem::take(&mut self.static_children) {
            self.register_child(child.child_id, child.eids, child.timeout_secs)
                .await;
        }

        self.state = RouterState::Running;
        info!("Router started:");
        info!("    locator: {}", self.origin);
        info!("   prefixes: {}", self.prefixes.len());
        info!("   children: {}", self.children.len());
        Ok(())
    }

    /// Stop the router.
    ///
    /// Takes the fabric offline and transitions to the Stopped state.
    /// Resolution and topology state survive a stop, so a restarted
    /// router picks up where it left off.
    pub async fn stop(&mut self) -> Result<(), RouterError> {
        if !self.state.can_stop() {
            return Err(RouterError::NotStarted);
        }
        self.state = RouterState::Stopping;
        info!(state = %self.state, "Router stopping");

        if let Some(fabric) = self.fabric.as_mut() {
            match fabric.stop().await {
                Ok(()) => debug!("Fabric stopped"),
                Err(e) => warn!(error = %e, "Fabric stop failed"),
            }
        }

        self.datagram_rx.take();
        self.deliver_tx.take();

        self.state = RouterState::Stopped;
        info!(state = %self.state, "Router stopped");
        Ok(())
    }

    // === Maintenance ===

    /// One maintenance pass: pump query deadlines, sweep expired
    /// bindings, and expire silent routers and children.
    pub(super) async fn run_tick(&mut self, now_ms: u64) {
        for event in self.resolver.pump_timeouts(now_ms) {
            match event {
                QueryEvent::Resend(query) => {
                    debug!(
                        target = %query.target,
                        request_id = query.request_id,
                        uri = URI_ADDRESS_QUERY,
                        "Retrying address query"
                    );
                    self.send_frame(Destination::AllRouters, &query.encode())
                        .await;
                }
                QueryEvent::Exhausted {
                    eid,
                    dropped_packets,
                } => {
                    warn!(
                        eid = %eid,
                        dropped = dropped_packets,
                        "Address query exhausted, endpoint unresolved"
                    );
                }
            }
        }

        let swept = self.resolver.sweep_expired(now_ms);
        if swept > 0 {
            debug!(swept, "Expired bindings swept");
        }

        for router_id in self.routers.expire(now_ms) {
            let invalidated = self.resolver.invalidate_for_router(router_id);
            warn!(
                router_id = %router_id,
                invalidated = invalidated.len(),
                "Router silent past deadline, bindings invalidated"
            );
        }

        for child_id in self.children.expire(now_ms) {
            info!(child_id = %child_id, "Child supervision lapsed, endpoints released");
        }
    }
}
