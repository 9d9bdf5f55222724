//! In-memory fabric.
//!
//! A [`MeshHub`] connects any number of [`MemFabric`] ports by locator.
//! Datagrams hop between ports through channels, so multi-router
//! scenarios run in one process without sockets.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Destination, FabricError, FabricState, FabricTx, ReceivedDatagram};
use crate::addr::Rloc16;

/// Shared hub connecting in-memory fabric ports.
#[derive(Clone, Default)]
pub struct MeshHub {
    ports: Arc<Mutex<HashMap<Rloc16, FabricTx>>>,
}

impl MeshHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            ports: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a port on this hub for the given locator.
    ///
    /// The port joins the hub when started, not when created.
    pub fn port(&self, local: Rloc16) -> MemFabric {
        MemFabric {
            hub: self.clone(),
            local,
            state: FabricState::Configured,
        }
    }

    /// Number of attached ports.
    pub async fn attached(&self) -> usize {
        self.ports.lock().await.len()
    }

    async fn register(&self, local: Rloc16, tx: FabricTx) {
        self.ports.lock().await.insert(local, tx);
    }

    async fn unregister(&self, local: Rloc16) {
        self.ports.lock().await.remove(&local);
    }

    async fn dispatch(
        &self,
        src: Rloc16,
        dest: Destination,
        payload: &[u8],
    ) -> Result<(), FabricError> {
        // Clone the target senders out of the lock before awaiting sends.
        let targets: Vec<FabricTx> = {
            let ports = self.ports.lock().await;
            match dest {
                Destination::Unicast(rloc) => {
                    // A locator is carried by its router: child locators
                    // route to the parent router's port.
                    let port = Rloc16::router(rloc.router_id());
                    match ports.get(&port) {
                        Some(tx) => vec![tx.clone()],
                        None => return Err(FabricError::UnknownDestination(rloc)),
                    }
                }
                Destination::AllRouters => ports
                    .iter()
                    .filter(|(rloc, _)| **rloc != src)
                    .map(|(_, tx)| tx.clone())
                    .collect(),
            }
        };

        for tx in targets {
            // A closed port means its router is gone; the rest still get theirs.
            let _ = tx
                .send(ReceivedDatagram::new(src, payload.to_vec()))
                .await;
        }
        Ok(())
    }
}

/// One router's attachment point on a [`MeshHub`].
pub struct MemFabric {
    hub: MeshHub,
    local: Rloc16,
    state: FabricState,
}

impl MemFabric {
    /// Attach to the hub, delivering received datagrams into `tx`.
    pub async fn start(&mut self, tx: FabricTx) -> Result<(), FabricError> {
        if !self.state.can_start() {
            return Err(FabricError::AlreadyStarted);
        }
        self.hub.register(self.local, tx).await;
        self.state = FabricState::Up;
        debug!(local = %self.local, "Memory fabric port attached");
        Ok(())
    }

    /// Detach from the hub.
    pub async fn stop(&mut self) -> Result<(), FabricError> {
        if !self.state.is_operational() {
            return Err(FabricError::NotStarted);
        }
        self.hub.unregister(self.local).await;
        self.state = FabricState::Down;
        debug!(local = %self.local, "Memory fabric port detached");
        Ok(())
    }

    /// Send one datagram through the hub.
    pub async fn send(&self, dest: Destination, payload: &[u8]) -> Result<(), FabricError> {
        if !self.state.is_operational() {
            return Err(FabricError::NotStarted);
        }
        self.hub.dispatch(self.local, dest, payload).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FabricState {
        self.state
    }

    /// Locator this port answers to.
    pub fn local(&self) -> Rloc16 {
        self.local
    }
}
