//! UDP fabric.
//!
//! Carries mesh datagrams over UDP using a static neighbor map: each
//! peer router's locator is paired with a socket address from
//! configuration. The all-routers group fans out as unicast to every
//! mapped neighbor, and inbound datagrams are attributed by source
//! address. Datagrams from unmapped sources are dropped.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Destination, FabricError, FabricState, FabricTx, ReceivedDatagram};
use crate::addr::{Rloc16, RouterId};
use crate::config::UdpFabricConfig;

/// Largest datagram the receive loop will accept.
const MAX_DATAGRAM_SIZE: usize = 2048;

type RouteMap = Arc<Mutex<HashMap<Rloc16, SocketAddr>>>;
type SourceMap = Arc<Mutex<HashMap<SocketAddr, Rloc16>>>;

/// UDP fabric backed by a static neighbor map.
pub struct UdpFabric {
    bind_addr: SocketAddr,
    routes: RouteMap,
    sources: SourceMap,
    socket: Option<Arc<UdpSocket>>,
    local_addr: Option<SocketAddr>,
    state: FabricState,
    recv_task: Option<JoinHandle<()>>,
}

impl UdpFabric {
    /// Build a fabric from configuration, validating every address up front.
    pub fn from_config(config: &UdpFabricConfig) -> Result<Self, FabricError> {
        let bind_addr: SocketAddr = config
            .bind_addr
            .parse()
            .map_err(|_| FabricError::InvalidAddress(config.bind_addr.clone()))?;

        let mut routes = HashMap::new();
        let mut sources = HashMap::new();
        for neighbor in &config.neighbors {
            let router_id = RouterId::new(neighbor.router_id)
                .map_err(|e| FabricError::InvalidAddress(e.to_string()))?;
            let addr: SocketAddr = neighbor
                .addr
                .parse()
                .map_err(|_| FabricError::InvalidAddress(neighbor.addr.clone()))?;
            let rloc = Rloc16::router(router_id);
            routes.insert(rloc, addr);
            sources.insert(addr, rloc);
        }

        Ok(Self {
            bind_addr,
            routes: Arc::new(Mutex::new(routes)),
            sources: Arc::new(Mutex::new(sources)),
            socket: None,
            local_addr: None,
            state: FabricState::Configured,
            recv_task: None,
        })
    }

    /// Bind the socket and spawn the receive loop.
    pub async fn start(&mut self, tx: FabricTx) -> Result<(), FabricError> {
        if !self.state.can_start() {
            return Err(FabricError::AlreadyStarted);
        }
        self.state = FabricState::Starting;
        info!(bind_addr = %self.bind_addr, "Starting UDP fabric");

        let socket = match UdpSocket::bind(self.bind_addr).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                self.state = FabricState::Failed;
                return Err(FabricError::StartFailed(format!(
                    "failed to bind {}: {}",
                    self.bind_addr, e
                )));
            }
        };

        let local_addr = match socket.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.state = FabricState::Failed;
                return Err(FabricError::StartFailed(format!(
                    "failed to read local address: {}",
                    e
                )));
            }
        };
        self.local_addr = Some(local_addr);

        let recv_socket = socket.clone();
        let sources = self.sources.clone();
        let task = tokio::spawn(udp_receive_loop(recv_socket, sources, tx));

        self.socket = Some(socket);
        self.recv_task = Some(task);
        self.state = FabricState::Up;
        info!(local_addr = %local_addr, "UDP fabric up");
        Ok(())
    }

    /// Stop the receive loop and close the socket.
    pub async fn stop(&mut self) -> Result<(), FabricError> {
        if !self.state.is_operational() {
            return Err(FabricError::NotStarted);
        }

        if let Some(task) = self.recv_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.socket = None;
        self.state = FabricState::Down;
        info!("UDP fabric stopped");
        Ok(())
    }

    /// Send one datagram.
    ///
    /// Unicast to an unmapped locator is an error. The all-routers fanout
    /// is best effort: one unreachable neighbor does not stop the rest.
    pub async fn send(&self, dest: Destination, payload: &[u8]) -> Result<(), FabricError> {
        if !self.state.is_operational() {
            return Err(FabricError::NotStarted);
        }
        let socket = self.socket.as_ref().ok_or(FabricError::NotStarted)?;

        match dest {
            Destination::Unicast(rloc) => {
                // Child locators route to the parent router's address.
                let addr = {
                    let routes = self.routes.lock().await;
                    routes.get(&Rloc16::router(rloc.router_id())).copied()
                }
                .ok_or(FabricError::UnknownDestination(rloc))?;
                socket.send_to(payload, addr).await.map_err(|e| {
                    FabricError::SendFailed(format!("{} -> {}: {}", rloc, addr, e))
                })?;
            }
            Destination::AllRouters => {
                let targets: Vec<SocketAddr> = {
                    let routes = self.routes.lock().await;
                    routes.values().copied().collect()
                };
                for addr in targets {
                    if let Err(e) = socket.send_to(payload, addr).await {
                        warn!(addr = %addr, error = %e, "All-routers leg failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Add or replace a neighbor mapping. Takes effect immediately,
    /// including in the running receive loop.
    pub async fn add_neighbor(&self, rloc: Rloc16, addr: SocketAddr) {
        self.routes.lock().await.insert(rloc, addr);
        self.sources.lock().await.insert(addr, rloc);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FabricState {
        self.state
    }

    /// Bound socket address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Receive loop: attribute datagrams by source address and forward them
/// into the datagram channel.
async fn udp_receive_loop(socket: Arc<UdpSocket>, sources: SourceMap, tx: FabricTx) {
    debug!("UDP receive loop started");

    loop {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match socket.recv_from(&mut buf).await {
            Ok((len, src_addr)) => {
                buf.truncate(len);
                let src = {
                    let sources = sources.lock().await;
                    sources.get(&src_addr).copied()
                };
                let Some(src) = src else {
                    debug!(addr = %src_addr, "Datagram from unmapped source, dropping");
                    continue;
                };
                if tx.send(ReceivedDatagram::new(src, buf)).await.is_err() {
                    debug!("Datagram channel closed, stopping receive loop");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "UDP receive error");
            }
        }
    }
}
