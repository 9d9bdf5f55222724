//! Datagram fabric between mesh routers.
//!
//! The fabric moves opaque datagrams between router locators: unicast to
//! one locator, or multicast to the realm-local all-routers group. Two
//! implementations share one handle type: an in-memory hub for tests and
//! simulations, and a UDP fabric with a static neighbor map.

pub mod mem;
pub mod udp;

use crate::addr::Rloc16;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use mem::{MemFabric, MeshHub};
pub use udp::UdpFabric;

// ============================================================================
// Datagram Channel Types
// ============================================================================

/// A datagram received from the fabric.
#[derive(Clone, Debug)]
pub struct ReceivedDatagram {
    /// Locator of the sending router.
    pub src: Rloc16,
    /// Raw frame.
    pub payload: Vec<u8>,
    /// Receipt timestamp (Unix milliseconds).
    pub timestamp_ms: u64,
}

impl ReceivedDatagram {
    /// Create a received datagram with the current timestamp.
    pub fn new(src: Rloc16, payload: Vec<u8>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            src,
            payload,
            timestamp_ms,
        }
    }

    /// Create a received datagram with an explicit timestamp.
    pub fn with_timestamp(src: Rloc16, payload: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            src,
            payload,
            timestamp_ms,
        }
    }
}

/// Channel sender for received datagrams.
pub type FabricTx = tokio::sync::mpsc::Sender<ReceivedDatagram>;

/// Channel receiver for received datagrams.
pub type FabricRx = tokio::sync::mpsc::Receiver<ReceivedDatagram>;

/// Create a datagram channel with the given buffer size.
pub fn fabric_channel(buffer: usize) -> (FabricTx, FabricRx) {
    tokio::sync::mpsc::channel(buffer)
}

// ============================================================================
// Destinations
// ============================================================================

/// Where a datagram goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    /// One router, by locator.
    Unicast(Rloc16),
    /// Every router in the realm-local all-routers group.
    AllRouters,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Unicast(rloc) => write!(f, "{}", rloc),
            Destination::AllRouters => write!(f, "all-routers"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors related to fabric operations.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("fabric not started")]
    NotStarted,

    #[error("fabric already started")]
    AlreadyStarted,

    #[error("fabric failed to start: {0}")]
    StartFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("no route to {0}")]
    UnknownDestination(Rloc16),

    #[error("invalid fabric address: {0}")]
    InvalidAddress(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Fabric State
// ============================================================================

/// Fabric lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FabricState {
    /// Configured but not started.
    Configured,
    /// Initialization in progress.
    Starting,
    /// Moving datagrams.
    Up,
    /// Was up, now stopped.
    Down,
    /// Failed to start.
    Failed,
}

impl FabricState {
    /// Check if the fabric is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, FabricState::Up)
    }

    /// Check if the fabric can be started.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            FabricState::Configured | FabricState::Down | FabricState::Failed
        )
    }
}

impl fmt::Display for FabricState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FabricState::Configured => "configured",
            FabricState::Starting => "starting",
            FabricState::Up => "up",
            FabricState::Down => "down",
            FabricState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Fabric Handle
// ============================================================================

/// A started-or-startable fabric, dispatched by variant.
pub enum FabricHandle {
    /// In-memory hub fabric.
    Mem(MemFabric),
    /// UDP fabric with a static neighbor map.
    Udp(UdpFabric),
}

impl FabricHandle {
    /// Start the fabric, delivering received datagrams into `tx`.
    pub async fn start(&mut self, tx: FabricTx) -> Result<(), FabricError> {
        match self {
            FabricHandle::Mem(fabric) => fabric.start(tx).await,
            FabricHandle::Udp(fabric) => fabric.start(tx).await,
        }
    }

    /// Stop the fabric.
    pub async fn stop(&mut self) -> Result<(), FabricError> {
        match self {
            FabricHandle::Mem(fabric) => fabric.stop().await,
            FabricHandle::Udp(fabric) => fabric.stop().await,
        }
    }

    /// Send one datagram.
    pub async fn send(&self, dest: Destination, payload: &[u8]) -> Result<(), FabricError> {
        match self {
            FabricHandle::Mem(fabric) => fabric.send(dest, payload).await,
            FabricHandle::Udp(fabric) => fabric.send(dest, payload).await,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FabricState {
        match self {
            FabricHandle::Mem(fabric) => fabric.state(),
            FabricHandle::Udp(fabric) => fabric.state(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
