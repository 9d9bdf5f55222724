//! Fabric configuration subsections.

use serde::{Deserialize, Serialize};

/// Default UDP bind address.
const DEFAULT_UDP_BIND_ADDR: &str = "127.0.0.1:0";

/// A statically mapped neighbor router (`fabric.udp.neighbors[]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborConfig {
    /// The neighbor's router id (`fabric.udp.neighbors[].router_id`).
    pub router_id: u8,
    /// The neighbor's UDP socket address (`fabric.udp.neighbors[].addr`).
    pub addr: String,
}

/// UDP fabric parameters (`fabric.udp.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpFabricConfig {
    /// Local socket address to bind (`fabric.udp.bind_addr`).
    #[serde(default = "UdpFabricConfig::default_bind_addr")]
    pub bind_addr: String,
    /// Static router-id to address map; the all-routers group is a fanout
    /// over this list (`fabric.udp.neighbors`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<NeighborConfig>,
}

impl Default for UdpFabricConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_UDP_BIND_ADDR.to_string(),
            neighbors: Vec::new(),
        }
    }
}

impl UdpFabricConfig {
    fn default_bind_addr() -> String { DEFAULT_UDP_BIND_ADDR.to_string() }
}

/// Fabric configuration (`fabric.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FabricConfig {
    /// UDP datagram fabric (`fabric.udp.*`).
    #[serde(default)]
    pub udp: UdpFabricConfig,
}
