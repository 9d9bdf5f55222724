//! Router configuration subsections.
//!
//! All the `router.*` parameters: the resolver's query cycle and cache
//! sizing, pending-packet queue bounds, topology timeouts, and internal
//! channel buffers, plus the static child registrations.

use serde::{Deserialize, Serialize};

/// Resolver parameters (`router.resolver.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Per-attempt answer deadline in ms (`router.resolver.query_timeout_ms`).
    #[serde(default = "ResolverConfig::default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Resends after the initial query before giving up (`router.resolver.max_retries`).
    #[serde(default = "ResolverConfig::default_max_retries")]
    pub max_retries: u32,
    /// Max simultaneously outstanding query cycles (`router.resolver.max_in_flight`).
    #[serde(default = "ResolverConfig::default_max_in_flight")]
    pub max_in_flight: usize,
    /// Max entries in the resolution cache (`router.resolver.cache_size`).
    #[serde(default = "ResolverConfig::default_cache_size")]
    pub cache_size: usize,
    /// Lifetime of a valid binding in seconds (`router.resolver.cache_lifetime_secs`).
    #[serde(default = "ResolverConfig::default_cache_lifetime_secs")]
    pub cache_lifetime_secs: u64,
    /// Accept unsolicited announcements for unknown endpoints
    /// (`router.resolver.learn_unsolicited`).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub learn_unsolicited: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 2000,
            max_retries: 3,
            max_in_flight: 16,
            cache_size: 256,
            cache_lifetime_secs: 300,
            learn_unsolicited: false,
        }
    }
}

impl ResolverConfig {
    fn default_query_timeout_ms() -> u64 { 2000 }
    fn default_max_retries() -> u32 { 3 }
    fn default_max_in_flight() -> usize { 16 }
    fn default_cache_size() -> usize { 256 }
    fn default_cache_lifetime_secs() -> u64 { 300 }
}

/// Pending-packet queue bounds (`router.pending.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Queue depth per endpoint awaiting resolution (`router.pending.per_eid_depth`).
    #[serde(default = "PendingConfig::default_per_eid_depth")]
    pub per_eid_depth: usize,
    /// Max distinct endpoints with parked packets (`router.pending.max_eids`).
    #[serde(default = "PendingConfig::default_max_eids")]
    pub max_eids: usize,
    /// Max age of a parked packet in ms (`router.pending.max_age_ms`).
    #[serde(default = "PendingConfig::default_max_age_ms")]
    pub max_age_ms: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            per_eid_depth: 8,
            max_eids: 64,
            max_age_ms: 8000,
        }
    }
}

impl PendingConfig {
    fn default_per_eid_depth() -> usize { 8 }
    fn default_max_eids() -> usize { 64 }
    fn default_max_age_ms() -> u64 { 8000 }
}

/// Topology timeouts (`router.topology.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Silence after which a peer router id is reclaimed in seconds
    /// (`router.topology.router_timeout_secs`).
    #[serde(default = "TopologyConfig::default_router_timeout_secs")]
    pub router_timeout_secs: u64,
    /// Child supervision timeout in seconds (`router.topology.child_timeout_secs`).
    #[serde(default = "TopologyConfig::default_child_timeout_secs")]
    pub child_timeout_secs: u64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            router_timeout_secs: 580,
            child_timeout_secs: 240,
        }
    }
}

impl TopologyConfig {
    fn default_router_timeout_secs() -> u64 { 580 }
    fn default_child_timeout_secs() -> u64 { 240 }
}

/// Internal buffers (`router.buffers.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuffersConfig {
    /// Fabric→Router datagram channel capacity (`router.buffers.fabric_channel`).
    #[serde(default = "BuffersConfig::default_fabric_channel")]
    pub fabric_channel: usize,
    /// Router→host delivery channel capacity (`router.buffers.deliver_channel`).
    #[serde(default = "BuffersConfig::default_deliver_channel")]
    pub deliver_channel: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            fabric_channel: 512,
            deliver_channel: 256,
        }
    }
}

impl BuffersConfig {
    fn default_fabric_channel() -> usize { 512 }
    fn default_deliver_channel() -> usize { 256 }
}

/// A statically registered child (`children[]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildConfig {
    /// Child index within this router's locator space (`children[].child_id`).
    pub child_id: u16,
    /// Endpoint identifiers the child registers (`children[].eids`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eids: Vec<String>,
    /// Supervision timeout override in seconds (`children[].timeout_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

// ============================================================================
// Router Configuration (Root)
// ============================================================================

/// Router configuration (`router.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// This router's id; the locator is `id << 10` (`router.router_id`).
    #[serde(default = "RouterConfig::default_router_id")]
    pub router_id: u8,

    /// Endpoint identifiers owned by the router itself (`router.eids`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eids: Vec<String>,

    /// Event loop maintenance tick period in seconds (`router.tick_interval_secs`).
    #[serde(default = "RouterConfig::default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Resolver parameters (`router.resolver.*`).
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Pending-packet queue bounds (`router.pending.*`).
    #[serde(default)]
    pub pending: PendingConfig,

    /// Topology timeouts (`router.topology.*`).
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Internal buffers (`router.buffers.*`).
    #[serde(default)]
    pub buffers: BuffersConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router_id: 1,
            eids: Vec::new(),
            tick_interval_secs: 1,
            resolver: ResolverConfig::default(),
            pending: PendingConfig::default(),
            topology: TopologyConfig::default(),
            buffers: BuffersConfig::default(),
        }
    }
}

impl RouterConfig {
    fn default_router_id() -> u8 { 1 }
    fn default_tick_interval_secs() -> u64 { 1 }
}
