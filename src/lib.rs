//! Weft: address resolution for low-power mesh routers.
//!
//! Endpoints keep stable identifiers while they move between routers.
//! Weft discovers which locator currently carries an endpoint, caches
//! the binding, queues traffic while a query is in flight, and tears
//! bindings down when the topology disproves them.

pub mod addr;
pub mod cache;
pub mod config;
pub mod fabric;
pub mod pending;
pub mod protocol;
pub mod resolver;
pub mod router;
pub mod topology;

// Re-export addressing types
pub use addr::{
    AddrError, ChildId, Eid, MeshPrefix, Rloc16, RouterId, ALL_ROUTERS_GROUP, MAX_CHILD_ID,
    MAX_ROUTER_ID,
};

// Re-export config types
pub use config::{
    BuffersConfig, ChildConfig, Config, ConfigError, FabricConfig, NeighborConfig, PendingConfig,
    ResolverConfig, RouterConfig, TopologyConfig, UdpFabricConfig,
};

// Re-export protocol types
pub use protocol::{
    AddressNotification, AddressQuery, MeshData, MeshMessage, ProtocolError, URI_ADDRESS_NOTIFY,
    URI_ADDRESS_QUERY,
};

// Re-export cache types
pub use cache::{CacheEntry, CacheStats, EidCache, EntryState};

// Re-export pending queue types
pub use pending::{Enqueue, PendingQueue, PendingStats};

// Re-export topology types
pub use topology::{ChildTable, RouterSet};

// Re-export resolver types
pub use resolver::{
    AddressResolver, NotifyOutcome, QueryEvent, RejectReason, Resolution, ResolverStats,
};

// Re-export fabric types
pub use fabric::{
    fabric_channel, Destination, FabricError, FabricHandle, FabricRx, FabricState, FabricTx,
    MemFabric, MeshHub, ReceivedDatagram, UdpFabric,
};

// Re-export router types
pub use router::{Delivery, DeliveryRx, DeliveryTx, Router, RouterError, RouterState, RouterStats};
