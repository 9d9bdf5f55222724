//! Mesh addressing primitives.
//!
//! Two address families coexist in the mesh: the stable, globally routable
//! endpoint identifier ([`Eid`]) that applications address, and the short
//! mesh-internal locator ([`Rloc16`]) that names a device's current
//! attachment point. An RLOC16 packs the attachment router's id in the top
//! six bits and a child index in the low ten; a router's own locator has a
//! zero child part. The whole point of address resolution is maintaining
//! the Eid -> Rloc16 mapping as devices move.

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use thiserror::Error;

/// Realm-local all-routers multicast group. Resolution queries are sent here.
pub const ALL_ROUTERS_GROUP: Ipv6Addr = Ipv6Addr::new(0xff03, 0, 0, 0, 0, 0, 0, 2);

/// Bit offset of the router id within an RLOC16.
const ROUTER_OFFSET: u16 = 10;

/// Highest assignable router id (63 is reserved).
pub const MAX_ROUTER_ID: u8 = 62;

/// Highest assignable child index (10 bits, 0 means the router itself).
pub const MAX_CHILD_ID: u16 = 0x3ff;

/// Errors from address construction and parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddrError {
    #[error("router id {0} out of range (max {MAX_ROUTER_ID})")]
    InvalidRouterId(u8),

    #[error("child id {0} out of range (1..={MAX_CHILD_ID})")]
    InvalidChildId(u16),

    #[error("invalid endpoint identifier: {0}")]
    InvalidEid(String),

    #[error("invalid mesh prefix: {0}")]
    InvalidPrefix(String),
}

/// Endpoint identifier: a device's stable, globally routable IPv6 address.
///
/// Stays fixed while the device moves through the mesh; resolution maps it
/// to the current [`Rloc16`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Eid(Ipv6Addr);

impl Eid {
    /// Create an Eid from an IPv6 address.
    pub const fn new(addr: Ipv6Addr) -> Self {
        Self(addr)
    }

    /// Create an Eid from raw octets (wire decoding).
    pub const fn from_octets(octets: [u8; 16]) -> Self {
        Self(Ipv6Addr::new(
            u16::from_be_bytes([octets[0], octets[1]]),
            u16::from_be_bytes([octets[2], octets[3]]),
            u16::from_be_bytes([octets[4], octets[5]]),
            u16::from_be_bytes([octets[6], octets[7]]),
            u16::from_be_bytes([octets[8], octets[9]]),
            u16::from_be_bytes([octets[10], octets[11]]),
            u16::from_be_bytes([octets[12], octets[13]]),
            u16::from_be_bytes([octets[14], octets[15]]),
        ))
    }

    /// Raw octets (wire encoding).
    pub const fn octets(&self) -> [u8; 16] {
        self.0.octets()
    }

    /// The underlying IPv6 address.
    pub const fn ip(&self) -> Ipv6Addr {
        self.0
    }
}

impl From<Ipv6Addr> for Eid {
    fn from(addr: Ipv6Addr) -> Self {
        Self(addr)
    }
}

impl FromStr for Eid {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: Ipv6Addr = s
            .parse()
            .map_err(|_| AddrError::InvalidEid(s.to_string()))?;
        Ok(Self(addr))
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eid({})", self.0)
    }
}

/// Identifier of a router within the mesh partition.
///
/// Assignable range is 0..=62; [`RouterId::new`] enforces it. Values decoded
/// from wire locators bypass the check (a reserved id simply never matches
/// any tracked router).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(u8);

impl RouterId {
    /// Create a validated router id.
    pub fn new(id: u8) -> Result<Self, AddrError> {
        if id > MAX_ROUTER_ID {
            return Err(AddrError::InvalidRouterId(id));
        }
        Ok(Self(id))
    }

    /// Raw value.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouterId({})", self.0)
    }
}

/// Index of a child device under its parent router (1..=1023).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildId(u16);

impl ChildId {
    /// Create a validated child id. Zero names the router itself and is
    /// rejected here.
    pub fn new(id: u16) -> Result<Self, AddrError> {
        if id == 0 || id > MAX_CHILD_ID {
            return Err(AddrError::InvalidChildId(id));
        }
        Ok(Self(id))
    }

    /// Raw value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChildId({})", self.0)
    }
}

/// Mesh-internal locator: router id in the top six bits, child index in the
/// low ten.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rloc16(u16);

impl Rloc16 {
    /// Locator of a router itself (zero child part).
    pub const fn router(router_id: RouterId) -> Self {
        Self((router_id.0 as u16) << ROUTER_OFFSET)
    }

    /// Locator of a child attached to `router_id`.
    pub const fn child(router_id: RouterId, child_id: ChildId) -> Self {
        Self(((router_id.0 as u16) << ROUTER_OFFSET) | child_id.0)
    }

    /// Decode from a raw wire value.
    pub const fn from_u16(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw wire value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// The router this locator hangs off. Every cache entry's owner is
    /// derived this way for bulk invalidation.
    pub const fn router_id(&self) -> RouterId {
        RouterId((self.0 >> ROUTER_OFFSET) as u8)
    }

    /// Child index, or `None` for a router's own locator.
    pub const fn child_id(&self) -> Option<ChildId> {
        let child = self.0 & MAX_CHILD_ID;
        if child == 0 { None } else { Some(ChildId(child)) }
    }

    /// True when this locator names a router rather than a child.
    pub const fn is_router(&self) -> bool {
        self.0 & MAX_CHILD_ID == 0
    }
}

impl fmt::Display for Rloc16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl fmt::Debug for Rloc16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rloc16({:#06x})", self.0)
    }
}

/// An on-mesh IPv6 prefix, used to judge whether a claimed endpoint
/// identifier plausibly belongs to this network.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MeshPrefix {
    addr: Ipv6Addr,
    len: u8,
}

impl MeshPrefix {
    /// Build a prefix from an address and a length in bits.
    pub fn new(addr: Ipv6Addr, len: u8) -> Result<Self, AddrError> {
        if len > 128 {
            return Err(AddrError::InvalidPrefix(format!("{}/{}", addr, len)));
        }
        Ok(Self { addr, len })
    }

    /// Prefix length in bits.
    pub const fn len(&self) -> u8 {
        self.len
    }

    /// Whether `eid` falls inside this prefix.
    pub fn matches(&self, eid: &Eid) -> bool {
        let ours = self.addr.octets();
        let theirs = eid.octets();
        let whole = (self.len / 8) as usize;
        if ours[..whole] != theirs[..whole] {
            return false;
        }
        let rem = self.len % 8;
        if rem == 0 {
            return true;
        }
        let mask = 0xffu8 << (8 - rem);
        (ours[whole] & mask) == (theirs[whole] & mask)
    }
}

impl FromStr for MeshPrefix {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| AddrError::InvalidPrefix(s.to_string()))?;
        let addr: Ipv6Addr = addr
            .parse()
            .map_err(|_| AddrError::InvalidPrefix(s.to_string()))?;
        let len: u8 = len
            .parse()
            .map_err(|_| AddrError::InvalidPrefix(s.to_string()))?;
        Self::new(addr, len)
    }
}

impl fmt::Display for MeshPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl fmt::Debug for MeshPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeshPrefix({}/{})", self.addr, self.len)
    }
}
