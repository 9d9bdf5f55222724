//! Liveness tracking for peer routers and attached children.
//!
//! Peer routers are learned passively from received traffic; a router
//! silent past the reclaim horizon is presumed gone and its cached
//! bindings must go with it. Children register explicitly and are held
//! to a supervision timeout.

use crate::addr::{ChildId, Eid, RouterId};
use std::collections::HashMap;

/// Default silence after which a router id is considered reclaimed, in
/// seconds.
pub const DEFAULT_ROUTER_TIMEOUT_SECS: u64 = 580;

/// Default child supervision timeout in seconds.
pub const DEFAULT_CHILD_TIMEOUT_SECS: u64 = 240;

/// Peer routers heard on the fabric, by last contact.
#[derive(Debug)]
pub struct RouterSet {
    peers: HashMap<RouterId, u64>,
    timeout_ms: u64,
}

impl RouterSet {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            peers: HashMap::new(),
            timeout_ms,
        }
    }

    /// Record traffic from `router_id`. Returns true the first time the
    /// router is heard.
    pub fn note_heard(&mut self, router_id: RouterId, now_ms: u64) -> bool {
        self.peers.insert(router_id, now_ms).is_none()
    }

    /// Drop a router explicitly (departure event). Returns whether it was
    /// known.
    pub fn remove(&mut self, router_id: &RouterId) -> bool {
        self.peers.remove(router_id).is_some()
    }

    pub fn contains(&self, router_id: &RouterId) -> bool {
        self.peers.contains_key(router_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Remove routers silent past the reclaim horizon and return their
    /// ids so the caller can invalidate the bindings they owned.
    pub fn expire(&mut self, now_ms: u64) -> Vec<RouterId> {
        let expired: Vec<RouterId> = self
            .peers
            .iter()
            .filter(|(_, last_heard)| now_ms.saturating_sub(**last_heard) > self.timeout_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.peers.remove(id);
        }
        expired
    }
}

#[derive(Debug)]
struct Child {
    eids: Vec<Eid>,
    last_heard_ms: u64,
    timeout_ms: u64,
}

/// Children attached to this router, with their registered endpoint
/// identifiers and supervision deadlines.
#[derive(Debug)]
pub struct ChildTable {
    children: HashMap<ChildId, Child>,
    default_timeout_ms: u64,
}

impl ChildTable {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self {
            children: HashMap::new(),
            default_timeout_ms,
        }
    }

    /// Attach or re-attach a child, replacing any previous registration.
    /// `timeout_ms` overrides the table default for this child.
    pub fn register(
        &mut self,
        child_id: ChildId,
        eids: Vec<Eid>,
        timeout_ms: Option<u64>,
        now_ms: u64,
    ) {
        self.children.insert(
            child_id,
            Child {
                eids,
                last_heard_ms: now_ms,
                timeout_ms: timeout_ms.unwrap_or(self.default_timeout_ms),
            },
        );
    }

    /// Record supervision traffic from a child. Returns whether the child
    /// is attached.
    pub fn touch(&mut self, child_id: &ChildId, now_ms: u64) -> bool {
        match self.children.get_mut(child_id) {
            Some(child) => {
                child.last_heard_ms = now_ms;
                true
            }
            None => false,
        }
    }

    /// Detach a child explicitly. Returns whether it was attached.
    pub fn remove(&mut self, child_id: &ChildId) -> bool {
        self.children.remove(child_id).is_some()
    }

    pub fn contains(&self, child_id: &ChildId) -> bool {
        self.children.contains_key(child_id)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The child that registered `eid`, if any.
    pub fn owner_of(&self, eid: &Eid) -> Option<ChildId> {
        self.children
            .iter()
            .find(|(_, child)| child.eids.contains(eid))
            .map(|(id, _)| *id)
    }

    /// Endpoint identifiers registered by `child_id`.
    pub fn eids(&self, child_id: &ChildId) -> Option<&[Eid]> {
        self.children.get(child_id).map(|c| c.eids.as_slice())
    }

    /// Seconds since the child was last heard, the freshness token
    /// advertised when answering on the child's behalf.
    pub fn last_contact_secs(&self, child_id: &ChildId, now_ms: u64) -> Option<u32> {
        self.children
            .get(child_id)
            .map(|c| (now_ms.saturating_sub(c.last_heard_ms) / 1000) as u32)
    }

    /// Detach children silent past their supervision timeout and return
    /// their ids.
    pub fn expire(&mut self, now_ms: u64) -> Vec<ChildId> {
        let expired: Vec<ChildId> = self
            .children
            .iter()
            .filter(|(_, child)| now_ms.saturating_sub(child.last_heard_ms) > child.timeout_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.children.remove(id);
        }
        expired
    }
}
