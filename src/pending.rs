//! Packets parked while their destination resolves.
//!
//! Each endpoint with an outstanding query cycle gets one FIFO queue.
//! Both the per-endpoint depth and the number of distinct endpoints are
//! bounded, so a burst toward unresolvable destinations cannot pin
//! unbounded memory. Stale packets are filtered at drain time rather
//! than by a sweeper.

use crate::addr::Eid;
use std::collections::{HashMap, VecDeque};

/// Default packets held per endpoint.
pub const DEFAULT_PER_EID_DEPTH: usize = 8;

/// Default number of distinct endpoints with parked packets.
pub const DEFAULT_MAX_EIDS: usize = 64;

/// Default maximum age of a parked packet in milliseconds.
pub const DEFAULT_MAX_AGE_MS: u64 = 8000;

/// Outcome of parking a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueue {
    /// Parked normally.
    Queued,
    /// Queue was at depth; the oldest packet was dropped to admit this one.
    DisplacedOldest,
    /// Distinct-endpoint cap reached; the packet was dropped.
    Refused,
}

#[derive(Clone, Debug)]
struct PendingPacket {
    payload: Vec<u8>,
    queued_at_ms: u64,
}

/// Counters for drops and current occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub queued_eids: usize,
    pub total_packets: usize,
    pub dropped_displaced: u64,
    pub dropped_refused: u64,
    pub dropped_aged: u64,
    pub dropped_discarded: u64,
}

/// Bounded per-endpoint FIFO queues for packets awaiting resolution.
#[derive(Debug)]
pub struct PendingQueue {
    queues: HashMap<Eid, VecDeque<PendingPacket>>,
    per_eid_depth: usize,
    max_eids: usize,
    max_age_ms: u64,
    dropped_displaced: u64,
    dropped_refused: u64,
    dropped_aged: u64,
    dropped_discarded: u64,
}

impl PendingQueue {
    pub fn new(per_eid_depth: usize, max_eids: usize, max_age_ms: u64) -> Self {
        Self {
            queues: HashMap::new(),
            per_eid_depth,
            max_eids,
            max_age_ms,
            dropped_displaced: 0,
            dropped_refused: 0,
            dropped_aged: 0,
            dropped_discarded: 0,
        }
    }

    /// Park a packet until `eid` resolves. Newest wins within a queue;
    /// a new endpoint past the cap loses its packet outright.
    pub fn enqueue(&mut self, eid: Eid, payload: Vec<u8>, now_ms: u64) -> Enqueue {
        if !self.queues.contains_key(&eid) && self.queues.len() >= self.max_eids {
            self.dropped_refused += 1;
            return Enqueue::Refused;
        }

        let queue = self.queues.entry(eid).or_default();
        let mut outcome = Enqueue::Queued;
        if queue.len() >= self.per_eid_depth {
            queue.pop_front();
            self.dropped_displaced += 1;
            outcome = Enqueue::DisplacedOldest;
        }
        queue.push_back(PendingPacket {
            payload,
            queued_at_ms: now_ms,
        });
        outcome
    }

    /// Take every packet parked for `eid`, oldest first, dropping any
    /// that sat longer than the age bound. The queue itself is removed.
    pub fn drain(&mut self, eid: &Eid, now_ms: u64) -> Vec<Vec<u8>> {
        let Some(queue) = self.queues.remove(eid) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(queue.len());
        for packet in queue {
            if now_ms.saturating_sub(packet.queued_at_ms) > self.max_age_ms {
                self.dropped_aged += 1;
            } else {
                out.push(packet.payload);
            }
        }
        out
    }

    /// Drop everything parked for `eid`. Returns how many packets went.
    pub fn discard(&mut self, eid: &Eid) -> usize {
        let count = self.queues.remove(eid).map_or(0, |q| q.len());
        self.dropped_discarded += count as u64;
        count
    }

    /// Packets currently parked for `eid`.
    pub fn depth(&self, eid: &Eid) -> usize {
        self.queues.get(eid).map_or(0, |q| q.len())
    }

    /// Endpoints with at least one parked packet.
    pub fn queued_eids(&self) -> usize {
        self.queues.len()
    }

    /// Parked packets across all endpoints.
    pub fn total_packets(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn stats(&self) -> PendingStats {
        PendingStats {
            queued_eids: self.queues.len(),
            total_packets: self.total_packets(),
            dropped_displaced: self.dropped_displaced,
            dropped_refused: self.dropped_refused,
            dropped_aged: self.dropped_aged,
            dropped_discarded: self.dropped_discarded,
        }
    }
}
