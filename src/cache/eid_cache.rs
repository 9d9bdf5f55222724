//! Endpoint-to-locator resolution cache.
//!
//! One arena per router, keyed by endpoint identifier. Entries move
//! through the query cycle states or sit valid until their lifetime runs
//! out; topology hooks rip entries out regardless of age. The cache is
//! pure state: callers supply the clock and act on returned outcomes, so
//! every path is deterministic under test.

use super::entry::{CacheEntry, EntryState, QueryAttempt};
use super::CacheStats;
use crate::addr::{Eid, Rloc16, RouterId};
use std::collections::HashMap;

/// Outcome of starting a resolution cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeginCycle {
    /// New cycle created; the caller must send the query.
    Started,
    /// A cycle is already outstanding; attach, send nothing.
    AlreadyInFlight,
    /// A fresh binding exists; no query is warranted.
    AlreadyValid(Rloc16),
    /// Arena full of unevictable entries; resolution refused.
    NoCapacity,
}

/// Outcome of applying an accepted binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// An existing entry transitioned to `Valid`.
    Updated,
    /// A new valid entry was inserted (unsolicited learning).
    Inserted,
    /// No entry and insertion was not allowed.
    NoEntry,
    /// No entry and the arena had no room.
    NoCapacity,
}

/// An outstanding cycle whose deadline has passed.
#[derive(Clone, Copy, Debug)]
pub struct DueAttempt {
    pub eid: Eid,
    pub request_id: u64,
    pub retry_count: u32,
}

/// The per-router resolution cache.
#[derive(Clone, Debug)]
pub struct EidCache {
    entries: HashMap<Eid, CacheEntry>,
    max_entries: usize,
    lifetime_ms: u64,
}

impl EidCache {
    /// Create a cache bounded to `max_entries`, with valid bindings living
    /// `lifetime_ms` between refreshes.
    pub fn new(max_entries: usize, lifetime_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            lifetime_ms,
        }
    }

    /// Locator of a valid, unexpired binding. Expired bindings are removed
    /// on the way out; in-flight entries report not found.
    pub fn lookup(&mut self, eid: &Eid, now_ms: u64) -> Option<Rloc16> {
        let expired = match self.entries.get(eid) {
            Some(entry) => entry.is_expired(now_ms),
            None => return None,
        };
        if expired {
            self.entries.remove(eid);
            return None;
        }

        let entry = self.entries.get_mut(eid)?;
        let locator = entry.locator()?;
        entry.touch(now_ms);
        Some(locator)
    }

    /// Read-only view of an entry.
    pub fn get(&self, eid: &Eid) -> Option<&CacheEntry> {
        self.entries.get(eid)
    }

    /// Start (or attach to) a resolution cycle for `eid`.
    ///
    /// Idempotent while a cycle is outstanding: a second call attaches to
    /// the existing attempt instead of creating a duplicate query.
    pub fn begin_cycle(&mut self, eid: Eid, attempt: QueryAttempt, now_ms: u64) -> BeginCycle {
        if let Some(entry) = self.entries.get_mut(&eid) {
            if entry.is_in_flight() {
                return BeginCycle::AlreadyInFlight;
            }
            if !entry.is_expired(now_ms)
                && let Some(locator) = entry.locator()
            {
                entry.touch(now_ms);
                return BeginCycle::AlreadyValid(locator);
            }
            // Expired binding: replace with a fresh cycle
            self.entries.remove(&eid);
        }

        if self.entries.len() >= self.max_entries && !self.evict_one(now_ms) {
            return BeginCycle::NoCapacity;
        }

        self.entries.insert(eid, CacheEntry::querying(attempt, now_ms));
        BeginCycle::Started
    }

    /// Record a resend of the outstanding cycle. Returns the new retry
    /// count, or `None` when no cycle is outstanding.
    pub fn record_resend(&mut self, eid: &Eid, now_ms: u64, deadline_ms: u64) -> Option<u32> {
        let entry = self.entries.get_mut(eid)?;
        if !entry.is_in_flight() {
            return None;
        }
        Some(entry.record_resend(now_ms, deadline_ms))
    }

    /// Apply an accepted binding. Transitions an existing entry to `Valid`
    /// (resetting its cycle) or, with `allow_insert`, installs a new one.
    pub fn apply_resolution(
        &mut self,
        eid: Eid,
        locator: Rloc16,
        last_contact_secs: u32,
        now_ms: u64,
        allow_insert: bool,
    ) -> Applied {
        if let Some(entry) = self.entries.get_mut(&eid) {
            entry.bind(locator, last_contact_secs, now_ms, self.lifetime_ms);
            return Applied::Updated;
        }

        if !allow_insert {
            return Applied::NoEntry;
        }
        if self.entries.len() >= self.max_entries && !self.evict_one(now_ms) {
            return Applied::NoCapacity;
        }

        self.entries.insert(
            eid,
            CacheEntry::valid(locator, last_contact_secs, now_ms, self.lifetime_ms),
        );
        Applied::Inserted
    }

    /// Remove one entry unconditionally. Returns whether it existed.
    pub fn invalidate(&mut self, eid: &Eid) -> bool {
        self.entries.remove(eid).is_some()
    }

    /// Remove every entry whose locator belongs to `router_id`, regardless
    /// of state or remaining lifetime. Returns the removed endpoints so
    /// the caller can discard their pending queues.
    ///
    /// In-flight entries carry no locator yet and are untouched; their
    /// cycles stand and may be answered by the endpoint's next owner.
    pub fn invalidate_by_owner(&mut self, router_id: RouterId) -> Vec<Eid> {
        let affected: Vec<Eid> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.owner_router_id() == Some(router_id))
            .map(|(eid, _)| *eid)
            .collect();
        for eid in &affected {
            self.entries.remove(eid);
        }
        affected
    }

    /// Drop bindings that outlived the cache lifetime. Returns how many
    /// were removed. Called from the maintenance tick, not per packet.
    pub fn sweep_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - self.entries.len()
    }

    /// Outstanding cycles whose deadline has passed, for the retry pump.
    pub fn due_attempts(&self, now_ms: u64) -> Vec<DueAttempt> {
        self.entries
            .iter()
            .filter_map(|(eid, entry)| {
                let attempt = entry.attempt()?;
                if attempt.deadline_ms <= now_ms {
                    Some(DueAttempt {
                        eid: *eid,
                        request_id: attempt.request_id,
                        retry_count: entry.retry_count(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Number of entries with an outstanding cycle.
    pub fn in_flight_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_in_flight()).count()
    }

    /// Total entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of cache occupancy.
    pub fn stats(&self, now_ms: u64) -> CacheStats {
        let mut valid = 0;
        let mut in_flight = 0;
        let mut expired = 0;
        let mut total_age_ms: u64 = 0;

        for entry in self.entries.values() {
            if entry.is_in_flight() {
                in_flight += 1;
            } else if entry.is_expired(now_ms) {
                expired += 1;
            } else {
                valid += 1;
            }
            total_age_ms += now_ms.saturating_sub(entry.created_at_ms());
        }

        let avg_age_ms = if self.entries.is_empty() {
            0
        } else {
            total_age_ms / self.entries.len() as u64
        };

        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            valid,
            in_flight,
            expired,
            avg_age_ms,
        }
    }

    /// Make room for one insertion: drop an expired binding if any exists,
    /// else the least-recently-used valid binding. In-flight entries are
    /// never evicted (their queues and cycles would be orphaned).
    fn evict_one(&mut self, now_ms: u64) -> bool {
        if let Some(eid) = self
            .entries
            .iter()
            .find(|(_, entry)| entry.is_expired(now_ms))
            .map(|(eid, _)| *eid)
        {
            self.entries.remove(&eid);
            return true;
        }

        let victim = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state() == EntryState::Valid)
            .max_by_key(|(_, entry)| entry.idle_time(now_ms))
            .map(|(eid, _)| *eid);

        match victim {
            Some(eid) => {
                self.entries.remove(&eid);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_eid(val: u8) -> Eid {
        let mut octets = [0u8; 16];
        octets[0] = 0x20;
        octets[1] = 0x03;
        octets[15] = val;
        Eid::from_octets(octets)
    }

    fn make_rloc(router: u8) -> Rloc16 {
        Rloc16::from_u16((router as u16) << 10)
    }

    fn make_attempt(request_id: u64, now_ms: u64) -> QueryAttempt {
        QueryAttempt {
            request_id,
            sent_at_ms: now_ms,
            deadline_ms: now_ms + 2000,
        }
    }

    fn make_cache() -> EidCache {
        EidCache::new(8, 10_000)
    }

    #[test]
    fn test_lookup_empty() {
        let mut cache = make_cache();
        assert_eq!(cache.lookup(&make_eid(1), 0), None);
    }

    #[test]
    fn test_begin_cycle_is_idempotent() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        assert_eq!(
            cache.begin_cycle(eid, make_attempt(40, 1000), 1000),
            BeginCycle::Started
        );
        // Second attempt attaches, never starts a duplicate query
        assert_eq!(
            cache.begin_cycle(eid, make_attempt(41, 1500), 1500),
            BeginCycle::AlreadyInFlight
        );

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&eid).unwrap().attempt().unwrap().request_id, 40);
    }

    #[test]
    fn test_begin_cycle_on_valid_entry() {
        let mut cache = make_cache();
        let eid = make_eid(1);
        let rloc = make_rloc(4);

        cache.apply_resolution(eid, rloc, 0, 1000, true);

        assert_eq!(
            cache.begin_cycle(eid, make_attempt(50, 2000), 2000),
            BeginCycle::AlreadyValid(rloc)
        );
    }

    #[test]
    fn test_begin_cycle_replaces_expired_binding() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        cache.apply_resolution(eid, make_rloc(4), 0, 1000, true);

        // Past the 10s lifetime the binding is dead; a new cycle starts
        // with a reset send count.
        assert_eq!(
            cache.begin_cycle(eid, make_attempt(51, 12_000), 12_000),
            BeginCycle::Started
        );
        let entry = cache.get(&eid).unwrap();
        assert_eq!(entry.state(), EntryState::Querying);
        assert_eq!(entry.retry_count(), 0);
    }

    #[test]
    fn test_lookup_in_flight_reports_not_found() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        cache.begin_cycle(eid, make_attempt(1, 1000), 1000);

        assert_eq!(cache.lookup(&eid, 1500), None);
        // The entry is still there, just unresolved
        assert!(cache.get(&eid).is_some());
    }

    #[test]
    fn test_lookup_removes_expired_binding() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        cache.apply_resolution(eid, make_rloc(4), 0, 1000, true);
        assert_eq!(cache.lookup(&eid, 5000), Some(make_rloc(4)));

        assert_eq!(cache.lookup(&eid, 11_001), None);
        assert!(cache.get(&eid).is_none());
    }

    #[test]
    fn test_apply_resolution_resolves_cycle() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        cache.begin_cycle(eid, make_attempt(7, 1000), 1000);
        cache.record_resend(&eid, 3000, 5000);

        let applied = cache.apply_resolution(eid, make_rloc(6), 3, 4000, false);

        assert_eq!(applied, Applied::Updated);
        let entry = cache.get(&eid).unwrap();
        assert_eq!(entry.state(), EntryState::Valid);
        assert_eq!(entry.locator(), Some(make_rloc(6)));
        assert_eq!(entry.retry_count(), 0);
        assert_eq!(cache.lookup(&eid, 4100), Some(make_rloc(6)));
    }

    #[test]
    fn test_apply_resolution_insert_gate() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        assert_eq!(
            cache.apply_resolution(eid, make_rloc(6), 0, 1000, false),
            Applied::NoEntry
        );
        assert!(cache.is_empty());

        assert_eq!(
            cache.apply_resolution(eid, make_rloc(6), 0, 1000, true),
            Applied::Inserted
        );
        assert_eq!(cache.lookup(&eid, 1100), Some(make_rloc(6)));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        cache.apply_resolution(eid, make_rloc(6), 0, 1000, true);
        assert!(cache.invalidate(&eid));
        assert!(!cache.invalidate(&eid));
        assert_eq!(cache.lookup(&eid, 1100), None);
    }

    #[test]
    fn test_invalidate_by_owner() {
        let mut cache = make_cache();
        let owner = RouterId::new(4).unwrap();

        cache.apply_resolution(make_eid(1), make_rloc(4), 0, 1000, true);
        cache.apply_resolution(make_eid(2), Rloc16::from_u16((4 << 10) | 9), 0, 1000, true);
        cache.apply_resolution(make_eid(3), make_rloc(5), 0, 1000, true);
        cache.begin_cycle(make_eid(4), make_attempt(9, 1000), 1000);

        let mut removed = cache.invalidate_by_owner(owner);
        removed.sort();

        assert_eq!(removed, vec![make_eid(1), make_eid(2)]);
        assert_eq!(cache.lookup(&make_eid(1), 1100), None);
        assert_eq!(cache.lookup(&make_eid(2), 1100), None);
        // Other owners and in-flight cycles are untouched
        assert_eq!(cache.lookup(&make_eid(3), 1100), Some(make_rloc(5)));
        assert!(cache.get(&make_eid(4)).unwrap().is_in_flight());
    }

    #[test]
    fn test_invalidate_by_owner_ignores_lifetime() {
        let mut cache = make_cache();

        cache.apply_resolution(make_eid(1), make_rloc(4), 0, 1000, true);

        // Well within lifetime, removal is still immediate
        let removed = cache.invalidate_by_owner(RouterId::new(4).unwrap());
        assert_eq!(removed.len(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_expired() {
        let mut cache = make_cache();

        cache.apply_resolution(make_eid(1), make_rloc(4), 0, 1000, true);
        cache.apply_resolution(make_eid(2), make_rloc(5), 0, 8000, true);
        cache.begin_cycle(make_eid(3), make_attempt(2, 1000), 1000);

        // At 12s the first binding (expires 11s) is out, the second
        // (expires 18s) and the in-flight cycle stay.
        assert_eq!(cache.sweep_expired(12_000), 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&make_eid(1)).is_none());
        assert!(cache.get(&make_eid(2)).is_some());
        assert!(cache.get(&make_eid(3)).is_some());
    }

    #[test]
    fn test_due_attempts() {
        let mut cache = make_cache();

        cache.begin_cycle(make_eid(1), make_attempt(10, 1000), 1000); // deadline 3000
        cache.begin_cycle(make_eid(2), make_attempt(20, 2500), 2500); // deadline 4500
        cache.apply_resolution(make_eid(3), make_rloc(4), 0, 1000, true);

        let due = cache.due_attempts(3000);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].eid, make_eid(1));
        assert_eq!(due[0].request_id, 10);
        assert_eq!(due[0].retry_count, 0);

        assert_eq!(cache.due_attempts(5000).len(), 2);
    }

    #[test]
    fn test_record_resend() {
        let mut cache = make_cache();
        let eid = make_eid(1);

        cache.begin_cycle(eid, make_attempt(10, 1000), 1000);

        assert_eq!(cache.record_resend(&eid, 3000, 5000), Some(1));
        let entry = cache.get(&eid).unwrap();
        assert_eq!(entry.state(), EntryState::Retrying);
        assert_eq!(entry.attempt().unwrap().deadline_ms, 5000);

        // Nothing outstanding for an unknown endpoint
        assert_eq!(cache.record_resend(&make_eid(9), 3000, 5000), None);
    }

    #[test]
    fn test_eviction_prefers_expired_then_lru() {
        let mut cache = EidCache::new(3, 10_000);

        cache.apply_resolution(make_eid(1), make_rloc(1), 0, 1000, true); // expires 11_000
        cache.apply_resolution(make_eid(2), make_rloc(2), 0, 5000, true);
        cache.apply_resolution(make_eid(3), make_rloc(3), 0, 6000, true);

        // Entry 1 is expired at 12_000, so it goes first
        assert_eq!(
            cache.apply_resolution(make_eid(4), make_rloc(4), 0, 12_000, true),
            Applied::Inserted
        );
        assert!(cache.get(&make_eid(1)).is_none());

        // All fresh now; the least recently used goes next
        cache.lookup(&make_eid(2), 13_000);
        cache.lookup(&make_eid(4), 13_500);
        assert_eq!(
            cache.apply_resolution(make_eid(5), make_rloc(5), 0, 14_000, true),
            Applied::Inserted
        );
        assert!(cache.get(&make_eid(3)).is_none());
        assert!(cache.get(&make_eid(2)).is_some());
    }

    #[test]
    fn test_no_capacity_when_all_in_flight() {
        let mut cache = EidCache::new(2, 10_000);

        cache.begin_cycle(make_eid(1), make_attempt(1, 1000), 1000);
        cache.begin_cycle(make_eid(2), make_attempt(2, 1000), 1000);

        // In-flight entries are not evictable
        assert_eq!(
            cache.begin_cycle(make_eid(3), make_attempt(3, 1000), 1000),
            BeginCycle::NoCapacity
        );
        assert_eq!(
            cache.apply_resolution(make_eid(4), make_rloc(4), 0, 1000, true),
            Applied::NoCapacity
        );
    }

    #[test]
    fn test_stats() {
        let mut cache = make_cache();

        cache.apply_resolution(make_eid(1), make_rloc(1), 0, 1000, true);
        cache.begin_cycle(make_eid(2), make_attempt(1, 2000), 2000);

        let stats = cache.stats(3000);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.max_entries, 8);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.avg_age_ms, (2000 + 1000) / 2);
    }
}
