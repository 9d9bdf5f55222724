//! The address resolver: query cycles, notification acceptance, and the
//! pending-packet queue, glued to the resolution cache.
//!
//! The resolver is synchronous state driven by two inputs: calls from the
//! forwarding path and the periodic deadline pump. It decides *what* to
//! send; the router around it owns the fabric and actually sends. That
//! split keeps every resolution rule testable with a logical clock.

use crate::addr::{Eid, MeshPrefix, Rloc16, RouterId, MAX_ROUTER_ID};
use crate::cache::{Applied, BeginCycle, CacheStats, EidCache, QueryAttempt};
use crate::config::{PendingConfig, ResolverConfig};
use crate::pending::{Enqueue, PendingQueue, PendingStats};
use crate::protocol::{AddressNotification, AddressQuery};

/// Outcome of a forwarding-path resolution attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Fresh binding; forward to this locator now.
    Deliver(Rloc16),
    /// A query cycle is outstanding; park the packet. `query` is present
    /// when this call opened the cycle and the query must be multicast.
    Pending { query: Option<AddressQuery> },
    /// No capacity for a new cycle; drop the packet fail-open.
    Refused,
}

/// Work produced by the deadline pump, for the router to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryEvent {
    /// Resend the cycle's query to the all-routers group.
    Resend(AddressQuery),
    /// Cycle gave up; entry and parked packets are gone.
    Exhausted { eid: Eid, dropped_packets: usize },
}

/// Why a notification was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Target outside every configured on-mesh prefix.
    ImplausibleTarget,
    /// Advertised locator names a reserved router id.
    ImplausibleLocator,
    /// Solicited answer for a different cycle than the outstanding one.
    MismatchedRequest,
    /// Solicited answer but no cycle is outstanding.
    NoOutstandingQuery,
    /// Conflicting announcement no fresher than the stored binding.
    NotFresher,
    /// Unsolicited announcement for an endpoint we never asked about.
    NoInterest,
    /// Arena had no room for a learned binding.
    NoCapacity,
}

/// Outcome of handling an address notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Binding accepted. Parked packets ride out to `locator`.
    Bound {
        locator: Rloc16,
        packets: Vec<Vec<u8>>,
    },
    /// Dropped without touching the cache.
    Rejected(RejectReason),
}

/// Running counters over resolver activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub queries_sent: u64,
    pub retries: u64,
    pub resolved: u64,
    pub exhausted: u64,
    pub rejected: u64,
    pub refused: u64,
}

/// Per-router resolution engine.
#[derive(Debug)]
pub struct AddressResolver {
    cache: EidCache,
    pending: PendingQueue,
    config: ResolverConfig,
    prefixes: Vec<MeshPrefix>,
    origin: Rloc16,
    stats: ResolverStats,
}

impl AddressResolver {
    /// Build a resolver answering as `origin`, trusting targets within
    /// `prefixes`.
    pub fn new(
        config: ResolverConfig,
        pending: &PendingConfig,
        origin: Rloc16,
        prefixes: Vec<MeshPrefix>,
    ) -> Self {
        let cache = EidCache::new(config.cache_size, config.cache_lifetime_secs * 1000);
        let queue = PendingQueue::new(pending.per_eid_depth, pending.max_eids, pending.max_age_ms);
        Self {
            cache,
            pending: queue,
            config,
            prefixes,
            origin,
            stats: ResolverStats::default(),
        }
    }

    /// Resolve `eid` for forwarding. Never blocks: either a locator is
    /// known now, or a cycle is (already) working on it, or the caller
    /// must drop.
    pub fn resolve(&mut self, eid: Eid, now_ms: u64) -> Resolution {
        if let Some(locator) = self.cache.lookup(&eid, now_ms) {
            return Resolution::Deliver(locator);
        }

        if let Some(entry) = self.cache.get(&eid)
            && entry.is_in_flight()
        {
            return Resolution::Pending { query: None };
        }

        if self.cache.in_flight_count() >= self.config.max_in_flight {
            self.stats.refused += 1;
            return Resolution::Refused;
        }

        let query = AddressQuery::generate(self.origin, eid);
        let attempt = QueryAttempt {
            request_id: query.request_id,
            sent_at_ms: now_ms,
            deadline_ms: now_ms + self.config.query_timeout_ms,
        };

        match self.cache.begin_cycle(eid, attempt, now_ms) {
            BeginCycle::Started => {
                self.stats.queries_sent += 1;
                Resolution::Pending { query: Some(query) }
            }
            BeginCycle::AlreadyInFlight => Resolution::Pending { query: None },
            BeginCycle::AlreadyValid(locator) => Resolution::Deliver(locator),
            BeginCycle::NoCapacity => {
                self.stats.refused += 1;
                Resolution::Refused
            }
        }
    }

    /// Park a packet for an endpoint with an outstanding cycle.
    pub fn enqueue_packet(&mut self, eid: Eid, payload: Vec<u8>, now_ms: u64) -> Enqueue {
        self.pending.enqueue(eid, payload, now_ms)
    }

    /// Apply an address notification to the cache, if it survives
    /// validation.
    ///
    /// Acceptance rules, in order: the target must fall inside a
    /// configured prefix and the locator must name a real router id.
    /// A solicited answer must match the outstanding cycle's request id.
    /// A conflicting announcement for a valid binding wins only with a
    /// strictly fresher contact claim. Unsolicited announcements for
    /// unknown endpoints are learned only when configured to.
    pub fn handle_notification(
        &mut self,
        notification: &AddressNotification,
        now_ms: u64,
    ) -> NotifyOutcome {
        if !self.is_plausible_target(&notification.target) {
            return self.reject(RejectReason::ImplausibleTarget);
        }
        if notification.locator.router_id().as_u8() > MAX_ROUTER_ID {
            return self.reject(RejectReason::ImplausibleLocator);
        }

        // An expired binding has no say in what gets accepted
        if let Some(entry) = self.cache.get(&notification.target)
            && entry.is_expired(now_ms)
        {
            self.cache.invalidate(&notification.target);
        }

        let allow_insert = match self.cache.get(&notification.target) {
            Some(entry) if entry.is_in_flight() => {
                if notification.is_solicited() {
                    let outstanding = entry.attempt().map(|a| a.request_id);
                    if outstanding != Some(notification.request_id) {
                        return self.reject(RejectReason::MismatchedRequest);
                    }
                }
                false
            }
            Some(entry) => {
                if entry.locator() == Some(notification.locator) {
                    // Same-locator refresh, solicited or not
                    false
                } else if notification.is_solicited() {
                    return self.reject(RejectReason::NoOutstandingQuery);
                } else {
                    let claimed_contact =
                        now_ms.saturating_sub(notification.last_contact_secs as u64 * 1000);
                    if claimed_contact <= entry.contact_at_ms() {
                        return self.reject(RejectReason::NotFresher);
                    }
                    false
                }
            }
            None => {
                if notification.is_solicited() {
                    return self.reject(RejectReason::NoOutstandingQuery);
                }
                if !self.config.learn_unsolicited {
                    return self.reject(RejectReason::NoInterest);
                }
                true
            }
        };

        match self.cache.apply_resolution(
            notification.target,
            notification.locator,
            notification.last_contact_secs,
            now_ms,
            allow_insert,
        ) {
            Applied::Updated | Applied::Inserted => {
                self.stats.resolved += 1;
                let packets = self.pending.drain(&notification.target, now_ms);
                NotifyOutcome::Bound {
                    locator: notification.locator,
                    packets,
                }
            }
            Applied::NoCapacity => self.reject(RejectReason::NoCapacity),
            Applied::NoEntry => self.reject(RejectReason::NoInterest),
        }
    }

    /// Scan outstanding cycles whose deadline passed: resend while
    /// retries remain, otherwise give up and drop the cycle with its
    /// parked packets.
    pub fn pump_timeouts(&mut self, now_ms: u64) -> Vec<QueryEvent> {
        let due = self.cache.due_attempts(now_ms);
        let mut events = Vec::with_capacity(due.len());

        for attempt in due {
            if attempt.retry_count < self.config.max_retries {
                let deadline_ms = now_ms + self.config.query_timeout_ms;
                if self
                    .cache
                    .record_resend(&attempt.eid, now_ms, deadline_ms)
                    .is_some()
                {
                    self.stats.retries += 1;
                    events.push(QueryEvent::Resend(AddressQuery::new(
                        attempt.request_id,
                        self.origin,
                        attempt.eid,
                    )));
                }
            } else {
                self.cache.invalidate(&attempt.eid);
                let dropped_packets = self.pending.discard(&attempt.eid);
                self.stats.exhausted += 1;
                events.push(QueryEvent::Exhausted {
                    eid: attempt.eid,
                    dropped_packets,
                });
            }
        }

        events
    }

    /// Drop the binding and parked packets for one endpoint.
    pub fn invalidate(&mut self, eid: &Eid) -> bool {
        self.pending.discard(eid);
        self.cache.invalidate(eid)
    }

    /// Drop every binding owned by `router_id` along with parked packets,
    /// effective immediately. Returns the affected endpoints.
    pub fn invalidate_for_router(&mut self, router_id: RouterId) -> Vec<Eid> {
        let affected = self.cache.invalidate_by_owner(router_id);
        for eid in &affected {
            self.pending.discard(eid);
        }
        affected
    }

    /// Drop valid bindings past their lifetime. Returns how many went.
    pub fn sweep_expired(&mut self, now_ms: u64) -> usize {
        self.cache.sweep_expired(now_ms)
    }

    /// Whether `eid` falls inside a configured on-mesh prefix.
    pub fn is_plausible_target(&self, eid: &Eid) -> bool {
        self.prefixes.iter().any(|prefix| prefix.matches(eid))
    }

    fn reject(&mut self, reason: RejectReason) -> NotifyOutcome {
        self.stats.rejected += 1;
        NotifyOutcome::Rejected(reason)
    }

    pub fn cache_stats(&self, now_ms: u64) -> CacheStats {
        self.cache.stats(now_ms)
    }

    pub fn pending_stats(&self) -> PendingStats {
        self.pending.stats()
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }
}
