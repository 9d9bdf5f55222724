//! Cache entry lifecycle for one endpoint.

use crate::addr::{Rloc16, RouterId};

/// Resolution state of a cache entry.
///
/// An endpoint with no entry at all is simply unknown; the arena models
/// the invalid state by absence, so `invalidate` is removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// First query of a cycle sent, answer outstanding.
    Querying,
    /// Cycle resent after at least one timeout, answer outstanding.
    Retrying,
    /// Locator known and unexpired.
    Valid,
}

/// One outstanding resolution cycle.
///
/// The deadline is plain data scanned from the maintenance tick, so
/// removing the entry is all it takes to cancel the cycle.
#[derive(Clone, Copy, Debug)]
pub struct QueryAttempt {
    /// Cycle id carried by every send of this cycle.
    pub request_id: u64,
    /// When the latest send went out (unix ms).
    pub sent_at_ms: u64,
    /// When the outstanding send times out (unix ms).
    pub deadline_ms: u64,
}

/// A cached endpoint-to-locator binding, or an in-flight resolution for one.
///
/// Invariants: `locator` is present iff the state is `Valid`; `attempt` is
/// present iff the state is `Querying` or `Retrying`.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    state: EntryState,
    locator: Option<Rloc16>,
    /// Resends in the current cycle (0 after the initial send).
    retry_count: u32,
    attempt: Option<QueryAttempt>,
    /// When the advertised owner last heard the endpoint (unix ms),
    /// recovered from the notification's age token. Later is fresher.
    contact_at_ms: u64,
    created_at_ms: u64,
    last_used_ms: u64,
    expires_at_ms: u64,
}

impl CacheEntry {
    /// Create an entry entering its first query cycle.
    pub fn querying(attempt: QueryAttempt, now_ms: u64) -> Self {
        Self {
            state: EntryState::Querying,
            locator: None,
            retry_count: 0,
            attempt: Some(attempt),
            contact_at_ms: 0,
            created_at_ms: now_ms,
            last_used_ms: now_ms,
            expires_at_ms: u64::MAX,
        }
    }

    /// Create an entry directly in the valid state (unsolicited learning).
    pub fn valid(locator: Rloc16, last_contact_secs: u32, now_ms: u64, lifetime_ms: u64) -> Self {
        Self {
            state: EntryState::Valid,
            locator: Some(locator),
            retry_count: 0,
            attempt: None,
            contact_at_ms: now_ms.saturating_sub(last_contact_secs as u64 * 1000),
            created_at_ms: now_ms,
            last_used_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(lifetime_ms),
        }
    }

    /// Current state.
    pub fn state(&self) -> EntryState {
        self.state
    }

    /// The bound locator, present iff `Valid`.
    pub fn locator(&self) -> Option<Rloc16> {
        self.locator
    }

    /// The router the bound locator hangs off, if any.
    pub fn owner_router_id(&self) -> Option<RouterId> {
        self.locator.map(|rloc| rloc.router_id())
    }

    /// Resends in the current cycle (0 after the initial send).
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The outstanding cycle, present iff `Querying`/`Retrying`.
    pub fn attempt(&self) -> Option<&QueryAttempt> {
        self.attempt.as_ref()
    }

    /// Whether an answer is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, EntryState::Querying | EntryState::Retrying)
    }

    /// When the advertised owner last heard the endpoint, unix ms. Zero
    /// until a binding is accepted, so any claim beats an unresolved entry.
    pub fn contact_at_ms(&self) -> u64 {
        self.contact_at_ms
    }

    /// Creation timestamp.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Last lookup or update timestamp (LRU eviction key).
    pub fn last_used_ms(&self) -> u64 {
        self.last_used_ms
    }

    /// Expiry timestamp; `u64::MAX` while unresolved.
    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }

    /// Whether a valid binding has outlived the cache lifetime.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.state == EntryState::Valid && now_ms > self.expires_at_ms
    }

    /// Update the LRU timestamp.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_used_ms = now_ms;
    }

    /// Time since last use.
    pub fn idle_time(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_used_ms)
    }

    /// Record a resend of the current cycle. Returns the new retry count.
    pub fn record_resend(&mut self, now_ms: u64, deadline_ms: u64) -> u32 {
        self.state = EntryState::Retrying;
        self.retry_count += 1;
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.sent_at_ms = now_ms;
            attempt.deadline_ms = deadline_ms;
        }
        self.retry_count
    }

    /// Accept a binding: transition to `Valid`, clearing any cycle.
    pub fn bind(
        &mut self,
        locator: Rloc16,
        last_contact_secs: u32,
        now_ms: u64,
        lifetime_ms: u64,
    ) {
        self.state = EntryState::Valid;
        self.locator = Some(locator);
        self.retry_count = 0;
        self.attempt = None;
        self.contact_at_ms = now_ms.saturating_sub(last_contact_secs as u64 * 1000);
        self.last_used_ms = now_ms;
        self.expires_at_ms = now_ms.saturating_add(lifetime_ms);
    }
}
