//! Resolution cache: endpoint identifier to mesh locator bindings.
//!
//! The cache tracks both settled bindings and the query cycles working to
//! establish them. A bounded arena holds one entry per endpoint; absence
//! of an entry is the invalid state, so invalidation is always removal
//! and an invalidated cycle can never fire a stale retry.

mod eid_cache;
mod entry;

pub use eid_cache::{Applied, BeginCycle, DueAttempt, EidCache};
pub use entry::{CacheEntry, EntryState, QueryAttempt};

/// Default maximum number of cache entries.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Default lifetime of a valid binding in seconds.
pub const DEFAULT_CACHE_LIFETIME_SECS: u64 = 300;

/// Point-in-time cache occupancy, for logs and introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub valid: usize,
    pub in_flight: usize,
    pub expired: usize,
    pub avg_age_ms: u64,
}

impl CacheStats {
    /// Fraction of the arena in use, 0.0 to 1.0.
    pub fn fill_ratio(&self) -> f64 {
        if self.max_entries == 0 {
            return 0.0;
        }
        self.entries as f64 / self.max_entries as f64
    }
}
