//! Per-user cache of the "is elevated" predicate.

use dashmap::DashMap;

/// Default freshness window for a cached sample.
pub const DEFAULT_ELEVATION_CACHE_TTL_MS: i64 = 15_000;

/// Cached elevation samples keyed by user id.
///
/// Entries are never invalidated on grant or revoke; a sample is simply
/// ignored once it is older than the freshness window and resampled by the
/// next lookup.
#[derive(Debug)]
pub struct ElevationCache {
    entries: DashMap<String, (bool, i64)>,
    ttl_ms: i64,
}

impl ElevationCache {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms,
        }
    }

    /// The cached value for `user_id` if it was sampled within the window.
    pub fn get_fresh(&self, user_id: &str, now: i64) -> Option<bool> {
        let entry = self.entries.get(user_id)?;
        let (elevated, sampled_at) = *entry;
        (now - sampled_at < self.ttl_ms).then_some(elevated)
    }

    pub fn insert(&self, user_id: &str, elevated: bool, now: i64) {
        self.entries.insert(user_id.to_string(), (elevated, now));
    }

    /// Drop samples that have gone stale. Returns how many were removed.
    pub fn prune(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, sampled_at)| now - *sampled_at < self.ttl_ms);
        before.saturating_sub(self.entries.len())
    }
}
