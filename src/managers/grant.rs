//! Temporal grants of the elevated role.
//!
//! Grant records are pure state: callers apply or remove the external role
//! themselves. One record per user, last writer wins.

use super::elevation::ElevationCache;
use crate::clock::Clock;
use crate::error::StoreError;
use crate::platform::RoleProvider;
use crate::store::{GrantRecord, RecordStore};
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates, queries and expires grants, and answers "is this user elevated".
pub struct GrantManager {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
    roles: Arc<dyn RoleProvider>,
    special_role_id: String,
    cache: ElevationCache,
}

impl GrantManager {
    pub fn new(
        store: Arc<RecordStore>,
        clock: Arc<dyn Clock>,
        roles: Arc<dyn RoleProvider>,
        special_role_id: impl Into<String>,
        cache_ttl_ms: i64,
    ) -> Self {
        Self {
            store,
            clock,
            roles,
            special_role_id: special_role_id.into(),
            cache: ElevationCache::new(cache_ttl_ms),
        }
    }

    pub fn special_role_id(&self) -> &str {
        &self.special_role_id
    }

    /// Record a grant for `user_id` expiring `duration_ms` from now,
    /// replacing any existing grant for that user.
    pub async fn grant(
        &self,
        user_id: &str,
        granted_by: &str,
        duration_ms: NonZeroU64,
        reason: &str,
        authcode: &str,
    ) -> Result<GrantRecord, StoreError> {
        let now = self.clock.now_ms();
        let duration = i64::try_from(duration_ms.get()).unwrap_or(i64::MAX);
        let record = GrantRecord {
            granted_by: granted_by.to_string(),
            granted_at: now,
            expires_at: now.saturating_add(duration),
            reason: reason.to_string(),
            authcode: authcode.to_string(),
        };

        let (replaced, active) = self
            .store
            .grants
            .update(|file| {
                let replaced = file.grants.insert(user_id.to_string(), record.clone());
                (replaced.is_some(), file.grants.len())
            })
            .await?;

        crate::metrics::inc_grants_applied();
        crate::metrics::set_active_grants(active);
        info!(
            user_id = %user_id,
            granted_by = %granted_by,
            expires_at = record.expires_at,
            replaced,
            "Grant recorded"
        );
        Ok(record)
    }

    /// Delete the grant for `user_id`. Revoking a user without a grant is a
    /// no-op. Returns the removed record, if any.
    pub async fn revoke(&self, user_id: &str) -> Result<Option<GrantRecord>, StoreError> {
        let exists = self
            .store
            .grants
            .read(|file| file.grants.contains_key(user_id))
            .await;
        if !exists {
            debug!(user_id = %user_id, "Revoke: no grant on record");
            return Ok(None);
        }

        let (removed, active) = self
            .store
            .grants
            .update(|file| (file.grants.remove(user_id), file.grants.len()))
            .await?;
        crate::metrics::set_active_grants(active);
        if removed.is_some() {
            info!(user_id = %user_id, "Grant deleted");
        }
        Ok(removed)
    }

    /// Delete the grant for `user_id` only if it is no longer live at
    /// `now`. A grant renewed after the caller listed it is left alone.
    pub async fn revoke_if_expired(
        &self,
        user_id: &str,
        now: i64,
    ) -> Result<Option<GrantRecord>, StoreError> {
        let expired = self
            .store
            .grants
            .read(|file| file.grants.get(user_id).is_some_and(|g| !g.is_live(now)))
            .await;
        if !expired {
            debug!(user_id = %user_id, "Grant renewed or gone, not expiring");
            return Ok(None);
        }

        // Checked again under the write lock; a grant may land in between.
        let (removed, active) = self
            .store
            .grants
            .update(|file| {
                let removed = match file.grants.get(user_id) {
                    Some(g) if !g.is_live(now) => file.grants.remove(user_id),
                    _ => None,
                };
                (removed, file.grants.len())
            })
            .await?;
        crate::metrics::set_active_grants(active);
        if removed.is_some() {
            info!(user_id = %user_id, "Expired grant deleted");
        }
        Ok(removed)
    }

    pub async fn get(&self, user_id: &str) -> Option<GrantRecord> {
        self.store
            .grants
            .read(|file| file.grants.get(user_id).cloned())
            .await
    }

    /// Users whose grant expired at or before `now`.
    pub async fn list_expired(&self, now: i64) -> Vec<String> {
        self.store
            .grants
            .read(|file| {
                file.grants
                    .iter()
                    .filter(|(_, g)| !g.is_live(now))
                    .map(|(user_id, _)| user_id.clone())
                    .collect()
            })
            .await
    }

    /// Grants that are still live, as `(user_id, record)` pairs.
    pub async fn list_active(&self) -> Vec<(String, GrantRecord)> {
        let now = self.clock.now_ms();
        self.store
            .grants
            .read(|file| {
                file.grants
                    .iter()
                    .filter(|(_, g)| g.is_live(now))
                    .map(|(user_id, g)| (user_id.clone(), g.clone()))
                    .collect()
            })
            .await
    }

    /// Whether `user_id` is currently elevated.
    ///
    /// True if a live grant exists OR the user holds the role on the
    /// platform (it may have been given by hand). Samples are cached per
    /// user for the configured window.
    pub async fn is_elevated(&self, user_id: &str) -> bool {
        let now = self.clock.now_ms();
        if let Some(cached) = self.cache.get_fresh(user_id, now) {
            return cached;
        }

        let by_grant = self
            .get(user_id)
            .await
            .is_some_and(|g| g.is_live(now));
        let by_role = if by_grant {
            true
        } else {
            match self.roles.has_role(user_id, &self.special_role_id).await {
                Ok(held) => held,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Role lookup failed, treating as not held");
                    false
                }
            }
        };

        let elevated = by_grant || by_role;
        self.cache.insert(user_id, elevated, now);
        elevated
    }

    /// Drop stale elevation samples.
    pub fn prune_cache(&self) -> usize {
        self.cache.prune(self.clock.now_ms())
    }
}
