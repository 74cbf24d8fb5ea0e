use super::events::{AuditEntry, ChannelKey, NotificationEvent};
use crate::error::PlatformError;
use async_trait::async_trait;

/// Adds, removes and inspects guild roles.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Give `role_id` to `user_id`. `reason` is recorded in the platform's
    /// own audit log.
    async fn add_role(&self, user_id: &str, role_id: &str, reason: &str)
        -> Result<(), PlatformError>;

    /// Take `role_id` away from `user_id`.
    async fn remove_role(
        &self,
        user_id: &str,
        role_id: &str,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Whether `user_id` currently holds `role_id`. A user who is not a
    /// guild member does not hold it.
    async fn has_role(&self, user_id: &str, role_id: &str) -> Result<bool, PlatformError>;
}

/// Remote append-only audit feed.
#[async_trait]
pub trait AuditFeed: Send + Sync {
    /// The newest `limit` entries, newest first.
    async fn fetch_recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, PlatformError>;
}

/// Destination for log-channel notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(&self, channel: ChannelKey, event: &NotificationEvent)
        -> Result<(), PlatformError>;
}
