//! Log-only platform used when no bot token is configured.
//!
//! Role changes always succeed, the audit feed is always empty and
//! notifications are written to the tracing log instead of a channel.

use super::events::{AuditEntry, ChannelKey, NotificationEvent};
use super::traits::{AuditFeed, NotificationSink, RoleProvider};
use crate::error::PlatformError;
use async_trait::async_trait;
use tracing::info;

pub struct LogOnly;

#[async_trait]
impl RoleProvider for LogOnly {
    async fn add_role(
        &self,
        user_id: &str,
        role_id: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        info!(user_id = %user_id, role_id = %role_id, reason = %reason, "[dry-run] add role");
        Ok(())
    }

    async fn remove_role(
        &self,
        user_id: &str,
        role_id: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        info!(user_id = %user_id, role_id = %role_id, reason = %reason, "[dry-run] remove role");
        Ok(())
    }

    async fn has_role(&self, _user_id: &str, _role_id: &str) -> Result<bool, PlatformError> {
        Ok(false)
    }
}

#[async_trait]
impl AuditFeed for LogOnly {
    async fn fetch_recent_entries(&self, _limit: usize) -> Result<Vec<AuditEntry>, PlatformError> {
        Ok(vec![])
    }
}

#[async_trait]
impl NotificationSink for LogOnly {
    async fn post(
        &self,
        channel: ChannelKey,
        event: &NotificationEvent,
    ) -> Result<(), PlatformError> {
        info!(channel = channel.name(), kind = event.kind(), event = ?event, "[dry-run] notification");
        Ok(())
    }
}
