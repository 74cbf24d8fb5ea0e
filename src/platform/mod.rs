//! Chat platform collaborators.
//!
//! The bot core never talks to the platform directly. It goes through
//! three narrow traits:
//! - [`RoleProvider`]: add/remove/inspect the elevated role
//! - [`AuditFeed`]: read the newest remote audit entries
//! - [`NotificationSink`]: post structured events to log channels
//!
//! [`discord::DiscordRest`] implements all three over the Discord REST API;
//! [`noop::LogOnly`] implements them as log lines for dry runs.

pub mod discord;
pub mod events;
pub mod noop;
#[cfg(test)]
pub mod testkit;
mod traits;

pub use events::{AuditChange, AuditEntry, ChannelKey, NotificationEvent};
pub use traits::{AuditFeed, NotificationSink, RoleProvider};

use std::sync::Arc;
use tracing::warn;

/// Handles to every collaborator, shared by commands and background tasks.
#[derive(Clone)]
pub struct Platform {
    pub roles: Arc<dyn RoleProvider>,
    pub feed: Arc<dyn AuditFeed>,
    pub sink: Arc<dyn NotificationSink>,
}

impl Platform {
    /// Post `event` to its channel. Failures are logged, never propagated.
    pub async fn notify(&self, event: NotificationEvent) {
        let channel = event.channel();
        if let Err(e) = self.sink.post(channel, &event).await {
            warn!(
                channel = channel.name(),
                kind = event.kind(),
                error = %e,
                "Failed to post notification"
            );
        }
    }
}
