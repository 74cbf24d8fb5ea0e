//! Notification events and audit entries exchanged with the platform.

use serde::{Deserialize, Serialize};

/// Which log channel a notification goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// Authorization code activity.
    AuthLog,
    /// Grants, revocations and expiries.
    PermLog,
    /// Actions taken by elevated users.
    SpecialActivityLog,
}

impl ChannelKey {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthLog => "auth_log",
            Self::PermLog => "perm_log",
            Self::SpecialActivityLog => "special_activity_log",
        }
    }
}

/// A single field change recorded on an audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditChange {
    pub key: String,
    #[serde(default)]
    pub old_value: Option<serde_json::Value>,
    #[serde(default)]
    pub new_value: Option<serde_json::Value>,
}

/// One entry of the remote append-only audit feed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    /// User who performed the action, when the platform reports one.
    pub executor_id: Option<String>,
    /// Action name, e.g. `MEMBER_ROLE_UPDATE`.
    pub action: String,
    pub target_id: Option<String>,
    pub changes: Vec<AuditChange>,
    /// When the action happened (ms since epoch).
    pub timestamp: i64,
    pub reason: Option<String>,
}

/// Structured event handed to the notification sink.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    CodeIssued {
        created_by: String,
        reason: String,
        expires_at: i64,
    },
    GrantApplied {
        user_id: String,
        granted_by: String,
        reason: String,
        /// Human-readable duration, e.g. "2 hours".
        duration: String,
        expires_at: i64,
    },
    GrantRevoked {
        user_id: String,
        revoked_by: String,
        reason: String,
        role_removed: bool,
    },
    GrantExpired {
        user_id: String,
        role_removed: bool,
    },
    AuditEntry(AuditEntry),
}

impl NotificationEvent {
    /// The log channel this event belongs in.
    pub fn channel(&self) -> ChannelKey {
        match self {
            Self::CodeIssued { .. } => ChannelKey::AuthLog,
            Self::GrantApplied { .. } | Self::GrantRevoked { .. } | Self::GrantExpired { .. } => {
                ChannelKey::PermLog
            }
            Self::AuditEntry(_) => ChannelKey::SpecialActivityLog,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CodeIssued { .. } => "code_issued",
            Self::GrantApplied { .. } => "grant_applied",
            Self::GrantRevoked { .. } => "grant_revoked",
            Self::GrantExpired { .. } => "grant_expired",
            Self::AuditEntry(_) => "audit_entry",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_route_to_their_channels() {
        let issued = NotificationEvent::CodeIssued {
            created_by: "1".into(),
            reason: "r".into(),
            expires_at: 0,
        };
        assert_eq!(issued.channel(), ChannelKey::AuthLog);

        let expired = NotificationEvent::GrantExpired {
            user_id: "1".into(),
            role_removed: false,
        };
        assert_eq!(expired.channel(), ChannelKey::PermLog);
        assert_eq!(expired.kind(), "grant_expired");
    }
}
