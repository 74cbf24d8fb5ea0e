//! Record types persisted in the data directory.
//!
//! Field names are camelCase on disk so files written by earlier
//! deployments of the bot load unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A one-time authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCodeRecord {
    /// User who generated the code.
    pub created_by: String,
    /// Why the code was generated.
    pub reason: String,
    /// Creation time (ms since epoch).
    pub created_at: i64,
    /// Expiry time (ms since epoch).
    pub expires_at: i64,
    pub used: bool,
    #[serde(default)]
    pub used_at: Option<i64>,
    /// Target of the grant this code authorized.
    #[serde(default, alias = "usedFor")]
    pub used_for_user_id: Option<String>,
}

impl AuthCodeRecord {
    /// Expired codes are those whose expiry is at or before `now`.
    #[inline]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// A time-boxed elevated-role grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRecord {
    pub granted_by: String,
    pub granted_at: i64,
    pub expires_at: i64,
    pub reason: String,
    /// The authorization code that authorized this grant.
    pub authcode: String,
}

impl GrantRecord {
    #[inline]
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Contents of `authcodes.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthCodeFile {
    #[serde(default)]
    pub codes: BTreeMap<String, AuthCodeRecord>,
}

/// Contents of `grants.json`, keyed by target user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantFile {
    #[serde(default)]
    pub grants: BTreeMap<String, GrantRecord>,
}

/// Contents of `state.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    /// Id of the newest audit entry already processed.
    #[serde(default)]
    pub last_audit_id: Option<String>,
}
