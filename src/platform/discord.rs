//! Discord REST implementation of the platform collaborators.
//!
//! One [`DiscordRest`] value serves as role provider, audit feed and
//! notification sink for a single guild. Notifications are rendered as a
//! single embed per message.

use super::events::{AuditChange, AuditEntry, ChannelKey, NotificationEvent};
use super::traits::{AuditFeed, NotificationSink, RoleProvider};
use crate::clock::{Clock, to_rfc3339};
use crate::config::Config;
use crate::config::types::ChannelsConfig;
use crate::error::PlatformError;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Discord caps embed field values at 1024 characters.
const FIELD_VALUE_LIMIT: usize = 1024;

/// Discord caps audit log reasons at 512 characters.
const AUDIT_REASON_LIMIT: usize = 512;

/// REST client bound to one guild.
pub struct DiscordRest {
    http: reqwest::Client,
    api_base: String,
    token: String,
    guild_id: String,
    channels: ChannelsConfig,
    embed_color: u32,
    clock: Arc<dyn Clock>,
}

impl DiscordRest {
    pub fn new(token: String, config: &Config, clock: Arc<dyn Clock>) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.discord.request_timeout_ms))
            .user_agent(concat!("hightide-warden/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: config.discord.api_base.trim_end_matches('/').to_string(),
            token,
            guild_id: config.bot.guild_id.clone(),
            channels: config.channels.clone(),
            embed_color: config.discord.embed_color,
            clock,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    fn role_path(&self, user_id: &str, role_id: &str) -> String {
        format!("/guilds/{}/members/{}/roles/{}", self.guild_id, user_id, role_id)
    }
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("api_base", &self.api_base)
            .field("guild_id", &self.guild_id)
            .finish_non_exhaustive()
    }
}

/// Turn a non-2xx response into [`PlatformError::Status`].
async fn check_status(resp: Response) -> Result<Response, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PlatformError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode a successful JSON response body.
async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, PlatformError> {
    let body = check_status(resp).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| PlatformError::Decode(e.to_string()))
}

/// Percent-encode an audit log reason for the `X-Audit-Log-Reason` header.
fn encode_reason(reason: &str) -> String {
    let truncated: String = reason.chars().take(AUDIT_REASON_LIMIT).collect();
    let mut out = String::with_capacity(truncated.len());
    for byte in truncated.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[async_trait]
impl RoleProvider for DiscordRest {
    async fn add_role(&self, user_id: &str, role_id: &str, reason: &str) -> Result<(), PlatformError> {
        let resp = self
            .request(Method::PUT, &self.role_path(user_id, role_id))
            .header("X-Audit-Log-Reason", encode_reason(reason))
            .send()
            .await?;
        check_status(resp).await?;
        debug!(user_id = %user_id, role_id = %role_id, "Role added");
        Ok(())
    }

    async fn remove_role(
        &self,
        user_id: &str,
        role_id: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let resp = self
            .request(Method::DELETE, &self.role_path(user_id, role_id))
            .header("X-Audit-Log-Reason", encode_reason(reason))
            .send()
            .await?;
        check_status(resp).await?;
        debug!(user_id = %user_id, role_id = %role_id, "Role removed");
        Ok(())
    }

    async fn has_role(&self, user_id: &str, role_id: &str) -> Result<bool, PlatformError> {
        #[derive(Deserialize)]
        struct Member {
            #[serde(default)]
            roles: Vec<String>,
        }

        let path = format!("/guilds/{}/members/{}", self.guild_id, user_id);
        let resp = self.request(Method::GET, &path).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let member: Member = decode(resp).await?;
        Ok(member.roles.iter().any(|r| r == role_id))
    }
}

#[derive(Debug, Deserialize)]
struct RawAuditLog {
    #[serde(default)]
    audit_log_entries: Vec<RawAuditEntry>,
}

#[derive(Debug, Deserialize)]
struct RawAuditEntry {
    id: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
    action_type: u32,
    #[serde(default)]
    changes: Vec<AuditChange>,
    #[serde(default)]
    reason: Option<String>,
}

impl From<RawAuditEntry> for AuditEntry {
    fn from(raw: RawAuditEntry) -> Self {
        Self {
            timestamp: crate::snowflake::timestamp_ms(&raw.id).unwrap_or_default(),
            action: action_name(raw.action_type),
            id: raw.id,
            executor_id: raw.user_id,
            target_id: raw.target_id,
            changes: raw.changes,
            reason: raw.reason,
        }
    }
}

/// Name of a Discord audit log action type.
fn action_name(action_type: u32) -> String {
    let name = match action_type {
        1 => "GUILD_UPDATE",
        10 => "CHANNEL_CREATE",
        11 => "CHANNEL_UPDATE",
        12 => "CHANNEL_DELETE",
        13 => "CHANNEL_OVERWRITE_CREATE",
        14 => "CHANNEL_OVERWRITE_UPDATE",
        15 => "CHANNEL_OVERWRITE_DELETE",
        20 => "MEMBER_KICK",
        21 => "MEMBER_PRUNE",
        22 => "MEMBER_BAN_ADD",
        23 => "MEMBER_BAN_REMOVE",
        24 => "MEMBER_UPDATE",
        25 => "MEMBER_ROLE_UPDATE",
        26 => "MEMBER_MOVE",
        27 => "MEMBER_DISCONNECT",
        28 => "BOT_ADD",
        30 => "ROLE_CREATE",
        31 => "ROLE_UPDATE",
        32 => "ROLE_DELETE",
        40 => "INVITE_CREATE",
        41 => "INVITE_UPDATE",
        42 => "INVITE_DELETE",
        50 => "WEBHOOK_CREATE",
        51 => "WEBHOOK_UPDATE",
        52 => "WEBHOOK_DELETE",
        60 => "EMOJI_CREATE",
        61 => "EMOJI_UPDATE",
        62 => "EMOJI_DELETE",
        72 => "MESSAGE_DELETE",
        73 => "MESSAGE_BULK_DELETE",
        74 => "MESSAGE_PIN",
        75 => "MESSAGE_UNPIN",
        80 => "INTEGRATION_CREATE",
        81 => "INTEGRATION_UPDATE",
        82 => "INTEGRATION_DELETE",
        _ => return format!("ACTION_{}", action_type),
    };
    name.to_string()
}

#[async_trait]
impl AuditFeed for DiscordRest {
    async fn fetch_recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, PlatformError> {
        let path = format!("/guilds/{}/audit-logs?limit={}", self.guild_id, limit);
        let resp = self.request(Method::GET, &path).send().await?;
        let log: RawAuditLog = decode(resp).await?;
        Ok(log.audit_log_entries.into_iter().map(AuditEntry::from).collect())
    }
}

#[async_trait]
impl NotificationSink for DiscordRest {
    async fn post(&self, channel: ChannelKey, event: &NotificationEvent) -> Result<(), PlatformError> {
        let channel_id = self.channels.id_for(channel);
        let embed = render_embed(event, self.embed_color, self.clock.now_ms());
        let resp = self
            .request(Method::POST, &format!("/channels/{}/messages", channel_id))
            .json(&json!({ "embeds": [embed] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

fn mention(user_id: &str) -> String {
    format!("<@{}> ({})", user_id, user_id)
}

/// Discord relative timestamp markup.
fn relative_time(ms: i64) -> String {
    format!("<t:{}:R>", ms.div_euclid(1000))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= FIELD_VALUE_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(FIELD_VALUE_LIMIT - 3).collect();
    out.push_str("...");
    out
}

fn field(name: &str, value: &str) -> Value {
    let value = if value.is_empty() { "-" } else { value };
    json!({ "name": name, "value": truncate(value), "inline": false })
}

fn render_change(change: &AuditChange) -> String {
    let show = |v: &Option<Value>| match v {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    };
    format!("{}: {} -> {}", change.key, show(&change.old_value), show(&change.new_value))
}

/// Render a notification as a Discord embed object.
///
/// `now_ms` stamps events that carry no time of their own.
pub fn render_embed(event: &NotificationEvent, color: u32, now_ms: i64) -> Value {
    let (title, fields, at) = match event {
        NotificationEvent::CodeIssued {
            created_by,
            reason,
            expires_at,
        } => (
            "Authorization code generated",
            vec![
                field("Created by", &mention(created_by)),
                field("Reason", reason),
                field("Expires", &relative_time(*expires_at)),
            ],
            now_ms,
        ),
        NotificationEvent::GrantApplied {
            user_id,
            granted_by,
            reason,
            duration,
            expires_at,
        } => (
            "Temporary permissions granted",
            vec![
                field("User", &mention(user_id)),
                field("Granted by", &mention(granted_by)),
                field("Reason", reason),
                field("Duration", duration),
                field("Expires", &relative_time(*expires_at)),
            ],
            now_ms,
        ),
        NotificationEvent::GrantRevoked {
            user_id,
            revoked_by,
            reason,
            role_removed,
        } => {
            let mut fields = vec![
                field("User", &mention(user_id)),
                field("Revoked by", &mention(revoked_by)),
                field("Reason", reason),
            ];
            if !role_removed {
                fields.push(field("Note", "Role removal failed"));
            }
            ("Temporary permissions revoked", fields, now_ms)
        }
        NotificationEvent::GrantExpired {
            user_id,
            role_removed,
        } => {
            let mut fields = vec![field("User", &mention(user_id))];
            if !role_removed {
                fields.push(field("Note", "Role removal failed"));
            }
            ("Temporary permissions expired", fields, now_ms)
        }
        NotificationEvent::AuditEntry(entry) => {
            let mut fields = vec![
                field("Action", &entry.action),
                field(
                    "Executor",
                    &entry.executor_id.as_deref().map(mention).unwrap_or_default(),
                ),
            ];
            if let Some(ref target) = entry.target_id {
                fields.push(field("Target", target));
            }
            if !entry.changes.is_empty() {
                let changes: Vec<String> = entry.changes.iter().map(render_change).collect();
                fields.push(field("Changes", &changes.join("\n")));
            }
            if let Some(ref reason) = entry.reason {
                fields.push(field("Reason", reason));
            }
            fields.push(field("Entry", &entry.id));
            ("Elevated user activity", fields, entry.timestamp)
        }
    };

    json!({
        "title": title,
        "color": color,
        "fields": fields,
        "timestamp": to_rfc3339(at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_header_is_percent_encoded() {
        assert_eq!(encode_reason("abc-1_2.3~"), "abc-1_2.3~");
        assert_eq!(encode_reason("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_reason("é"), "%C3%A9");
        assert_eq!(encode_reason(&"x".repeat(600)).len(), AUDIT_REASON_LIMIT);
    }

    #[test]
    fn audit_log_decodes_into_entries() {
        let body = r#"{
            "audit_log_entries": [
                {
                    "id": "175928847299117063",
                    "user_id": "111111111111111111",
                    "target_id": "222222222222222222",
                    "action_type": 25,
                    "changes": [{"key": "$add", "new_value": [{"id": "1", "name": "Mod"}]}],
                    "reason": "cleanup"
                },
                {"id": "175928847299117062", "user_id": null, "action_type": 999}
            ],
            "users": []
        }"#;
        let log: RawAuditLog = serde_json::from_str(body).unwrap();
        let entries: Vec<AuditEntry> = log.audit_log_entries.into_iter().map(Into::into).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "MEMBER_ROLE_UPDATE");
        assert_eq!(entries[0].executor_id.as_deref(), Some("111111111111111111"));
        assert_eq!(entries[0].timestamp, 1_462_015_105_796);
        assert_eq!(entries[0].changes[0].key, "$add");
        assert!(entries[0].changes[0].old_value.is_none());
        assert_eq!(entries[1].action, "ACTION_999");
        assert!(entries[1].executor_id.is_none());
    }

    #[test]
    fn grant_embed_carries_duration_and_color() {
        let event = NotificationEvent::GrantApplied {
            user_id: "123456789012345678".into(),
            granted_by: "876543210987654321".into(),
            reason: "incident".into(),
            duration: "2 hours".into(),
            expires_at: 1_700_007_200_000,
        };
        let embed = render_embed(&event, 0xe53935, 1_700_000_000_000);

        assert_eq!(embed["title"], "Temporary permissions granted");
        assert_eq!(embed["color"], 0xe53935);
        let fields = embed["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["value"] == "2 hours"));
        assert!(fields.iter().any(|f| f["value"] == "<t:1700007200:R>"));
        assert!(embed["timestamp"].as_str().unwrap().starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn code_embed_never_contains_the_code() {
        let event = NotificationEvent::CodeIssued {
            created_by: "1".into(),
            reason: "rotation".into(),
            expires_at: 60_000,
        };
        let text = render_embed(&event, 0, 0).to_string();
        assert!(text.contains("rotation"));
        assert!(!text.contains("code\":"));
    }

    #[test]
    fn audit_embed_uses_entry_time_and_lists_changes() {
        let entry = AuditEntry {
            id: "9".into(),
            executor_id: Some("111111111111111111".into()),
            action: "CHANNEL_UPDATE".into(),
            target_id: Some("3".into()),
            changes: vec![AuditChange {
                key: "name".into(),
                old_value: Some(Value::String("general".into())),
                new_value: Some(Value::String("lobby".into())),
            }],
            timestamp: 0,
            reason: None,
        };
        let embed = render_embed(&NotificationEvent::AuditEntry(entry), 0, 1_700_000_000_000);
        assert!(embed["timestamp"].as_str().unwrap().starts_with("1970-01-01"));
        let fields = embed["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["value"] == "name: general -> lobby"));
    }

    #[test]
    fn long_field_values_are_truncated() {
        let long = "y".repeat(FIELD_VALUE_LIMIT + 50);
        let value = field("Reason", &long);
        assert_eq!(value["value"].as_str().unwrap().chars().count(), FIELD_VALUE_LIMIT);
    }
}
