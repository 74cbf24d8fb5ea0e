//! Core configuration types and loading.

use crate::platform::ChannelKey;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Guild identity and credentials.
    pub bot: BotConfig,
    /// Roles the bot grants and checks.
    pub roles: RolesConfig,
    /// Log channels.
    pub channels: ChannelsConfig,
    /// Lifetimes and polling intervals.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Health/metrics/interactions HTTP listener.
    #[serde(default)]
    pub http: HttpConfig,
    /// Platform REST client settings.
    #[serde(default)]
    pub discord: DiscordConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides taken from the environment.
    ///
    /// `port` is the value of `PORT`, which hosting platforms set to the
    /// port the health check is expected on. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self, port: Option<String>) {
        if let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) {
            self.http.port = port;
        }
    }
}

/// Guild identity and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Guild (server) the bot moderates.
    pub guild_id: String,
    /// Directory holding the record files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Environment variable holding the bot token. The token itself never
    /// lives in the config file.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Hex-encoded Ed25519 application public key. Enables `/interactions`.
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Roles the bot grants and checks.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    /// The elevated role handed out by grants.
    pub special_role_id: String,
    /// Roles allowed to generate authorization codes.
    #[serde(default)]
    pub authcodegen_role_ids: Vec<String>,
    /// Roles allowed to grant and revoke the elevated role.
    #[serde(default)]
    pub serverperms_role_ids: Vec<String>,
}

/// Log channel ids.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsConfig {
    pub auth_log: String,
    pub perm_log: String,
    pub special_activity_log: String,
}

impl ChannelsConfig {
    /// Channel id for a notification channel key.
    pub fn id_for(&self, key: ChannelKey) -> &str {
        match key {
            ChannelKey::AuthLog => &self.auth_log,
            ChannelKey::PermLog => &self.perm_log,
            ChannelKey::SpecialActivityLog => &self.special_activity_log,
        }
    }
}

/// Lifetimes and polling intervals, all in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// How long an unused authorization code stays valid (default: 60000).
    #[serde(default = "default_authcode_ttl_ms")]
    pub authcode_ttl_ms: i64,
    /// Expiry sweep period (default: 10000).
    #[serde(default = "default_expiry_check_interval_ms")]
    pub expiry_check_interval_ms: u64,
    /// Audit poll period (default: 3000).
    #[serde(default = "default_audit_poll_interval_ms")]
    pub audit_poll_interval_ms: u64,
    /// Audit entries fetched per poll (default: 10).
    #[serde(default = "default_audit_fetch_limit")]
    pub audit_fetch_limit: usize,
    /// Freshness window of cached elevation samples (default: 15000).
    #[serde(default = "default_elevation_cache_ttl_ms")]
    pub elevation_cache_ttl_ms: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            authcode_ttl_ms: default_authcode_ttl_ms(),
            expiry_check_interval_ms: default_expiry_check_interval_ms(),
            audit_poll_interval_ms: default_audit_poll_interval_ms(),
            audit_fetch_limit: default_audit_fetch_limit(),
            elevation_cache_ttl_ms: default_elevation_cache_ttl_ms(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: IpAddr,
    /// Listen port (default: 3000). 0 disables the listener.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl HttpConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            port: default_http_port(),
        }
    }
}

/// Platform REST client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Embed sidebar colour (default: 0xe53935).
    #[serde(default = "default_embed_color")]
    pub embed_color: u32,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_ms: default_request_timeout_ms(),
            embed_color: default_embed_color(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_token_env() -> String {
    "DISCORD_TOKEN".to_string()
}

fn default_authcode_ttl_ms() -> i64 {
    crate::managers::authcode::DEFAULT_AUTHCODE_TTL_MS
}

fn default_expiry_check_interval_ms() -> u64 {
    10_000
}

fn default_audit_poll_interval_ms() -> u64 {
    3_000
}

fn default_audit_fetch_limit() -> usize {
    10
}

fn default_elevation_cache_ttl_ms() -> i64 {
    crate::managers::elevation::DEFAULT_ELEVATION_CACHE_TTL_MS
}

fn default_http_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_http_port() -> u16 {
    3000
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_embed_color() -> u32 {
    0xe5_39_35
}
