//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::snowflake::is_snowflake;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be a numeric id, got '{value}'")]
    InvalidId { field: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("timing.audit_fetch_limit must be between 1 and 100, got {0}")]
    FetchLimitOutOfRange(usize),
    #[error("bot.public_key must be 64 hex characters")]
    InvalidPublicKey,
    #[error("bot.data_dir is required")]
    MissingDataDir,
}

fn check_id(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if !is_snowflake(value) {
        errors.push(ValidationError::InvalidId {
            field,
            value: value.to_string(),
        });
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_id(&mut errors, "bot.guild_id", &config.bot.guild_id);
    check_id(&mut errors, "roles.special_role_id", &config.roles.special_role_id);
    for id in &config.roles.authcodegen_role_ids {
        check_id(&mut errors, "roles.authcodegen_role_ids", id);
    }
    for id in &config.roles.serverperms_role_ids {
        check_id(&mut errors, "roles.serverperms_role_ids", id);
    }
    check_id(&mut errors, "channels.auth_log", &config.channels.auth_log);
    check_id(&mut errors, "channels.perm_log", &config.channels.perm_log);
    check_id(
        &mut errors,
        "channels.special_activity_log",
        &config.channels.special_activity_log,
    );

    if config.bot.data_dir.trim().is_empty() {
        errors.push(ValidationError::MissingDataDir);
    }

    let timing = &config.timing;
    if timing.authcode_ttl_ms <= 0 {
        errors.push(ValidationError::NotPositive("timing.authcode_ttl_ms"));
    }
    if timing.expiry_check_interval_ms == 0 {
        errors.push(ValidationError::NotPositive("timing.expiry_check_interval_ms"));
    }
    if timing.audit_poll_interval_ms == 0 {
        errors.push(ValidationError::NotPositive("timing.audit_poll_interval_ms"));
    }
    if timing.elevation_cache_ttl_ms <= 0 {
        errors.push(ValidationError::NotPositive("timing.elevation_cache_ttl_ms"));
    }
    if !(1..=100).contains(&timing.audit_fetch_limit) {
        errors.push(ValidationError::FetchLimitOutOfRange(timing.audit_fetch_limit));
    }
    if config.discord.request_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive("discord.request_timeout_ms"));
    }

    if let Some(ref key) = config.bot.public_key
        && !(key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit()))
    {
        errors.push(ValidationError::InvalidPublicKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
