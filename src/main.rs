//! hightide-warden - moderation automation bot
//!
//! Hands out one-time authorization codes, turns them into time-boxed
//! grants of an elevated guild role, expires those grants, and mirrors
//! what elevated users do into a dedicated log channel.

mod clock;
mod commands;
mod config;
mod duration;
mod error;
mod http;
mod interactions;
mod managers;
mod metrics;
mod platform;
mod snowflake;
mod store;
mod tasks;
mod warden;

use crate::clock::{Clock, SystemClock};
use crate::commands::Registry;
use crate::config::Config;
use crate::interactions::SignatureVerifier;
use crate::platform::Platform;
use crate::platform::discord::DiscordRest;
use crate::platform::noop::LogOnly;
use crate::store::RecordStore;
use crate::tasks::{spawn_audit_poll_task, spawn_sweep_task};
use crate::warden::Warden;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let mut config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    config.apply_env_overrides(std::env::var("PORT").ok());

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        guild_id = %config.bot.guild_id,
        data_dir = %config.bot.data_dir,
        "Starting hightide-warden"
    );

    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(RecordStore::open(&config.bot.data_dir)?);

    let platform = match std::env::var(&config.bot.token_env) {
        Ok(token) if !token.trim().is_empty() => {
            let rest = Arc::new(DiscordRest::new(token.trim().to_string(), &config, Arc::clone(&clock))?);
            Platform {
                roles: rest.clone(),
                feed: rest.clone(),
                sink: rest,
            }
        }
        _ => {
            warn!(
                env = %config.bot.token_env,
                "No bot token set, running in dry-run mode (role changes and notifications are only logged)"
            );
            let log_only = Arc::new(LogOnly);
            Platform {
                roles: log_only.clone(),
                feed: log_only.clone(),
                sink: log_only,
            }
        }
    };

    let warden = Arc::new(Warden::new(Arc::clone(&config), clock, store, platform));

    metrics::init();
    let active = warden.grants.list_active().await;
    metrics::set_active_grants(active.len());
    for (user_id, grant) in &active {
        info!(
            user_id = %user_id,
            expires_at = %crate::clock::to_rfc3339(grant.expires_at),
            "Active grant on record"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start background tasks (both run once immediately)
    let sweep = spawn_sweep_task(Arc::clone(&warden), shutdown_rx.clone());
    let poller = spawn_audit_poll_task(Arc::clone(&warden), shutdown_rx.clone());
    info!(
        sweep_interval_ms = config.timing.expiry_check_interval_ms,
        poll_interval_ms = config.timing.audit_poll_interval_ms,
        "Background tasks started"
    );

    // HTTP listener: health, metrics and (optionally) interactions
    let verifier = match config.bot.public_key.as_deref() {
        Some(key) => Some(Arc::new(SignatureVerifier::from_hex(key)?)),
        None => {
            info!("No public key configured, /interactions disabled");
            None
        }
    };
    let http_task = if config.http.port > 0 {
        let state = http::HttpState {
            warden: Arc::clone(&warden),
            registry: Arc::new(Registry::new()),
            verifier,
        };
        let addr = config.http.addr();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            http::run_http_server(addr, state, rx).await;
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for in-flight cycles");
    let _ = shutdown_tx.send(true);

    for (name, handle) in [("sweep", sweep), ("audit_poll", poller)] {
        if let Err(e) = handle.await {
            error!(task = name, error = %e, "Background task panicked");
        }
    }
    if let Some(handle) = http_task
        && let Err(e) = handle.await
    {
        error!(error = %e, "HTTP task panicked");
    }

    info!("Shutdown complete");
    Ok(())
}
