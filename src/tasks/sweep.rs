//! Expiry sweep background task.
//!
//! Deletes expired unused authorization codes and revokes expired grants.
//! Runs once at startup and then every `timing.expiry_check_interval_ms`.

use crate::platform::NotificationEvent;
use crate::warden::Warden;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EXPIRY_REASON: &str = "Temporary permissions expired";

/// What one sweep did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub codes_removed: usize,
    /// Users whose grant record was deleted.
    pub grants_expired: Vec<String>,
    /// Users whose role removal failed (their record was still deleted).
    pub role_removal_failed: Vec<String>,
}

/// Spawn the expiry sweep task.
///
/// The task stops when `shutdown` flips, but never in the middle of a run.
pub fn spawn_sweep_task(warden: Arc<Warden>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let period = Duration::from_millis(warden.config.timing.expiry_check_interval_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }
            run_sweep(&warden).await;
        }
        info!("Expiry sweep task stopped");
    })
}

/// Run one sweep.
///
/// A failure for one user never stops the rest of the batch. Role removal
/// is best-effort; once the grant record is deleted the expiry is announced
/// either way.
pub async fn run_sweep(warden: &Warden) -> SweepReport {
    let mut report = SweepReport::default();

    match warden.codes.sweep_expired().await {
        Ok(removed) => report.codes_removed = removed,
        Err(e) => warn!(error = %e, "Failed to sweep expired authorization codes"),
    }

    let now = warden.clock.now_ms();
    let expired = warden.grants.list_expired(now).await;
    let role_id = warden.grants.special_role_id().to_string();

    for user_id in expired {
        // Record first, and only while still expired. A failed delete
        // leaves record and role for the next sweep.
        match warden.grants.revoke_if_expired(&user_id, now).await {
            Ok(Some(_)) => {}
            Ok(None) => continue,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to delete expired grant");
                continue;
            }
        }

        let role_removed = match warden
            .platform
            .roles
            .remove_role(&user_id, &role_id, EXPIRY_REASON)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to remove expired role");
                report.role_removal_failed.push(user_id.clone());
                false
            }
        };

        crate::metrics::inc_grants_expired();
        info!(user_id = %user_id, role_removed, "Grant expired");
        warden
            .platform
            .notify(NotificationEvent::GrantExpired {
                user_id: user_id.clone(),
                role_removed,
            })
            .await;
        report.grants_expired.push(user_id);
    }

    let pruned = warden.grants.prune_cache();
    debug!(
        codes_removed = report.codes_removed,
        grants_expired = report.grants_expired.len(),
        role_removal_failed = report.role_removal_failed.len(),
        cache_pruned = pruned,
        "Expiry sweep completed"
    );
    report
}
