//! Audit reconciliation poller.
//!
//! Diffs the newest entries of the remote audit feed against the persisted
//! cursor (`state.json` `lastAuditId`) and forwards each new entry made by
//! an elevated user to the special-activity log, oldest first.
//!
//! # Cursor rules
//!
//! - First poll ever (no cursor): the cursor is set to the newest entry and
//!   nothing is forwarded, so a fresh deployment never floods the log with
//!   history.
//! - Every later poll advances the cursor to the newest fetched entry, even
//!   when nothing new was found.
//! - If the cursor is not inside the fetched window, more than
//!   `audit_fetch_limit` entries arrived between polls; the older ones are
//!   lost. This is logged, not repaired.
//!
//! Entries may also reach the log through a live push path elsewhere; the
//! poller does not deduplicate against it.

use crate::error::{PlatformError, StoreError};
use crate::platform::{AuditEntry, NotificationEvent};
use crate::warden::Warden;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors that end a poll cycle early. The next cycle starts afresh.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to fetch audit entries: {0}")]
    Fetch(#[from] PlatformError),
    #[error("failed to persist audit cursor: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one poll cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    /// The cycle only established the initial cursor.
    pub baseline: bool,
    /// Ids forwarded to the activity log, in delivery order.
    pub forwarded: Vec<String>,
    /// New entries skipped because the executor is not elevated.
    pub filtered: usize,
    /// The old cursor was not found in the fetched window.
    pub gap: bool,
}

/// Spawn the audit poll task.
pub fn spawn_audit_poll_task(
    warden: Arc<Warden>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = Duration::from_millis(warden.config.timing.audit_poll_interval_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }
            match poll_once(&warden).await {
                Ok(report) => debug!(
                    baseline = report.baseline,
                    forwarded = report.forwarded.len(),
                    filtered = report.filtered,
                    gap = report.gap,
                    "Audit poll completed"
                ),
                Err(e) => warn!(error = %e, "Audit poll failed"),
            }
        }
        info!("Audit poll task stopped");
    })
}

/// Newest-first `entries` strictly newer than `cursor`, and whether the
/// cursor was found.
fn entries_after<'a>(entries: &'a [AuditEntry], cursor: &str) -> (&'a [AuditEntry], bool) {
    match entries.iter().position(|e| e.id == cursor) {
        Some(idx) => (&entries[..idx], true),
        None => (entries, false),
    }
}

/// Run one poll cycle.
pub async fn poll_once(warden: &Warden) -> Result<PollReport, PollError> {
    let limit = warden.config.timing.audit_fetch_limit;
    let entries = warden.platform.feed.fetch_recent_entries(limit).await?;
    let mut report = PollReport::default();

    let Some(newest) = entries.first() else {
        return Ok(report);
    };
    let newest_id = newest.id.clone();

    let cursor = warden
        .store
        .state
        .read(|state| state.last_audit_id.clone())
        .await;

    let Some(cursor) = cursor else {
        warden
            .store
            .state
            .update(|state| state.last_audit_id = Some(newest_id.clone()))
            .await?;
        info!(cursor = %newest_id, "Audit cursor initialised");
        report.baseline = true;
        return Ok(report);
    };

    let (fresh, found) = entries_after(&entries, &cursor);
    if !found {
        warn!(
            cursor = %cursor,
            fetched = entries.len(),
            "Audit cursor not in fetched window, older entries were missed"
        );
        report.gap = true;
    }

    if newest_id != cursor {
        warden
            .store
            .state
            .update(|state| state.last_audit_id = Some(newest_id.clone()))
            .await?;
    }

    for entry in fresh.iter().rev() {
        let elevated = match entry.executor_id.as_deref() {
            Some(executor) => warden.grants.is_elevated(executor).await,
            None => false,
        };
        if !elevated {
            crate::metrics::inc_audit_entry("filtered");
            report.filtered += 1;
            continue;
        }

        crate::metrics::inc_audit_entry("forwarded");
        debug!(entry_id = %entry.id, action = %entry.action, "Forwarding audit entry");
        warden
            .platform
            .notify(NotificationEvent::AuditEntry(entry.clone()))
            .await;
        report.forwarded.push(entry.id.clone());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warden::testkit::test_warden;
    use std::sync::atomic::Ordering;

    const ELEVATED: &str = "111111111111111111";
    const REGULAR: &str = "222222222222222222";

    async fn cursor(t: &crate::warden::testkit::TestWarden) -> Option<String> {
        t.warden.store.state.snapshot().await.last_audit_id
    }

    #[tokio::test]
    async fn first_poll_sets_baseline_then_delivers_oldest_first() {
        let t = test_warden();
        t.roles.give(ELEVATED);

        t.feed.set_ids(&["5", "4", "3"], ELEVATED);
        let report = poll_once(&t.warden).await.unwrap();
        assert!(report.baseline);
        assert!(t.sink.events().is_empty());
        assert_eq!(cursor(&t).await.as_deref(), Some("5"));

        t.feed.set_ids(&["7", "6", "5", "4"], ELEVATED);
        let report = poll_once(&t.warden).await.unwrap();
        assert_eq!(report.forwarded, vec!["6".to_string(), "7".to_string()]);
        assert_eq!(t.sink.audit_ids(), vec!["6".to_string(), "7".to_string()]);
        assert_eq!(cursor(&t).await.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn nothing_new_emits_nothing() {
        let t = test_warden();
        t.roles.give(ELEVATED);
        t.feed.set_ids(&["5", "4"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        let report = poll_once(&t.warden).await.unwrap();
        assert_eq!(report, PollReport::default());
        assert!(t.sink.events().is_empty());
        assert_eq!(cursor(&t).await.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn empty_feed_leaves_cursor_alone() {
        let t = test_warden();
        let report = poll_once(&t.warden).await.unwrap();
        assert!(!report.baseline);
        assert_eq!(cursor(&t).await, None);
    }

    #[tokio::test]
    async fn entries_are_delivered_exactly_once() {
        let t = test_warden();
        t.roles.give(ELEVATED);
        t.feed.set_ids(&["1"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        t.feed.set_ids(&["3", "2", "1"], ELEVATED);
        poll_once(&t.warden).await.unwrap();
        poll_once(&t.warden).await.unwrap();
        t.feed.set_ids(&["4", "3", "2", "1"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        assert_eq!(
            t.sink.audit_ids(),
            vec!["2".to_string(), "3".to_string(), "4".to_string()]
        );
    }

    #[tokio::test]
    async fn non_elevated_executors_are_filtered() {
        let t = test_warden();
        t.roles.give(ELEVATED);
        t.feed.set_ids(&["1"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        let entry = |id: &str, executor: Option<&str>| AuditEntry {
            id: id.into(),
            executor_id: executor.map(String::from),
            action: "CHANNEL_UPDATE".into(),
            target_id: None,
            changes: vec![],
            timestamp: 0,
            reason: None,
        };
        t.feed.set(vec![
            entry("4", Some(ELEVATED)),
            entry("3", None),
            entry("2", Some(REGULAR)),
            entry("1", Some(ELEVATED)),
        ]);

        let report = poll_once(&t.warden).await.unwrap();
        assert_eq!(report.forwarded, vec!["4".to_string()]);
        assert_eq!(report.filtered, 2);
    }

    #[tokio::test]
    async fn grant_holders_count_as_elevated() {
        let t = test_warden();
        t.feed.set_ids(&["1"], REGULAR);
        poll_once(&t.warden).await.unwrap();

        t.warden
            .grants
            .grant(REGULAR, "9", std::num::NonZeroU64::new(60_000).unwrap(), "r", "c")
            .await
            .unwrap();
        t.feed.set_ids(&["2", "1"], REGULAR);
        let report = poll_once(&t.warden).await.unwrap();
        assert_eq!(report.forwarded, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn lost_cursor_processes_whole_window() {
        let t = test_warden();
        t.roles.give(ELEVATED);
        t.feed.set_ids(&["1"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        t.feed.set_ids(&["30", "29", "28"], ELEVATED);
        let report = poll_once(&t.warden).await.unwrap();
        assert!(report.gap);
        assert_eq!(
            report.forwarded,
            vec!["28".to_string(), "29".to_string(), "30".to_string()]
        );
        assert_eq!(cursor(&t).await.as_deref(), Some("30"));
    }

    #[tokio::test]
    async fn fetch_failure_is_an_error_and_keeps_cursor() {
        let t = test_warden();
        t.feed.set_ids(&["5"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        t.feed.fail.store(true, Ordering::SeqCst);
        assert!(matches!(poll_once(&t.warden).await, Err(PollError::Fetch(_))));
        assert_eq!(cursor(&t).await.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn fetch_respects_limit() {
        let t = test_warden();
        t.roles.give(ELEVATED);
        t.feed.set_ids(&["1"], ELEVATED);
        poll_once(&t.warden).await.unwrap();

        let ids: Vec<String> = (2..=20).rev().map(|i| i.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        t.feed.set_ids(&refs, ELEVATED);
        let report = poll_once(&t.warden).await.unwrap();
        // Limit is 10, so entries 2..=10 fall outside the window.
        assert!(report.gap);
        assert_eq!(report.forwarded.len(), 10);
        assert_eq!(report.forwarded.first().map(String::as_str), Some("11"));
        assert_eq!(report.forwarded.last().map(String::as_str), Some("20"));
    }
}
