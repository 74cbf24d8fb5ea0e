//! In-memory fakes of the platform collaborators.

use super::events::{AuditEntry, ChannelKey, NotificationEvent};
use super::traits::{AuditFeed, NotificationSink, RoleProvider};
use crate::error::PlatformError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn fake_failure() -> PlatformError {
    PlatformError::Status {
        status: 500,
        body: "fake failure".into(),
    }
}

/// Role provider backed by a set of users holding the (single) role.
#[derive(Default)]
pub struct FakeRoles {
    holders: Mutex<HashSet<String>>,
    /// Users whose role changes fail.
    failing: Mutex<HashSet<String>>,
    pub lookups: AtomicUsize,
}

impl FakeRoles {
    pub fn give(&self, user_id: &str) {
        self.holders.lock().insert(user_id.to_string());
    }

    pub fn fail_for(&self, user_id: &str) {
        self.failing.lock().insert(user_id.to_string());
    }

    pub fn holds(&self, user_id: &str) -> bool {
        self.holders.lock().contains(user_id)
    }

    fn check(&self, user_id: &str) -> Result<(), PlatformError> {
        if self.failing.lock().contains(user_id) {
            return Err(fake_failure());
        }
        Ok(())
    }
}

#[async_trait]
impl RoleProvider for FakeRoles {
    async fn add_role(&self, user_id: &str, _role_id: &str, _reason: &str) -> Result<(), PlatformError> {
        self.check(user_id)?;
        self.give(user_id);
        Ok(())
    }

    async fn remove_role(&self, user_id: &str, _role_id: &str, _reason: &str) -> Result<(), PlatformError> {
        self.check(user_id)?;
        self.holders.lock().remove(user_id);
        Ok(())
    }

    async fn has_role(&self, user_id: &str, _role_id: &str) -> Result<bool, PlatformError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check(user_id)?;
        Ok(self.holds(user_id))
    }
}

/// Audit feed serving whatever entries the test installs, newest first.
#[derive(Default)]
pub struct FakeFeed {
    entries: Mutex<Vec<AuditEntry>>,
    pub fail: AtomicBool,
}

impl FakeFeed {
    /// Replace the feed with entries given by id, newest first.
    pub fn set_ids(&self, ids: &[&str], executor_id: &str) {
        let entries = ids
            .iter()
            .map(|id| AuditEntry {
                id: id.to_string(),
                executor_id: Some(executor_id.to_string()),
                action: "MEMBER_ROLE_UPDATE".into(),
                target_id: None,
                changes: vec![],
                timestamp: 0,
                reason: None,
            })
            .collect();
        *self.entries.lock() = entries;
    }

    pub fn set(&self, entries: Vec<AuditEntry>) {
        *self.entries.lock() = entries;
    }
}

#[async_trait]
impl AuditFeed for FakeFeed {
    async fn fetch_recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(fake_failure());
        }
        Ok(self.entries.lock().iter().take(limit).cloned().collect())
    }
}

/// Sink that remembers every notification.
#[derive(Default)]
pub struct RecordingSink {
    posted: Mutex<Vec<(ChannelKey, NotificationEvent)>>,
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(ChannelKey, NotificationEvent)> {
        self.posted.lock().clone()
    }

    /// Ids of posted audit entries, in posting order.
    pub fn audit_ids(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|(_, e)| match e {
                NotificationEvent::AuditEntry(entry) => Some(entry.id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn post(&self, channel: ChannelKey, event: &NotificationEvent) -> Result<(), PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(fake_failure());
        }
        self.posted.lock().push((channel, event.clone()));
        Ok(())
    }
}
