//! Wall-clock abstraction.
//!
//! Every expiry decision in the bot is made against a [`Clock`] so tests can
//! move time forward without sleeping.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in milliseconds since the UNIX epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> i64;
}

/// Production clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
#[cfg_attr(not(test), allow(dead_code))]
pub struct ManualClock {
    now: AtomicI64,
}

#[cfg_attr(not(test), allow(dead_code))]
impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Render a millisecond timestamp as RFC 3339 for logs and embeds.
pub fn to_rfc3339(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}
