//! Prometheus metrics collection for hightide-warden.
//!
//! Metrics are registered once by [`init`] and exposed on `/metrics`.
//! Every helper is a no-op until then, so unit tests never need a registry.
//!
//! - `warden_codes_issued_total` - Authorization codes issued
//! - `warden_code_rejections_total{reason}` - Failed code consumptions
//! - `warden_grants_{applied,revoked,expired}_total` - Grant lifecycle
//! - `warden_active_grants` - Grants currently on record
//! - `warden_audit_entries_total{outcome}` - Polled audit entries
//! - `warden_command_errors_total{command,error}` - Failed commands

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

pub static CODES_ISSUED: OnceLock<IntCounter> = OnceLock::new();

/// Code consumptions rejected, by rejection reason.
pub static CODE_REJECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

pub static GRANTS_APPLIED: OnceLock<IntCounter> = OnceLock::new();

pub static GRANTS_REVOKED: OnceLock<IntCounter> = OnceLock::new();

pub static GRANTS_EXPIRED: OnceLock<IntCounter> = OnceLock::new();

/// Audit entries seen by the poller, by outcome (forwarded/filtered).
pub static AUDIT_ENTRIES: OnceLock<IntCounterVec> = OnceLock::new();

/// Command errors by command and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

pub static ACTIVE_GRANTS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before the HTTP endpoint is served.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(CODES_ISSUED, IntCounter::new("warden_codes_issued_total", "Authorization codes issued"));
    register!(CODE_REJECTIONS, IntCounterVec::new(Opts::new("warden_code_rejections_total", "Authorization code rejections by reason"), &["reason"]));
    register!(GRANTS_APPLIED, IntCounter::new("warden_grants_applied_total", "Grants applied"));
    register!(GRANTS_REVOKED, IntCounter::new("warden_grants_revoked_total", "Grants revoked by command"));
    register!(GRANTS_EXPIRED, IntCounter::new("warden_grants_expired_total", "Grants removed by the expiry sweep"));
    register!(AUDIT_ENTRIES, IntCounterVec::new(Opts::new("warden_audit_entries_total", "Polled audit entries by outcome"), &["outcome"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("warden_command_errors_total", "Command errors by command and kind"), &["command", "error"]));
    register!(ACTIVE_GRANTS, IntGauge::new("warden_active_grants", "Grants currently on record"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Update helpers
// ============================================================================

pub fn inc_codes_issued() {
    if let Some(c) = CODES_ISSUED.get() {
        c.inc();
    }
}

pub fn inc_code_rejection(reason: &str) {
    if let Some(c) = CODE_REJECTIONS.get() {
        c.with_label_values(&[reason]).inc();
    }
}

pub fn inc_grants_applied() {
    if let Some(c) = GRANTS_APPLIED.get() {
        c.inc();
    }
}

pub fn inc_grants_revoked() {
    if let Some(c) = GRANTS_REVOKED.get() {
        c.inc();
    }
}

pub fn inc_grants_expired() {
    if let Some(c) = GRANTS_EXPIRED.get() {
        c.inc();
    }
}

pub fn inc_audit_entry(outcome: &str) {
    if let Some(c) = AUDIT_ENTRIES.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

pub fn inc_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

pub fn set_active_grants(count: usize) {
    if let Some(g) = ACTIVE_GRANTS.get() {
        g.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_are_noops_before_init_and_count_after() {
        inc_codes_issued();
        init();
        inc_codes_issued();
        inc_code_rejection("expired");
        set_active_grants(3);
        let text = gather_metrics();
        assert!(text.contains("warden_codes_issued_total"));
        assert!(text.contains("warden_code_rejections_total{reason=\"expired\"}"));
        assert!(text.contains("warden_active_grants"));
    }
}
