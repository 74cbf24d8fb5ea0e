//! One-time authorization codes.
//!
//! A code is issued unused, consumed at most once, and deleted by the sweep
//! only if it expired without ever being used. Used codes are kept forever
//! as an audit trail.

use crate::clock::Clock;
use crate::error::{CodeRejection, ConsumeError, StoreError};
use crate::store::{AuthCodeRecord, RecordStore};
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{debug, info};

/// Default lifetime of an unused code.
pub const DEFAULT_AUTHCODE_TTL_MS: i64 = 60_000;

/// Random bytes per code (72 bits, 18 hex characters).
const CODE_BYTES: usize = 9;

/// A freshly issued code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: i64,
}

fn generate_token() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues, consumes and garbage-collects authorization codes.
#[derive(Debug)]
pub struct AuthCodeManager {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl AuthCodeManager {
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self { store, clock, ttl_ms }
    }

    /// Issue a new unused code for `created_by`.
    pub async fn issue(&self, created_by: &str, reason: &str) -> Result<IssuedCode, StoreError> {
        let now = self.clock.now_ms();
        let expires_at = now.saturating_add(self.ttl_ms);

        let code = self
            .store
            .authcodes
            .update(|file| {
                let mut code = generate_token();
                while file.codes.contains_key(&code) {
                    code = generate_token();
                }
                file.codes.insert(
                    code.clone(),
                    AuthCodeRecord {
                        created_by: created_by.to_string(),
                        reason: reason.to_string(),
                        created_at: now,
                        expires_at,
                        used: false,
                        used_at: None,
                        used_for_user_id: None,
                    },
                );
                code
            })
            .await?;

        crate::metrics::inc_codes_issued();
        info!(created_by = %created_by, expires_at, "Authorization code issued");
        Ok(IssuedCode { code, expires_at })
    }

    /// Consume `code` on behalf of `target_user_id`.
    ///
    /// The lookup, the checks and the mark-as-used happen under the
    /// authcodes lock, so two concurrent calls for the same code can never
    /// both succeed.
    pub async fn consume(
        &self,
        code: &str,
        target_user_id: &str,
    ) -> Result<AuthCodeRecord, ConsumeError> {
        let now = self.clock.now_ms();
        let result = self
            .store
            .authcodes
            .try_update(|file| {
                let entry = file
                    .codes
                    .get_mut(code)
                    .ok_or(ConsumeError::Rejected(CodeRejection::InvalidCode))?;
                if entry.used {
                    return Err(CodeRejection::AlreadyUsed.into());
                }
                if entry.is_expired(now) {
                    return Err(CodeRejection::Expired.into());
                }
                entry.used = true;
                entry.used_at = Some(now);
                entry.used_for_user_id = Some(target_user_id.to_string());
                Ok(entry.clone())
            })
            .await;

        match &result {
            Ok(_) => info!(target_user_id = %target_user_id, "Authorization code consumed"),
            Err(ConsumeError::Rejected(r)) => {
                crate::metrics::inc_code_rejection(r.error_code());
                info!(target_user_id = %target_user_id, reason = %r, "Authorization code rejected");
            }
            Err(ConsumeError::Store(_)) => {}
        }
        result
    }

    /// Delete every unused code whose expiry has passed. Returns how many
    /// were removed.
    pub async fn sweep_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now_ms();
        let stale = self
            .store
            .authcodes
            .read(|file| {
                file.codes
                    .values()
                    .filter(|c| !c.used && c.is_expired(now))
                    .count()
            })
            .await;
        if stale == 0 {
            return Ok(0);
        }

        let removed = self
            .store
            .authcodes
            .update(|file| {
                let before = file.codes.len();
                file.codes.retain(|_, c| c.used || !c.is_expired(now));
                before - file.codes.len()
            })
            .await?;
        debug!(removed, "Expired authorization codes removed");
        Ok(removed)
    }

    /// Look up a code without changing it.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn get(&self, code: &str) -> Option<AuthCodeRecord> {
        self.store
            .authcodes
            .read(|file| file.codes.get(code).cloned())
            .await
    }
}
