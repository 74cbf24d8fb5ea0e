//! Shared bot state.
//!
//! [`Warden`] bundles the managers, the platform handles and the config that
//! commands and background tasks all work against.

use crate::clock::Clock;
use crate::config::Config;
use crate::managers::{AuthCodeManager, GrantManager};
use crate::platform::Platform;
use crate::store::RecordStore;
use std::sync::Arc;

pub struct Warden {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<RecordStore>,
    pub codes: AuthCodeManager,
    pub grants: GrantManager,
    pub platform: Platform,
}

impl Warden {
    pub fn new(
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        store: Arc<RecordStore>,
        platform: Platform,
    ) -> Self {
        let codes = AuthCodeManager::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.timing.authcode_ttl_ms,
        );
        let grants = GrantManager::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&platform.roles),
            config.roles.special_role_id.clone(),
            config.timing.elevation_cache_ttl_ms,
        );
        Self {
            config,
            clock,
            store,
            codes,
            grants,
            platform,
        }
    }
}
