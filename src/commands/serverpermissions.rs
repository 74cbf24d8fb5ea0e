//! `/serverpermissions userid authcode reason time` - grant the elevated
//! role for a limited time.

use super::{CommandReply, Handler, Invocation, require_user_id};
use crate::duration::{parse_duration, pretty_duration};
use crate::error::{CommandError, CommandResult};
use crate::platform::NotificationEvent;
use crate::warden::Warden;
use async_trait::async_trait;
use std::num::NonZeroU64;
use tracing::{info, warn};

pub struct ServerPermissionsHandler;

#[async_trait]
impl Handler for ServerPermissionsHandler {
    async fn handle(&self, warden: &Warden, inv: &Invocation) -> CommandResult<CommandReply> {
        inv.require_any_role(&warden.config.roles.serverperms_role_ids)?;

        let user_id = require_user_id(inv.option("userid")?)?;
        let authcode = inv.option("authcode")?;
        let reason = inv.option("reason")?;
        let time = inv.option("time")?;
        let duration_ms = parse_duration(time)
            .and_then(NonZeroU64::new)
            .ok_or_else(|| CommandError::InvalidDuration(time.to_string()))?;

        // Consumed before the role call: a failed role add still burns the code.
        warden.codes.consume(authcode, user_id).await?;

        let role_id = warden.grants.special_role_id();
        let audit_reason = format!("{} (granted by {})", reason, inv.invoker_id);
        if let Err(e) = warden
            .platform
            .roles
            .add_role(user_id, role_id, &audit_reason)
            .await
        {
            warn!(user_id = %user_id, error = %e, "Failed to add elevated role");
            return Err(CommandError::ExternalActionFailed(e.to_string()));
        }

        // Without a record the sweep would never take the role back.
        let record = match warden
            .grants
            .grant(user_id, &inv.invoker_id, duration_ms, reason, authcode)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to record grant, removing role");
                if let Err(undo) = warden
                    .platform
                    .roles
                    .remove_role(user_id, role_id, "Grant could not be recorded")
                    .await
                {
                    warn!(user_id = %user_id, error = %undo, "Failed to remove unrecorded role");
                }
                return Err(e.into());
            }
        };
        let pretty = pretty_duration(time);
        info!(user_id = %user_id, granted_by = %inv.invoker_id, duration = %pretty, "Elevated role granted");

        warden
            .platform
            .notify(NotificationEvent::GrantApplied {
                user_id: user_id.to_string(),
                granted_by: inv.invoker_id.clone(),
                reason: reason.to_string(),
                duration: pretty.clone(),
                expires_at: record.expires_at,
            })
            .await;

        Ok(CommandReply::public(format!(
            "✅ Granted <@{}> temporary permissions for {} (expires <t:{}:R>).",
            user_id,
            pretty,
            record.expires_at.div_euclid(1000)
        )))
    }
}
