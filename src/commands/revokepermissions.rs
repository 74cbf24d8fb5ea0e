//! `/revokepermissions userid reason` - end a grant early.

use super::{CommandReply, Handler, Invocation, require_user_id};
use crate::error::CommandResult;
use crate::platform::NotificationEvent;
use crate::warden::Warden;
use async_trait::async_trait;
use tracing::{info, warn};

pub struct RevokePermissionsHandler;

#[async_trait]
impl Handler for RevokePermissionsHandler {
    async fn handle(&self, warden: &Warden, inv: &Invocation) -> CommandResult<CommandReply> {
        inv.require_any_role(&warden.config.roles.serverperms_role_ids)?;

        let user_id = require_user_id(inv.option("userid")?)?;
        let reason = inv.option("reason")?;

        // Best-effort: the record is deleted whether or not this succeeds.
        let audit_reason = format!("{} (revoked by {})", reason, inv.invoker_id);
        let role_removed = match warden
            .platform
            .roles
            .remove_role(user_id, warden.grants.special_role_id(), &audit_reason)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to remove elevated role");
                false
            }
        };

        let had_grant = warden.grants.revoke(user_id).await?.is_some();
        crate::metrics::inc_grants_revoked();
        info!(user_id = %user_id, revoked_by = %inv.invoker_id, had_grant, role_removed, "Elevated role revoked");

        warden
            .platform
            .notify(NotificationEvent::GrantRevoked {
                user_id: user_id.to_string(),
                revoked_by: inv.invoker_id.clone(),
                reason: reason.to_string(),
                role_removed,
            })
            .await;

        let mut content = format!("✅ Revoked temporary permissions from <@{}>.", user_id);
        if !had_grant {
            content.push_str(" No active grant was on record.");
        }
        if !role_removed {
            content.push_str(" The role could not be removed; check it manually.");
        }
        Ok(CommandReply::public(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{PERMS_ROLE, TARGET, invocation};
    use crate::error::CommandError;
    use crate::warden::testkit::test_warden;
    use std::num::NonZeroU64;

    fn revoke_inv(user: &str) -> Invocation {
        invocation(PERMS_ROLE, &[("userid", user), ("reason", "done")])
    }

    #[tokio::test]
    async fn revoke_without_grant_is_not_an_error() {
        let t = test_warden();
        let reply = RevokePermissionsHandler
            .handle(&t.warden, &revoke_inv(TARGET))
            .await
            .unwrap();
        assert!(reply.content.contains("No active grant"));
        assert_eq!(t.sink.events().len(), 1);
    }

    #[tokio::test]
    async fn role_failure_still_deletes_record() {
        let t = test_warden();
        t.warden
            .grants
            .grant(TARGET, "1", NonZeroU64::new(60_000).unwrap(), "r", "c")
            .await
            .unwrap();
        t.roles.fail_for(TARGET);

        let reply = RevokePermissionsHandler
            .handle(&t.warden, &revoke_inv(TARGET))
            .await
            .unwrap();
        assert!(reply.content.contains("could not be removed"));
        assert!(t.warden.grants.get(TARGET).await.is_none());
        assert!(matches!(
            &t.sink.events()[0].1,
            NotificationEvent::GrantRevoked { role_removed: false, .. }
        ));
    }

    #[tokio::test]
    async fn invalid_target_mutates_nothing() {
        let t = test_warden();
        let err = RevokePermissionsHandler
            .handle(&t.warden, &revoke_inv("not-an-id"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidTargetId(_)));
        assert!(t.sink.events().is_empty());
    }
}
