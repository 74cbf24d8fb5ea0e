//! `/authcodegen reason` - issue a one-time authorization code.

use super::{CommandReply, Handler, Invocation};
use crate::error::CommandResult;
use crate::platform::NotificationEvent;
use crate::warden::Warden;
use async_trait::async_trait;

pub struct AuthCodeGenHandler;

#[async_trait]
impl Handler for AuthCodeGenHandler {
    async fn handle(&self, warden: &Warden, inv: &Invocation) -> CommandResult<CommandReply> {
        inv.require_any_role(&warden.config.roles.authcodegen_role_ids)?;
        let reason = inv.option("reason")?;

        let issued = warden.codes.issue(&inv.invoker_id, reason).await?;

        // The code itself only ever goes to the invoker.
        warden
            .platform
            .notify(NotificationEvent::CodeIssued {
                created_by: inv.invoker_id.clone(),
                reason: reason.to_string(),
                expires_at: issued.expires_at,
            })
            .await;

        Ok(CommandReply::private(format!(
            "🔐 Authorization code: `{}`\nSingle use, expires <t:{}:R>.",
            issued.code,
            issued.expires_at.div_euclid(1000)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{CODEGEN_ROLE, PERMS_ROLE, code_from, invocation};
    use crate::error::CommandError;
    use crate::platform::ChannelKey;
    use crate::warden::testkit::test_warden;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// Log writer that keeps everything in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn issue_is_logged_once() {
        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let t = test_warden();
        let inv = invocation(CODEGEN_ROLE, &[("reason", "rotation")]);
        AuthCodeGenHandler.handle(&t.warden, &inv).await.unwrap();

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert_eq!(output.matches("Authorization code issued").count(), 1);
    }

    #[tokio::test]
    async fn issues_code_and_logs_without_it() {
        let t = test_warden();
        let inv = invocation(CODEGEN_ROLE, &[("reason", "rotation")]);
        let reply = AuthCodeGenHandler.handle(&t.warden, &inv).await.unwrap();

        assert!(reply.ephemeral);
        let code = code_from(&reply);
        assert_eq!(code.len(), 18);
        let record = t.warden.codes.get(&code).await.unwrap();
        assert_eq!(record.reason, "rotation");
        assert_eq!(record.created_by, inv.invoker_id);
        assert!(!record.used);

        let events = t.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, ChannelKey::AuthLog);
        assert!(!format!("{:?}", events[0].1).contains(&code));
    }

    #[tokio::test]
    async fn requires_codegen_role() {
        let t = test_warden();
        let inv = invocation(PERMS_ROLE, &[("reason", "rotation")]);
        let err = AuthCodeGenHandler.handle(&t.warden, &inv).await.unwrap_err();
        assert!(matches!(err, CommandError::Unauthorized));
        assert!(t.warden.store.authcodes.snapshot().await.codes.is_empty());
    }

    #[tokio::test]
    async fn requires_reason() {
        let t = test_warden();
        let inv = invocation(CODEGEN_ROLE, &[("reason", "")]);
        let err = AuthCodeGenHandler.handle(&t.warden, &inv).await.unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument("reason")));
        assert!(t.sink.events().is_empty());
    }
}
