//! Slash command handlers and dispatch.
//!
//! Every handler follows the same order: authorize the invoker, validate
//! all options, then mutate state. A validation failure therefore never
//! leaves a partial effect behind.

mod authcodegen;
mod revokepermissions;
mod serverpermissions;

pub use authcodegen::AuthCodeGenHandler;
pub use revokepermissions::RevokePermissionsHandler;
pub use serverpermissions::ServerPermissionsHandler;

use crate::error::{CommandError, CommandResult};
use crate::snowflake::is_snowflake;
use crate::warden::Warden;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{Instrument, debug, info_span};

/// A command as received from the platform.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub invoker_id: String,
    /// Roles the invoker holds in the guild.
    pub invoker_role_ids: Vec<String>,
    /// Option name to raw value.
    pub options: HashMap<String, String>,
}

impl Invocation {
    /// A required option, trimmed. Blank counts as missing.
    pub fn option(&self, name: &'static str) -> CommandResult<&str> {
        self.options
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or(CommandError::MissingArgument(name))
    }

    /// Fail with `Unauthorized` unless the invoker holds one of `allowed`.
    pub fn require_any_role(&self, allowed: &[String]) -> CommandResult<()> {
        if self.invoker_role_ids.iter().any(|r| allowed.contains(r)) {
            Ok(())
        } else {
            Err(CommandError::Unauthorized)
        }
    }
}

/// Validate that `id` looks like a platform user id.
pub fn require_user_id(id: &str) -> CommandResult<&str> {
    if is_snowflake(id) {
        Ok(id)
    } else {
        Err(CommandError::InvalidTargetId(id.to_string()))
    }
}

/// Text sent back to the invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub content: String,
    /// Only the invoker can see the reply.
    pub ephemeral: bool,
}

impl CommandReply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

impl From<CommandError> for CommandReply {
    fn from(err: CommandError) -> Self {
        Self::private(format!("❌ {}", err))
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, warden: &Warden, inv: &Invocation) -> CommandResult<CommandReply>;
}

/// Registry of command handlers, keyed by command name.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();
        handlers.insert("authcodegen", Box::new(AuthCodeGenHandler));
        handlers.insert("serverpermissions", Box::new(ServerPermissionsHandler));
        handlers.insert("revokepermissions", Box::new(RevokePermissionsHandler));
        Self { handlers }
    }

    /// Run the named command. Errors are turned into private replies and
    /// counted; unknown names get a generic private reply.
    pub async fn dispatch(&self, warden: &Warden, name: &str, inv: &Invocation) -> CommandReply {
        let Some(handler) = self.handlers.get(name) else {
            debug!(command = %name, "Unknown command");
            return CommandReply::private("Unknown command");
        };

        let span = info_span!("command", command = %name, invoker = %inv.invoker_id);
        match handler.handle(warden, inv).instrument(span).await {
            Ok(reply) => reply,
            Err(e) => {
                crate::metrics::inc_command_error(name, e.error_code());
                debug!(command = %name, invoker = %inv.invoker_id, error = %e, "Command error");
                e.into()
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
