//! Unified error handling for hightide-warden.
//!
//! This module provides the error hierarchy for the bot, with static
//! labels for metrics and the user-facing text shown in command replies.

use thiserror::Error;

// ============================================================================
// Authorization code rejections
// ============================================================================

/// Why an authorization code could not be consumed.
///
/// The Display text is shown verbatim to the command caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodeRejection {
    #[error("invalid authorization code")]
    InvalidCode,

    #[error("authorization code already used")]
    AlreadyUsed,

    #[error("authorization code expired")]
    Expired,
}

impl CodeRejection {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCode => "invalid_code",
            Self::AlreadyUsed => "already_used",
            Self::Expired => "expired",
        }
    }
}

// ============================================================================
// Record store errors
// ============================================================================

/// Failures reading or writing the persisted record files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from a store-backed manager operation that can also be rejected.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Rejected(#[from] CodeRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Platform (collaborator) errors
// ============================================================================

/// Failures talking to the chat platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

// ============================================================================
// Command errors
// ============================================================================

/// Errors surfaced to whoever invoked a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("you are not allowed to use this command")]
    Unauthorized,

    #[error("missing required option: {0}")]
    MissingArgument(&'static str),

    #[error("invalid user id: {0}")]
    InvalidTargetId(String),

    #[error("invalid duration: {0} (use e.g. 10s, 10m, 2h, 4d)")]
    InvalidDuration(String),

    #[error("{0}")]
    Rejected(CodeRejection),

    #[error("failed to update roles: {0}")]
    ExternalActionFailed(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::MissingArgument(_) => "missing_argument",
            Self::InvalidTargetId(_) => "invalid_target_id",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::Rejected(r) => r.error_code(),
            Self::ExternalActionFailed(_) => "external_action_failed",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<ConsumeError> for CommandError {
    fn from(err: ConsumeError) -> Self {
        match err {
            ConsumeError::Rejected(r) => Self::Rejected(r),
            ConsumeError::Store(e) => Self::Store(e),
        }
    }
}

/// Result type for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;
