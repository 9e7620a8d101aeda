//! Error taxonomy shared by the quiz pipeline, the stats store and the admin surface.

use crate::quiz::ValidationError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A quiz file failed validation. Always carries at least one error.
#[derive(Debug, Clone, Error)]
#[error("quiz file has {} format error(s)", .errors.len())]
pub struct FormatError {
    pub errors: Vec<ValidationError>,
}

/// Which poll API call a delivery failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Send,
    Stop,
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollPhase::Send => f.write_str("send"),
            PollPhase::Stop => f.write_str("stop"),
        }
    }
}

/// Platform failure of a single outbound call, normalized at the Telegram boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Rate limiting or network trouble. Worth retrying.
    #[error("temporary delivery failure: {0}")]
    Transient(String),
    /// The chat is gone for the bot (kicked, blocked, deleted).
    #[error("chat unavailable: {0}")]
    ChatUnavailable(String),
    /// The platform refused the request for another reason.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn is_chat_unavailable(&self) -> bool {
        matches!(self, DeliveryError::ChatUnavailable(_))
    }
}

/// A dispatch sequence was aborted before all questions were delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("failed to {phase} the poll for question {} after {attempts} attempt(s): {source}", .index + 1)]
    Delivery {
        index: usize,
        phase: PollPhase,
        attempts: u32,
        #[source]
        source: DeliveryError,
    },
    #[error("chat became unavailable at question {}: {reason}", .index + 1)]
    DestinationUnavailable { index: usize, reason: String },
}

impl DispatchError {
    /// Zero-based index of the question the sequence stopped at.
    pub fn index(&self) -> usize {
        match self {
            DispatchError::Delivery { index, .. } => *index,
            DispatchError::DestinationUnavailable { index, .. } => *index,
        }
    }

    /// Whether it still makes sense to report the failure to the chat.
    pub fn chat_reachable(&self) -> bool {
        !matches!(self, DispatchError::DestinationUnavailable { .. })
    }
}

/// The stats store could not serve a request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store did not respond within {0:?}")]
    Timeout(Duration),
}

/// An admin command was invoked by someone other than the owner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("/{command} is restricted to the bot owner (user {user_id})")]
    NotOwner { command: String, user_id: i64 },
    #[error("/{command} is disabled: no OWNER_ID configured")]
    NoOwnerConfigured { command: String },
}
