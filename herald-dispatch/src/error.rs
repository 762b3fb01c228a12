//! Typed errors for the dispatch engine.
//!
//! Transport failures come in two flavours:
//! - session-level (`Unavailable`, `ChannelNotReady`) end the whole run, even
//!   when a send reports them
//! - per-send (`SendRejected`, `Session`) fail a single attempt and are retried

use thiserror::Error;

use crate::policy::FailureKind;

/// Failure reported by a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The messaging channel could not be reached at all.
    #[error("Messaging channel unavailable: {0}")]
    Unavailable(String),

    /// The channel was reached but did not become interactive in time.
    #[error("Messaging channel not ready: {0}")]
    ChannelNotReady(String),

    /// The channel refused this particular send.
    #[error("Send rejected: {0}")]
    SendRejected(String),

    /// The transport itself failed while sending.
    #[error("Session error: {0}")]
    Session(String),
}

impl TransportError {
    /// Category used by the retry policy
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::SendRejected(_) => FailureKind::Rejected,
            Self::Unavailable(_) | Self::ChannelNotReady(_) | Self::Session(_) => {
                FailureKind::Transport
            }
        }
    }

    /// Returns `true` if this error ends the run rather than a single send.
    #[must_use]
    pub const fn is_session_level(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ChannelNotReady(_))
    }
}

/// Errors returned by the [`crate::Controller`] command surface.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("A run is already in progress")]
    RunAlreadyActive,

    #[error("No valid recipients to send to")]
    NoValidRecipients,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),
}
