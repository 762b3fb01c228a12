//! The contract between the dispatch engine and a messaging channel.
//!
//! A [`Transport`] owns nothing about a run: it opens a session, reports when
//! the channel is ready, makes single send attempts and closes the session.
//! Retries, pacing and bookkeeping all live in the worker.

mod command;
mod dry_run;
mod fallback;
mod scripted;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use herald_common::{Message, RecipientId};
use serde::{Deserialize, Serialize};

pub use command::{CommandSession, CommandTransport};
pub use dry_run::{DryRunSession, DryRunTransport};
pub use fallback::{FallbackSession, FallbackTransport};
pub use scripted::{ScriptedSession, ScriptedTransport};

use crate::TransportError;

/// Which channel profile a session is opened with
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileSelector {
    /// The transport's own default profile
    #[default]
    Default,
    /// A named, pre-authenticated profile
    Named(String),
}

impl fmt::Display for ProfileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Live connection to the channel, owned by the worker for one run
    type Session: Send + 'static;

    /// Open a session on the channel.
    ///
    /// # Errors
    /// [`TransportError::Unavailable`] when the channel cannot be reached.
    async fn open(&self, profile: &ProfileSelector) -> Result<Self::Session, TransportError>;

    /// Wait until the channel is interactive.
    ///
    /// # Errors
    /// [`TransportError::ChannelNotReady`] when it is not ready within
    /// `timeout`.
    async fn ensure_ready(
        &self,
        session: &mut Self::Session,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Make exactly one send attempt. Implementations must not retry.
    ///
    /// # Errors
    /// [`TransportError::SendRejected`] when the channel refuses the send, or
    /// another variant when the transport itself fails.
    async fn send_once(
        &self,
        session: &mut Self::Session,
        recipient: &RecipientId,
        message: &Message,
    ) -> Result<(), TransportError>;

    /// Release the session. Never fails; problems are logged.
    async fn close(&self, session: Self::Session);
}
