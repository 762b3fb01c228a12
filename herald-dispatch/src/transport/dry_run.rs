use std::time::Duration;

use async_trait::async_trait;
use herald_common::{Message, RecipientId, channel};
use serde::{Deserialize, Serialize};

use crate::{ProfileSelector, Transport, TransportError};

/// Transport that accepts every send without contacting any channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunTransport {
    /// Simulated time taken by each send (in milliseconds)
    #[serde(default)]
    pub latency_millis: u64,
}

#[derive(Debug)]
pub struct DryRunSession {
    profile: ProfileSelector,
    sent: usize,
}

impl DryRunSession {
    /// Number of sends accepted so far
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    type Session = DryRunSession;

    async fn open(&self, profile: &ProfileSelector) -> Result<Self::Session, TransportError> {
        channel!(level = INFO, "[dry run] Opening session with profile {profile}");
        Ok(DryRunSession {
            profile: profile.clone(),
            sent: 0,
        })
    }

    async fn ensure_ready(
        &self,
        _session: &mut Self::Session,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_once(
        &self,
        session: &mut Self::Session,
        recipient: &RecipientId,
        message: &Message,
    ) -> Result<(), TransportError> {
        if self.latency_millis > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_millis)).await;
        }

        session.sent += 1;
        channel!(
            level = INFO,
            "[dry run] Would send to {recipient}: {}",
            message.preview(40)
        );

        Ok(())
    }

    async fn close(&self, session: Self::Session) {
        channel!(
            level = INFO,
            "[dry run] Closing session with profile {} after {} sends",
            session.profile,
            session.sent
        );
    }
}
