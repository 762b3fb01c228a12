use std::time::Duration;

use async_trait::async_trait;
use herald_common::{Message, RecipientId, channel};

use crate::{ProfileSelector, Transport, TransportError};

/// Opens with `primary`, falling back to `secondary` on its default profile
/// when the primary channel is unavailable.
///
/// Only [`TransportError::Unavailable`] triggers the fallback; any other open
/// failure is returned as is. Once a session is open every call is routed to
/// the transport that opened it.
#[derive(Debug, Clone)]
pub struct FallbackTransport<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackTransport<P, S> {
    pub const fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    pub const fn primary(&self) -> &P {
        &self.primary
    }

    pub const fn secondary(&self) -> &S {
        &self.secondary
    }
}

/// Session opened by either side of a [`FallbackTransport`]
#[derive(Debug)]
pub enum FallbackSession<P, S> {
    Primary(P),
    Secondary(S),
}

impl<P, S> FallbackSession<P, S> {
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Secondary(_))
    }
}

#[async_trait]
impl<P, S> Transport for FallbackTransport<P, S>
where
    P: Transport,
    S: Transport,
{
    type Session = FallbackSession<P::Session, S::Session>;

    async fn open(&self, profile: &ProfileSelector) -> Result<Self::Session, TransportError> {
        match self.primary.open(profile).await {
            Ok(session) => Ok(FallbackSession::Primary(session)),
            Err(TransportError::Unavailable(reason)) => {
                channel!(
                    level = WARN,
                    "Profile {profile} unavailable ({reason}), falling back to the default profile"
                );
                self.secondary
                    .open(&ProfileSelector::Default)
                    .await
                    .map(FallbackSession::Secondary)
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_ready(
        &self,
        session: &mut Self::Session,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        match session {
            FallbackSession::Primary(session) => self.primary.ensure_ready(session, timeout).await,
            FallbackSession::Secondary(session) => {
                self.secondary.ensure_ready(session, timeout).await
            }
        }
    }

    async fn send_once(
        &self,
        session: &mut Self::Session,
        recipient: &RecipientId,
        message: &Message,
    ) -> Result<(), TransportError> {
        match session {
            FallbackSession::Primary(session) => {
                self.primary.send_once(session, recipient, message).await
            }
            FallbackSession::Secondary(session) => {
                self.secondary.send_once(session, recipient, message).await
            }
        }
    }

    async fn close(&self, session: Self::Session) {
        match session {
            FallbackSession::Primary(session) => self.primary.close(session).await,
            FallbackSession::Secondary(session) => self.secondary.close(session).await,
        }
    }
}
