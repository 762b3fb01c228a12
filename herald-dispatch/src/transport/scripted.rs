//! Deterministic transport for tests.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use herald_common::{Message, RecipientId};
use parking_lot::Mutex;

use crate::{ProfileSelector, Transport, TransportError};

#[derive(Debug, Clone)]
enum Script {
    Always(TransportError),
    First(u32, TransportError),
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<RecipientId, Script>,
    open_failure: Option<TransportError>,
    ready_failure: Option<TransportError>,
    ready_delay: Duration,
    attempts: HashMap<RecipientId, u32>,
    attempt_log: Vec<RecipientId>,
    delivered: Vec<(RecipientId, Message)>,
    profiles: Vec<ProfileSelector>,
    opened: u32,
    closed: u32,
}

/// Transport whose behaviour is scripted per recipient.
///
/// Every recipient succeeds unless a failure script says otherwise. Counters
/// record opens, closes and every attempt, so tests can check how the engine
/// drove the channel.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    state: Mutex<State>,
}

/// Session handed out by [`ScriptedTransport`]
#[derive(Debug)]
pub struct ScriptedSession {
    id: u32,
}

impl ScriptedSession {
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt for `recipient` fails with `error`
    #[must_use]
    pub fn fail_always(self, recipient: &RecipientId, error: TransportError) -> Self {
        self.state
            .lock()
            .scripts
            .insert(recipient.clone(), Script::Always(error));
        self
    }

    /// The first `count` attempts for `recipient` fail with `error`
    #[must_use]
    pub fn fail_first(self, recipient: &RecipientId, count: u32, error: TransportError) -> Self {
        self.state
            .lock()
            .scripts
            .insert(recipient.clone(), Script::First(count, error));
        self
    }

    #[must_use]
    pub fn fail_open(self, error: TransportError) -> Self {
        self.state.lock().open_failure = Some(error);
        self
    }

    #[must_use]
    pub fn fail_ready(self, error: TransportError) -> Self {
        self.state.lock().ready_failure = Some(error);
        self
    }

    /// Make `ensure_ready` take this long before answering
    #[must_use]
    pub fn ready_after(self, delay: Duration) -> Self {
        self.state.lock().ready_delay = delay;
        self
    }

    /// Attempts made for `recipient`
    #[must_use]
    pub fn attempts(&self, recipient: &RecipientId) -> u32 {
        self.state
            .lock()
            .attempts
            .get(recipient)
            .copied()
            .unwrap_or_default()
    }

    /// Every attempt in the order it was made
    #[must_use]
    pub fn attempt_log(&self) -> Vec<RecipientId> {
        self.state.lock().attempt_log.clone()
    }

    /// Successful sends in the order they were made
    #[must_use]
    pub fn delivered(&self) -> Vec<(RecipientId, Message)> {
        self.state.lock().delivered.clone()
    }

    /// Profiles passed to `open`, in order
    #[must_use]
    pub fn profiles(&self) -> Vec<ProfileSelector> {
        self.state.lock().profiles.clone()
    }

    #[must_use]
    pub fn opened(&self) -> u32 {
        self.state.lock().opened
    }

    #[must_use]
    pub fn closed(&self) -> u32 {
        self.state.lock().closed
    }

    /// Sessions opened and not yet closed
    #[must_use]
    pub fn open_sessions(&self) -> u32 {
        let state = self.state.lock();
        state.opened - state.closed
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Session = ScriptedSession;

    async fn open(&self, profile: &ProfileSelector) -> Result<Self::Session, TransportError> {
        let mut state = self.state.lock();
        state.profiles.push(profile.clone());
        if let Some(error) = state.open_failure.clone() {
            return Err(error);
        }

        state.opened += 1;
        Ok(ScriptedSession { id: state.opened })
    }

    async fn ensure_ready(
        &self,
        _session: &mut Self::Session,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        let (delay, failure) = {
            let state = self.state.lock();
            (state.ready_delay, state.ready_failure.clone())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        failure.map_or(Ok(()), Err)
    }

    async fn send_once(
        &self,
        _session: &mut Self::Session,
        recipient: &RecipientId,
        message: &Message,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.attempt_log.push(recipient.clone());
        let attempt = {
            let count = state.attempts.entry(recipient.clone()).or_default();
            *count += 1;
            *count
        };

        let failure = match state.scripts.get(recipient) {
            Some(Script::Always(error)) => Some(error.clone()),
            Some(Script::First(count, error)) if attempt <= *count => Some(error.clone()),
            _ => None,
        };

        match failure {
            Some(error) => Err(error),
            None => {
                state.delivered.push((recipient.clone(), message.clone()));
                Ok(())
            }
        }
    }

    async fn close(&self, _session: Self::Session) {
        self.state.lock().closed += 1;
    }
}
