#![allow(dead_code, clippy::expect_used)]

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use herald_common::{Message, Outcome, RecipientId, RunId, RunSummary};
use herald_dispatch::{
    Controller, DispatchEvent, DispatchSettings, ProfileSelector, RunConfig, Transport,
    TransportError,
    transport::{ScriptedSession, ScriptedTransport},
};
use herald_ledger::{Ledger, LedgerError, MemoryLedger, OutcomeRecord};
use tokio::sync::mpsc::UnboundedReceiver;

pub fn recipient(value: &str) -> RecipientId {
    RecipientId::parse(value).expect("valid recipient")
}

/// Settings with whole-second timings, meant for paused-clock tests
pub fn settings() -> DispatchSettings {
    DispatchSettings {
        open_timeout_secs: 5,
        ready_timeout_secs: 5,
        tick_millis: 1000,
        retry_backoff_millis: 1000,
        ..DispatchSettings::default()
    }
}

pub fn run_config(max_attempts: u32) -> RunConfig {
    RunConfig {
        delay_between_sends_secs: 6,
        max_attempts,
    }
}

pub struct Harness {
    pub controller: Controller<ScriptedTransport>,
    pub transport: Arc<ScriptedTransport>,
    pub ledger: MemoryLedger,
    pub events: UnboundedReceiver<DispatchEvent>,
}

impl Harness {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self::with_settings(transport, settings())
    }

    pub fn with_settings(transport: ScriptedTransport, settings: DispatchSettings) -> Self {
        let transport = Arc::new(transport);
        let ledger = MemoryLedger::new();
        let (controller, events) =
            Controller::new(settings, Arc::clone(&transport), Arc::new(ledger.clone()));

        Self {
            controller,
            transport,
            ledger,
            events,
        }
    }

    /// Every event received so far
    pub fn drain(&mut self) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Ledger whose every write fails
#[derive(Debug, Default)]
pub struct BrokenLedger;

#[async_trait]
impl Ledger for BrokenLedger {
    async fn append_outcome(
        &self,
        _run_id: RunId,
        _outcome: &Outcome,
        _message: &Message,
    ) -> herald_ledger::Result<()> {
        Err(LedgerError::Io(io::Error::other("disk full")))
    }

    async fn append_summary(&self, _summary: &RunSummary) -> herald_ledger::Result<()> {
        Err(LedgerError::Io(io::Error::other("disk full")))
    }

    async fn outcomes(&self) -> herald_ledger::Result<Vec<OutcomeRecord>> {
        Ok(Vec::new())
    }

    async fn summaries(&self) -> herald_ledger::Result<Vec<RunSummary>> {
        Ok(Vec::new())
    }
}

/// Ledger that records outcomes but panics when asked to store a summary
#[derive(Debug, Default, Clone)]
pub struct PanickingLedger {
    inner: MemoryLedger,
}

#[async_trait]
impl Ledger for PanickingLedger {
    async fn append_outcome(
        &self,
        run_id: RunId,
        outcome: &Outcome,
        message: &Message,
    ) -> herald_ledger::Result<()> {
        self.inner.append_outcome(run_id, outcome, message).await
    }

    async fn append_summary(&self, _summary: &RunSummary) -> herald_ledger::Result<()> {
        panic!("summary store exploded");
    }

    async fn outcomes(&self) -> herald_ledger::Result<Vec<OutcomeRecord>> {
        self.inner.outcomes().await
    }

    async fn summaries(&self) -> herald_ledger::Result<Vec<RunSummary>> {
        self.inner.summaries().await
    }
}

/// Scripted transport that panics when sending to one recipient
pub struct PanickingTransport {
    pub inner: ScriptedTransport,
    pub target: RecipientId,
}

#[async_trait]
impl Transport for PanickingTransport {
    type Session = ScriptedSession;

    async fn open(&self, profile: &ProfileSelector) -> Result<Self::Session, TransportError> {
        self.inner.open(profile).await
    }

    async fn ensure_ready(
        &self,
        session: &mut Self::Session,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.inner.ensure_ready(session, timeout).await
    }

    async fn send_once(
        &self,
        session: &mut Self::Session,
        recipient: &RecipientId,
        message: &Message,
    ) -> Result<(), TransportError> {
        assert_ne!(recipient, &self.target, "send handler crashed");
        self.inner.send_once(session, recipient, message).await
    }

    async fn close(&self, session: Self::Session) {
        self.inner.close(session).await;
    }
}
