//! The worker that drives a single run

mod deliver;

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures_util::FutureExt;
use herald_common::{
    Message, Outcome, Progress, RecipientId, RunId, RunState, RunSummary,
    tracing::{debug, error, info, warn},
};
use herald_ledger::Ledger;
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc::UnboundedSender, watch},
    time::Instant,
};

use crate::{
    DispatchEvent, DispatchSettings, LogLevel, ReadinessPolicy, RunConfig, RunReport,
    RunSnapshot, Transport, TransportError,
};

/// Slot a session is parked in when the readiness policy holds it open
pub type HeldSession<S> = Arc<Mutex<Option<S>>>;

/// What a run sends, and to whom
pub struct Plan {
    pub run_id: RunId,
    pub recipients: Vec<RecipientId>,
    pub message: Message,
    pub config: RunConfig,
}

/// Where a run reports to
pub struct Outlets<S> {
    pub events: UnboundedSender<DispatchEvent>,
    pub snapshot: Arc<watch::Sender<RunSnapshot>>,
    pub report: Arc<watch::Sender<Option<RunReport>>>,
    pub held: HeldSession<S>,
}

impl<S> Clone for Outlets<S> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            snapshot: Arc::clone(&self.snapshot),
            report: Arc::clone(&self.report),
            held: Arc::clone(&self.held),
        }
    }
}

impl<S> Outlets<S> {
    /// Publish the end of a run: terminal snapshot first, then the report,
    /// then the `State` and `Terminal` events.
    fn publish(&self, report: RunReport) {
        let state = report.state;
        let summary = report.summary.clone();
        let error = report.error.clone();

        self.snapshot.send_modify(|snapshot| {
            snapshot.state = state;
            snapshot.current = None;
        });
        self.report.send_replace(Some(report));

        let _ = self.events.send(DispatchEvent::State(state));
        let _ = self.events.send(DispatchEvent::Terminal {
            state,
            summary,
            error,
        });
    }

    /// Fail a run whose worker task died before publishing an ending.
    ///
    /// Does nothing if the run already reached a terminal state.
    pub fn abandon(&self, run_id: RunId, reason: &str) {
        let progress = {
            let snapshot = self.snapshot.borrow();
            if snapshot.state.is_terminal() {
                return;
            }
            snapshot.progress
        };

        let error = TransportError::Session(format!("dispatch worker died: {reason}"));
        error!(%run_id, %error, "Run abandoned");
        let _ = self.events.send(DispatchEvent::Log {
            level: LogLevel::Error,
            text: format!("Run failed: {error}"),
        });

        self.publish(RunReport {
            run_id,
            state: RunState::Failed,
            summary: RunSummary::new(run_id, RunState::Failed, progress),
            outcomes: Vec::new(),
            error: Some(error),
        });
    }
}

/// How priming and sending ended
enum Stage {
    NotReady(TransportError),
    /// Stopped between priming and the first send
    Stopped,
    Sent(RunState),
    /// The session failed while sending
    Lost(TransportError),
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|reason| (*reason).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

pub struct Worker<T: Transport> {
    transport: Arc<T>,
    ledger: Arc<dyn Ledger>,
    settings: DispatchSettings,
    cancel: Arc<AtomicBool>,
    plan: Plan,
    outlets: Outlets<T::Session>,
    progress: Progress,
    outcomes: Vec<Outcome>,
}

impl<T: Transport> Worker<T> {
    pub fn new(
        transport: Arc<T>,
        ledger: Arc<dyn Ledger>,
        settings: DispatchSettings,
        cancel: Arc<AtomicBool>,
        plan: Plan,
        outlets: Outlets<T::Session>,
    ) -> Self {
        let total = plan.recipients.len();
        Self {
            transport,
            ledger,
            settings,
            cancel,
            plan,
            outlets,
            progress: Progress::new(total),
            outcomes: Vec::with_capacity(total),
        }
    }

    /// Drive the run to a terminal state.
    ///
    /// The session is closed on every path except a readiness failure under
    /// [`ReadinessPolicy::HoldForOperator`], where it is left in the held slot.
    /// A panic while the session is open fails the run and still closes it.
    pub async fn run(mut self) {
        self.enter(RunState::Opening);
        let mut session = match self.open().await {
            Ok(session) => session,
            Err(e) => return self.finish(RunState::Failed, Some(e)).await,
        };

        let stage = match AssertUnwindSafe(self.drive(&mut session))
            .catch_unwind()
            .await
        {
            Ok(stage) => stage,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(run_id = %self.plan.run_id, %reason, "Dispatch worker panicked");
                Stage::Lost(TransportError::Session(format!(
                    "dispatch worker panicked: {reason}"
                )))
            }
        };

        match stage {
            Stage::NotReady(e) => {
                match self.settings.readiness {
                    ReadinessPolicy::FailFast => self.transport.close(session).await,
                    ReadinessPolicy::HoldForOperator => {
                        self.log(
                            LogLevel::Warning,
                            "Session left open for inspection, acknowledge to close it",
                        );
                        *self.outlets.held.lock() = Some(session);
                    }
                }
                self.finish(RunState::Failed, Some(e)).await;
            }
            Stage::Stopped => {
                self.transport.close(session).await;
                self.finish(RunState::Cancelled, None).await;
            }
            Stage::Sent(state) => {
                self.transport.close(session).await;
                self.finish(state, None).await;
            }
            Stage::Lost(e) => {
                self.transport.close(session).await;
                self.finish(RunState::Failed, Some(e)).await;
            }
        }
    }

    async fn drive(&mut self, session: &mut T::Session) -> Stage {
        self.enter(RunState::Priming);
        if let Err(e) = self.prime(session).await {
            return Stage::NotReady(e);
        }

        if self.is_cancelled() {
            self.log(LogLevel::Warning, "Stopped before the first send");
            return Stage::Stopped;
        }

        self.enter(RunState::Sending);
        match self.send_all(session).await {
            Ok(state) => Stage::Sent(state),
            Err(e) => Stage::Lost(e),
        }
    }

    async fn open(&self) -> Result<T::Session, TransportError> {
        let limit = self.settings.open_timeout();
        self.log(
            LogLevel::Info,
            format!("Opening session (profile: {})", self.settings.profile),
        );

        tokio::time::timeout(limit, self.transport.open(&self.settings.profile))
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::Unavailable(format!(
                    "no session after {}s",
                    limit.as_secs()
                )))
            })
    }

    async fn prime(&self, session: &mut T::Session) -> Result<(), TransportError> {
        let limit = self.settings.ready_timeout();
        self.log(LogLevel::Info, "Waiting for the channel to become ready");

        tokio::time::timeout(limit, self.transport.ensure_ready(session, limit))
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::ChannelNotReady(format!(
                    "not ready after {}s",
                    limit.as_secs()
                )))
            })?;

        self.log(LogLevel::Success, "Channel ready");
        Ok(())
    }

    async fn finish(self, state: RunState, error: Option<TransportError>) {
        let summary = RunSummary::new(self.plan.run_id, state, self.progress);

        match (&error, state) {
            (Some(e), _) => self.log(LogLevel::Error, format!("Run failed: {e}")),
            (None, RunState::Completed) => {
                self.log(LogLevel::Success, format!("Run completed: {summary}"));
            }
            (None, _) => self.log(LogLevel::Warning, format!("Run stopped: {summary}")),
        }

        if let Err(e) = self.ledger.append_summary(&summary).await {
            self.log(
                LogLevel::Error,
                format!("Failed to save the run summary: {e}"),
            );
        }

        self.outlets.publish(RunReport {
            run_id: self.plan.run_id,
            state,
            summary,
            outcomes: self.outcomes,
            error,
        });
    }

    fn enter(&self, state: RunState) {
        debug!(run_id = %self.plan.run_id, %state, "Run state changed");
        self.outlets
            .snapshot
            .send_modify(|snapshot| snapshot.state = state);
        let _ = self.outlets.events.send(DispatchEvent::State(state));
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Sleep for `duration` in ticks, returning `false` as soon as a stop is
    /// requested.
    ///
    /// A duration too long to represent as a deadline only ends on a stop.
    async fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let tick = self.settings.tick();

        loop {
            if self.is_cancelled() {
                return false;
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    tick.min(deadline - now)
                }
                None => tick,
            };

            tokio::time::sleep(wait).await;
        }
    }

    /// Log through `tracing` and mirror the line to the event channel
    fn log(&self, level: LogLevel, text: impl Into<String>) {
        let text = text.into();
        let run_id = self.plan.run_id;

        match level {
            LogLevel::Debug => debug!(%run_id, "{text}"),
            LogLevel::Info | LogLevel::Success => info!(%run_id, "{text}"),
            LogLevel::Warning => warn!(%run_id, "{text}"),
            LogLevel::Error => error!(%run_id, "{text}"),
        }

        let _ = self.outlets.events.send(DispatchEvent::Log { level, text });
    }
}
