//! Command surface of the engine.
//!
//! The controller validates requests, owns the single active run slot and
//! hands each run to its own worker task. It never touches a session while a
//! run is active; the only session it ever closes is one parked by
//! [`ReadinessPolicy::HoldForOperator`](crate::ReadinessPolicy).

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use herald_common::{
    InvalidRecipient, Message, Normalized, Progress, RunId, RunState, internal, normalize,
    tracing::{info, warn},
};
use herald_ledger::Ledger;
use parking_lot::Mutex;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    watch,
};

use crate::{
    DispatchError, DispatchEvent, DispatchSettings, LogLevel, RunConfig, RunReport, RunSnapshot,
    RunTicket, Transport,
    processor::{HeldSession, Outlets, Plan, Worker},
};

/// Handles to the most recently started run
struct CurrentRun {
    run_id: RunId,
    cancel: Arc<AtomicBool>,
    snapshot: watch::Receiver<RunSnapshot>,
    report: watch::Receiver<Option<RunReport>>,
}

impl CurrentRun {
    fn is_active(&self) -> bool {
        !self.snapshot.borrow().state.is_terminal()
    }
}

/// Starts, stops and observes dispatch runs. At most one run is active at a
/// time.
pub struct Controller<T: Transport> {
    settings: DispatchSettings,
    transport: Arc<T>,
    ledger: Arc<dyn Ledger>,
    events: UnboundedSender<DispatchEvent>,
    current: Mutex<Option<CurrentRun>>,
    held: HeldSession<T::Session>,
}

impl<T: Transport> Controller<T> {
    /// Create a controller and the receiving end of its event channel.
    ///
    /// Events from every run started by this controller arrive on the
    /// returned receiver, in order.
    #[must_use]
    pub fn new(
        settings: DispatchSettings,
        transport: Arc<T>,
        ledger: Arc<dyn Ledger>,
    ) -> (Self, UnboundedReceiver<DispatchEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            settings,
            transport,
            ledger,
            events,
            current: Mutex::new(None),
            held: Arc::default(),
        };

        (controller, receiver)
    }

    #[must_use]
    pub const fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Normalize `raw` and start a run over every valid recipient.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - [`DispatchError::RunAlreadyActive`] if a run has not reached a
    ///   terminal state
    /// - [`DispatchError::NoValidRecipients`] if nothing in `raw` normalizes
    /// - [`DispatchError::EmptyMessage`] if `message` is blank
    /// - [`DispatchError::InvalidConfig`] if `config` does not validate
    pub fn start(
        &self,
        raw: &str,
        message: &Message,
        config: RunConfig,
    ) -> Result<RunTicket, DispatchError> {
        self.launch(raw, message, config, false)
    }

    /// Like [`Controller::start`], but only the first valid recipient is sent
    /// to.
    ///
    /// # Errors
    /// Same as [`Controller::start`]
    pub fn start_single(
        &self,
        raw: &str,
        message: &Message,
        config: RunConfig,
    ) -> Result<RunTicket, DispatchError> {
        self.launch(raw, message, config, true)
    }

    fn launch(
        &self,
        raw: &str,
        message: &Message,
        config: RunConfig,
        single: bool,
    ) -> Result<RunTicket, DispatchError> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(CurrentRun::is_active) {
            return Err(DispatchError::RunAlreadyActive);
        }

        let Normalized { mut valid, invalid } = normalize(raw);
        if valid.is_empty() {
            return Err(DispatchError::NoValidRecipients);
        }
        if message.is_blank() {
            return Err(DispatchError::EmptyMessage);
        }
        config.validate()?;

        if single {
            valid.truncate(1);
        }

        let run_id = RunId::generate();
        let total = valid.len();
        self.report_invalid(run_id, &invalid);
        self.emit_log(
            LogLevel::Info,
            format!("Starting run {run_id} with {total} recipients"),
        );
        info!(%run_id, total, skipped = invalid.len(), "Starting run");

        let cancel = Arc::new(AtomicBool::new(false));
        let (snapshot_tx, snapshot_rx) = watch::channel(RunSnapshot {
            run_id,
            state: RunState::Idle,
            progress: Progress::new(total),
            current: None,
            started_at: Utc::now(),
        });
        let (report_tx, report_rx) = watch::channel(None);

        let outlets = Outlets {
            events: self.events.clone(),
            snapshot: Arc::new(snapshot_tx),
            report: Arc::new(report_tx),
            held: Arc::clone(&self.held),
        };
        let supervisor = outlets.clone();
        let worker = Worker::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.ledger),
            self.settings.clone(),
            Arc::clone(&cancel),
            Plan {
                run_id,
                recipients: valid,
                message: message.clone(),
                config,
            },
            outlets,
        );

        let previous = self.held.lock().take();
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Some(session) = previous {
                internal!(level = INFO, "Closing the session held by the previous run");
                transport.close(session).await;
            }

            // A worker that dies without publishing an ending must not leave the
            // run active forever
            if let Err(e) = tokio::spawn(worker.run()).await {
                supervisor.abandon(run_id, &e.to_string());
            }
        });

        *current = Some(CurrentRun {
            run_id,
            cancel,
            snapshot: snapshot_rx,
            report: report_rx,
        });

        Ok(RunTicket {
            run_id,
            total,
            invalid,
        })
    }

    fn report_invalid(&self, run_id: RunId, invalid: &[InvalidRecipient]) {
        if invalid.is_empty() {
            return;
        }

        warn!(%run_id, count = invalid.len(), "Skipping invalid recipients");
        for entry in invalid {
            self.emit_log(
                LogLevel::Warning,
                format!("Skipping invalid recipient {entry}"),
            );
        }
    }

    fn emit_log(&self, level: LogLevel, text: String) {
        let _ = self.events.send(DispatchEvent::Log { level, text });
    }

    /// Ask the active run to stop after the message in flight.
    ///
    /// Returns `false`, and does nothing, when no run is active.
    pub fn cancel(&self) -> bool {
        let current = self.current.lock();
        match current.as_ref() {
            Some(run) if run.is_active() => {
                run.cancel.store(true, Ordering::Release);
                info!(run_id = %run.run_id, "Stop requested");
                self.emit_log(
                    LogLevel::Warning,
                    "Stopping, finishing the current message".to_string(),
                );
                true
            }
            _ => false,
        }
    }

    /// Latest snapshot of the most recent run
    #[must_use]
    pub fn query_progress(&self) -> Option<RunSnapshot> {
        self.current
            .lock()
            .as_ref()
            .map(|run| run.snapshot.borrow().clone())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(CurrentRun::is_active)
    }

    /// Wait for the most recent run to finish and return its report.
    ///
    /// Returns `None` if no run was ever started, or if the worker died
    /// without reporting.
    pub async fn wait(&self) -> Option<RunReport> {
        let mut report = self.current.lock().as_ref().map(|run| run.report.clone())?;

        if report.wait_for(Option::is_some).await.is_err() {
            warn!("Run worker exited without a report");
        }

        report.borrow().clone()
    }

    /// Close a session held open after a readiness failure.
    ///
    /// Returns `true` if there was one.
    pub async fn acknowledge(&self) -> bool {
        let session = self.held.lock().take();
        match session {
            Some(session) => {
                self.transport.close(session).await;
                internal!(level = INFO, "Closed the held session");
                true
            }
            None => false,
        }
    }

    /// Stop the active run, wait for it, and close any held session.
    pub async fn shutdown(&self) -> Option<RunReport> {
        self.cancel();
        let report = self.wait().await;
        self.acknowledge().await;
        report
    }
}
