//! Run configuration and the records a run publishes to its caller

use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_common::{InvalidRecipient, Outcome, Progress, RecipientId, RunId, RunState, RunSummary};
use serde::{Deserialize, Serialize};

use crate::{DispatchError, RetryPolicy, TransportError, transport::ProfileSelector};

const fn default_delay_between_sends_secs() -> u64 {
    6
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_open_timeout_secs() -> u64 {
    60
}

const fn default_ready_timeout_secs() -> u64 {
    60
}

const fn default_tick_millis() -> u64 {
    1000
}

const fn default_retry_backoff_millis() -> u64 {
    1000
}

/// Per-run parameters chosen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pause between two recipients (in seconds)
    #[serde(default = "default_delay_between_sends_secs")]
    pub delay_between_sends_secs: u64,

    /// Send attempts per recipient, at least one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            delay_between_sends_secs: default_delay_between_sends_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RunConfig {
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_between_sends_secs)
    }

    /// # Errors
    /// If `max_attempts` is zero
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_attempts == 0 {
            return Err(DispatchError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// What the worker does with a session that failed to become ready
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadinessPolicy {
    /// Close the session and fail the run straight away
    #[default]
    FailFast,
    /// Fail the run but keep the session open so an operator can inspect the
    /// channel; the controller closes it on `acknowledge`, the next `start`
    /// or `shutdown`
    HoldForOperator,
}

/// Engine-wide settings, fixed for the lifetime of a [`crate::Controller`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default)]
    pub profile: ProfileSelector,

    /// Upper bound on opening a session (in seconds)
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Upper bound on waiting for the channel to become ready (in seconds)
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Granularity of cancellable waits (in milliseconds)
    ///
    /// A stop request takes effect within one tick.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    #[serde(default)]
    pub readiness: ReadinessPolicy,

    /// Pause between two attempts for the same recipient (in milliseconds)
    #[serde(default = "default_retry_backoff_millis")]
    pub retry_backoff_millis: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            profile: ProfileSelector::default(),
            open_timeout_secs: default_open_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            tick_millis: default_tick_millis(),
            readiness: ReadinessPolicy::default(),
            retry_backoff_millis: default_retry_backoff_millis(),
        }
    }
}

impl DispatchSettings {
    #[must_use]
    pub const fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Never zero, so cancellable waits always yield
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_backoff_millis))
    }
}

/// Severity of a [`DispatchEvent::Log`] line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

/// One-way notifications from the worker to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Progress(Progress),
    Log { level: LogLevel, text: String },
    State(RunState),
    /// Last event of every run
    Terminal {
        state: RunState,
        summary: RunSummary,
        error: Option<TransportError>,
    },
}

/// Latest view of the active run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub state: RunState,
    pub progress: Progress,
    /// Recipient currently being sent to
    pub current: Option<RecipientId>,
    pub started_at: DateTime<Utc>,
}

/// Returned by a successful `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    pub run_id: RunId,
    /// Number of valid recipients that will be dispatched
    pub total: usize,
    /// Tokens skipped by normalization, in input order
    pub invalid: Vec<InvalidRecipient>,
}

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub summary: RunSummary,
    /// One entry per processed recipient, in dispatch order
    pub outcomes: Vec<Outcome>,
    /// Session-level failure that ended the run, if any
    pub error: Option<TransportError>,
}
