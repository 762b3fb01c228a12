//! Records shared between the dispatch engine and the ledger

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::recipient::RecipientId;

/// Identifier of a single run, sortable by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a run.
///
/// ```text
/// Idle -> Opening -> Priming -> Sending -> Completed
///            |          |          |----> Cancelled
///            +----------+----------+----> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Opening,
    Priming,
    Sending,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    /// No further transitions happen out of a terminal state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Priming => "priming",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Running counters of a run.
///
/// `processed` is always `succeeded + failed`; the only way to move the
/// counters is [`Progress::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Progress {
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            processed: 0,
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    pub const fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.processed = self.succeeded + self.failed;
    }

    /// Completion percentage in `0..=100`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

/// What happened to one recipient. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub recipient: RecipientId,
    /// Number of send attempts made, at least one
    pub attempts: u32,
    pub succeeded: bool,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    #[must_use]
    pub fn success(recipient: RecipientId, attempts: u32) -> Self {
        Self {
            recipient,
            attempts,
            succeeded: true,
            note: "Sent successfully".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn failure(recipient: RecipientId, attempts: u32, note: impl Into<String>) -> Self {
        Self {
            recipient,
            attempts,
            succeeded: false,
            note: note.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Statistics of a finished run, kept in a bounded history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub state: RunState,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Percentage of `total` that succeeded
    pub success_rate: f64,
}

impl RunSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(run_id: RunId, state: RunState, progress: Progress) -> Self {
        let success_rate = if progress.total == 0 {
            0.0
        } else {
            progress.succeeded as f64 / progress.total as f64 * 100.0
        };

        Self {
            timestamp: Utc::now(),
            run_id,
            state,
            total: progress.total,
            processed: progress.processed,
            succeeded: progress.succeeded,
            failed: progress.failed,
            success_rate,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] total: {}, processed: {}, sent: {}, failed: {}, success rate: {:.1}%",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.state,
            self.total,
            self.processed,
            self.succeeded,
            self.failed,
            self.success_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_invariant_holds() {
        let mut progress = Progress::new(3);
        progress.record(true);
        progress.record(false);
        assert_eq!(progress.processed, progress.succeeded + progress.failed);
        assert_eq!(progress.processed, 2);
        assert!((progress.percent() - 66.666).abs() < 0.01);
    }

    #[test]
    fn summary_rate() {
        let mut progress = Progress::new(3);
        progress.record(true);
        progress.record(false);
        progress.record(true);

        let summary = RunSummary::new(RunId::generate(), RunState::Completed, progress);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert!((summary.success_rate - 66.666).abs() < 0.01);

        let empty = RunSummary::new(RunId::generate(), RunState::Failed, Progress::new(0));
        assert!(empty.success_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Sending.is_terminal());
        assert!(!RunState::Idle.is_terminal());
    }
}
