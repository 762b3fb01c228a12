use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::{Message, Outcome, RecipientId, RunId, RunSummary};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Delivery status column of an outcome row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
}

/// One row of the outcome log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub time: DateTime<Utc>,
    pub run_id: RunId,
    pub recipient: RecipientId,
    pub message: String,
    pub status: OutcomeStatus,
    pub note: String,
    pub attempts: u32,
}

impl OutcomeRecord {
    #[must_use]
    pub fn new(run_id: RunId, outcome: &Outcome, message: &Message) -> Self {
        Self {
            time: outcome.timestamp,
            run_id,
            recipient: outcome.recipient.clone(),
            message: message.as_str().to_string(),
            status: if outcome.succeeded {
                OutcomeStatus::Ok
            } else {
                OutcomeStatus::Failed
            },
            note: outcome.note.clone(),
            attempts: outcome.attempts,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }
}

/// Append-only store for run outcomes and summaries.
///
/// Each append is a single write: a crash between appends can lose the row
/// being written but never damages rows already stored. Readers get a
/// snapshot and never observe a partially written row.
#[async_trait]
pub trait Ledger: Send + Sync + Debug {
    /// Record the outcome for one recipient of `run_id`
    ///
    /// # Errors
    /// If the row cannot be written
    async fn append_outcome(&self, run_id: RunId, outcome: &Outcome, message: &Message)
    -> Result<()>;

    /// Add a run summary to the history, evicting the oldest entry once the
    /// history holds [`crate::SUMMARY_HISTORY_LIMIT`] summaries
    ///
    /// # Errors
    /// If the history cannot be updated
    async fn append_summary(&self, summary: &RunSummary) -> Result<()>;

    /// All outcome rows in the order they were appended
    ///
    /// # Errors
    /// If the log cannot be read
    async fn outcomes(&self) -> Result<Vec<OutcomeRecord>>;

    /// The retained summaries, oldest first
    ///
    /// # Errors
    /// If the history cannot be read
    async fn summaries(&self) -> Result<Vec<RunSummary>>;
}
