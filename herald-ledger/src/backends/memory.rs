use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use herald_common::{Message, Outcome, RunId, RunSummary};
use parking_lot::RwLock;

use crate::{Ledger, OutcomeRecord, Result, SUMMARY_HISTORY_LIMIT};

/// In-process ledger for tests and dry runs.
///
/// Cloning is cheap and clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    outcomes: Arc<RwLock<Vec<OutcomeRecord>>>,
    summaries: Arc<RwLock<VecDeque<RunSummary>>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outcome rows recorded so far
    #[must_use]
    pub fn outcome_count(&self) -> usize {
        self.outcomes.read().len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append_outcome(
        &self,
        run_id: RunId,
        outcome: &Outcome,
        message: &Message,
    ) -> Result<()> {
        let record = OutcomeRecord::new(run_id, outcome, message);
        self.outcomes.write().push(record);
        Ok(())
    }

    async fn append_summary(&self, summary: &RunSummary) -> Result<()> {
        let mut summaries = self.summaries.write();
        summaries.push_back(summary.clone());
        while summaries.len() > SUMMARY_HISTORY_LIMIT {
            summaries.pop_front();
        }
        Ok(())
    }

    async fn outcomes(&self) -> Result<Vec<OutcomeRecord>> {
        Ok(self.outcomes.read().clone())
    }

    async fn summaries(&self) -> Result<Vec<RunSummary>> {
        Ok(self.summaries.read().iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use herald_common::{Progress, RecipientId, RunState};

    use super::*;

    fn recipient() -> RecipientId {
        RecipientId::parse("919876543210").unwrap_or_else(|e| panic!("{e}"))
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let ledger = MemoryLedger::new();
        let clone = ledger.clone();
        let run = RunId::generate();

        clone
            .append_outcome(run, &Outcome::success(recipient(), 1), &Message::from("hi"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(ledger.outcome_count(), 1);
        let rows = ledger.outcomes().await.unwrap_or_default();
        assert_eq!(rows[0].run_id, run);
        assert!(rows[0].succeeded());
    }

    #[tokio::test]
    async fn history_is_capped() {
        let ledger = MemoryLedger::new();
        let mut first = None;

        for n in 0..(SUMMARY_HISTORY_LIMIT + 5) {
            let summary = RunSummary::new(RunId::generate(), RunState::Completed, Progress::new(n));
            if n == 5 {
                first = Some(summary.run_id);
            }
            ledger
                .append_summary(&summary)
                .await
                .unwrap_or_else(|e| panic!("{e}"));
        }

        let history = ledger.summaries().await.unwrap_or_default();
        assert_eq!(history.len(), SUMMARY_HISTORY_LIMIT);
        assert_eq!(Some(history[0].run_id), first);
    }
}
