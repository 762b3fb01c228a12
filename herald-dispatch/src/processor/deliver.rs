//! Sending phase: one recipient at a time, bounded retries, paced by the
//! inter-send delay

use herald_common::{Outcome, RecipientId, RunState, tracing::warn};

use super::Worker;
use crate::{DispatchEvent, LogLevel, Transport, TransportError};

/// Why a recipient's attempts ended the whole run
enum Cut {
    /// A stop was requested between attempts
    Stopped,
    /// The session itself failed
    Lost(TransportError),
}

/// Outcome of one recipient, and whether it ended the run
struct Delivery {
    outcome: Outcome,
    cut: Option<Cut>,
}

impl<T: Transport> Worker<T> {
    /// Send to every recipient in order.
    ///
    /// Returns the error that ended the run when the session failed mid-way.
    pub(super) async fn send_all(
        &mut self,
        session: &mut T::Session,
    ) -> Result<RunState, TransportError> {
        let recipients = std::mem::take(&mut self.plan.recipients);
        let total = recipients.len();
        let delay = self.plan.config.delay();

        for (index, recipient) in recipients.iter().enumerate() {
            if self.is_cancelled() {
                self.log(LogLevel::Warning, "Stopped by operator");
                return Ok(RunState::Cancelled);
            }

            self.outlets
                .snapshot
                .send_modify(|snapshot| snapshot.current = Some(recipient.clone()));
            self.log(
                LogLevel::Info,
                format!("[{}/{total}] Sending to {recipient}", index + 1),
            );

            let delivery = self.deliver(session, recipient).await;
            self.record(delivery.outcome).await;

            match delivery.cut {
                Some(Cut::Stopped) => {
                    self.log(LogLevel::Warning, "Stopped by operator");
                    return Ok(RunState::Cancelled);
                }
                Some(Cut::Lost(e)) => return Err(e),
                None => {}
            }

            if index + 1 < total {
                self.log(
                    LogLevel::Debug,
                    format!("Waiting {}s before the next message", delay.as_secs()),
                );
                if !self.pause(delay).await {
                    self.log(LogLevel::Warning, "Stopped by operator");
                    return Ok(RunState::Cancelled);
                }
            }
        }

        Ok(RunState::Completed)
    }

    /// Attempt `recipient` until it succeeds, the retry policy gives up, a
    /// stop is requested between attempts, or the session fails.
    async fn deliver(&self, session: &mut T::Session, recipient: &RecipientId) -> Delivery {
        let policy = self.settings.retry_policy();
        let max_attempts = self.plan.config.max_attempts;
        let mut attempts = 0;

        loop {
            attempts += 1;
            if attempts > 1 {
                self.log(
                    LogLevel::Warning,
                    format!("Retry {attempts}/{max_attempts} for {recipient}"),
                );
            }

            let error = match self
                .transport
                .send_once(session, recipient, &self.plan.message)
                .await
            {
                Ok(()) => {
                    return Delivery {
                        outcome: Outcome::success(recipient.clone(), attempts),
                        cut: None,
                    };
                }
                Err(e) => e,
            };

            warn!(
                run_id = %self.plan.run_id,
                %recipient,
                attempt = attempts,
                max_attempts,
                error = %error,
                "Send attempt failed"
            );

            if error.is_session_level() {
                return Delivery {
                    outcome: Outcome::failure(recipient.clone(), attempts, error.to_string()),
                    cut: Some(Cut::Lost(error)),
                };
            }

            if !policy.should_retry(attempts, max_attempts, error.kind()) {
                return Delivery {
                    outcome: Outcome::failure(recipient.clone(), attempts, error.to_string()),
                    cut: None,
                };
            }

            if !self.pause(policy.backoff()).await {
                return Delivery {
                    outcome: Outcome::failure(
                        recipient.clone(),
                        attempts,
                        format!("Stopped before retry: {error}"),
                    ),
                    cut: Some(Cut::Stopped),
                };
            }
        }
    }

    /// Store the outcome and publish the new counters
    async fn record(&mut self, outcome: Outcome) {
        if let Err(e) = self
            .ledger
            .append_outcome(self.plan.run_id, &outcome, &self.plan.message)
            .await
        {
            self.log(
                LogLevel::Error,
                format!("Failed to record outcome for {}: {e}", outcome.recipient),
            );
        }

        self.progress.record(outcome.succeeded);
        if outcome.succeeded {
            self.log(LogLevel::Success, format!("Sent to {}", outcome.recipient));
        } else {
            self.log(
                LogLevel::Error,
                format!(
                    "Failed to send to {} after {} attempts: {}",
                    outcome.recipient, outcome.attempts, outcome.note
                ),
            );
        }
        self.outcomes.push(outcome);

        let progress = self.progress;
        self.outlets
            .snapshot
            .send_modify(|snapshot| snapshot.progress = progress);
        let _ = self.outlets.events.send(DispatchEvent::Progress(progress));
    }
}
