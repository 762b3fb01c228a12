//! Retry policy for send attempts.
//!
//! Every recipient gets up to `max_attempts` sends. Between attempts the
//! worker waits a fixed backoff; there is no growth and no jitter, since a
//! run talks to exactly one channel and sends strictly in sequence.

use std::time::Duration;

/// Broad category of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The channel refused the send
    Rejected,
    /// The transport failed underneath the send
    Transport,
}

/// Retry policy for send attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: defaults::backoff(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// Pause between two attempts for the same recipient
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Check if another attempt should be made after `attempts` have failed.
    ///
    /// Both kinds of failure are retried while attempts remain.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32, max_attempts: u32, kind: FailureKind) -> bool {
        match kind {
            FailureKind::Rejected | FailureKind::Transport => attempts < max_attempts,
        }
    }
}

mod defaults {
    use std::time::Duration;

    pub const fn backoff() -> Duration {
        Duration::from_secs(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(RetryPolicy::default().backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(1, 2, FailureKind::Rejected));
        assert!(policy.should_retry(1, 2, FailureKind::Transport));
        assert!(!policy.should_retry(2, 2, FailureKind::Rejected));
        assert!(!policy.should_retry(2, 2, FailureKind::Transport));
        assert!(!policy.should_retry(1, 1, FailureKind::Rejected));
    }

    #[test]
    fn test_custom_backoff() {
        let policy = RetryPolicy::new(Duration::from_millis(10));
        assert_eq!(policy.backoff(), Duration::from_millis(10));
    }
}
