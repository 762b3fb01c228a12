//! Text rendering for the terminal

use herald_common::{Normalized, RunState, RunSummary};
use herald_dispatch::{DispatchEvent, LogLevel};
use herald_ledger::{OutcomeRecord, OutcomeStatus};

/// Invalid entries listed by name before the rest are only counted
pub const INVALID_PREVIEW: usize = 5;

/// Pre-send description of a normalized batch
#[must_use]
pub fn batch_report(batch: &Normalized) -> Vec<String> {
    let mut lines = vec![batch.summary()];

    if !batch.is_clean() {
        lines.push("Invalid entries:".to_string());
        lines.extend(
            batch
                .invalid
                .iter()
                .take(INVALID_PREVIEW)
                .map(|entry| format!("  - {entry}")),
        );
        if batch.invalid.len() > INVALID_PREVIEW {
            lines.push(format!(
                "  ... and {} more",
                batch.invalid.len() - INVALID_PREVIEW
            ));
        }
    }

    lines
}

const fn tag(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO ",
        LogLevel::Success => "OK   ",
        LogLevel::Warning => "WARN ",
        LogLevel::Error => "ERROR",
        LogLevel::Debug => "DEBUG",
    }
}

/// One line per event worth showing; `None` for events that are not
#[must_use]
pub fn render_event(event: &DispatchEvent, verbose: bool) -> Option<String> {
    match event {
        DispatchEvent::Log {
            level: LogLevel::Debug,
            ..
        } if !verbose => None,
        DispatchEvent::Log { level, text } => Some(format!("[{}] {text}", tag(*level))),
        DispatchEvent::Progress(progress) => Some(format!(
            "Progress: {}/{} ({:.0}%), sent {}, failed {}",
            progress.processed,
            progress.total,
            progress.percent(),
            progress.succeeded,
            progress.failed
        )),
        DispatchEvent::State(state) if verbose => Some(format!("State: {state}")),
        DispatchEvent::State(_) => None,
        DispatchEvent::Terminal { summary, error, .. } => {
            let text = render_summary(summary);
            Some(match error {
                Some(error) => format!("{text}\nError: {error}"),
                None => text,
            })
        }
    }
}

#[must_use]
pub fn render_summary(summary: &RunSummary) -> String {
    let headline = match summary.state {
        RunState::Completed => "Run completed",
        RunState::Cancelled => "Run stopped by operator",
        RunState::Failed => "Run failed",
        _ => "Run ended",
    };

    format!(
        "{headline}\n  Total: {}\n  Processed: {}\n  Sent: {}\n  Failed: {}\n  Success rate: {:.1}%",
        summary.total, summary.processed, summary.succeeded, summary.failed, summary.success_rate
    )
}

#[must_use]
pub fn render_outcome(record: &OutcomeRecord) -> String {
    let status = match record.status {
        OutcomeStatus::Ok => "OK",
        OutcomeStatus::Failed => "FAILED",
    };

    format!(
        "{} {status:<6} {} attempts={} {}",
        record.time.format("%Y-%m-%d %H:%M:%S"),
        record.recipient,
        record.attempts,
        record.note
    )
}

#[cfg(test)]
mod tests {
    use herald_common::{Progress, RunId, normalize};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn short_batch_lists_every_invalid_entry() {
        let lines = batch_report(&normalize("9876543210, 123"));
        assert_eq!(
            lines,
            vec![
                "1 valid, 1 invalid (2 total)",
                "Invalid entries:",
                "  - 123 (too short: 3 digits)",
            ]
        );
    }

    #[test]
    fn long_batch_is_truncated() {
        let lines = batch_report(&normalize("1, 2, 3, 4, 5, 6, 7, 9876543210"));

        assert_eq!(lines.len(), 2 + INVALID_PREVIEW + 1);
        assert_eq!(lines.last().map(String::as_str), Some("  ... and 2 more"));
    }

    #[test]
    fn clean_batch_is_one_line() {
        assert_eq!(
            batch_report(&normalize("9876543210")),
            vec!["1 recipients (all valid)"]
        );
    }

    #[test]
    fn debug_lines_need_verbose() {
        let event = DispatchEvent::Log {
            level: LogLevel::Debug,
            text: "Waiting 6s".to_string(),
        };

        assert_eq!(render_event(&event, false), None);
        assert_eq!(
            render_event(&event, true),
            Some("[DEBUG] Waiting 6s".to_string())
        );
    }

    #[test]
    fn progress_line() {
        let mut progress = Progress::new(4);
        progress.record(true);
        progress.record(false);

        assert_eq!(
            render_event(&DispatchEvent::Progress(progress), false),
            Some("Progress: 2/4 (50%), sent 1, failed 1".to_string())
        );
    }

    #[test]
    fn summary_block() {
        let mut progress = Progress::new(3);
        progress.record(true);
        progress.record(true);
        progress.record(false);
        let summary = RunSummary::new(RunId::generate(), RunState::Completed, progress);

        assert_eq!(
            render_summary(&summary),
            "Run completed\n  Total: 3\n  Processed: 3\n  Sent: 2\n  Failed: 1\n  Success rate: 66.7%"
        );
    }
}
