#![allow(clippy::expect_used)]

use std::io::Write;

use herald_common::{Draft, Message, Outcome, Progress, RecipientId, RunId, RunState, RunSummary};
use herald_ledger::{
    DraftStore, FileDraftStore, FileLedger, Ledger, LedgerConfig, OutcomeStatus,
    SUMMARY_HISTORY_LIMIT, backends::OUTCOME_LOG,
};
use pretty_assertions::assert_eq;

fn recipient(value: &str) -> RecipientId {
    RecipientId::parse(value).expect("valid recipient")
}

async fn ledger_in(dir: &tempfile::TempDir) -> FileLedger {
    let ledger = FileLedger::builder()
        .path(dir.path().join("ledger"))
        .build()
        .expect("ledger path");
    ledger.init().await.expect("init");
    ledger
}

#[tokio::test]
async fn outcomes_are_read_back_in_append_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;
    let run_id = RunId::generate();
    let message = Message::from("Hello");

    let first = Outcome::success(recipient("919876543210"), 1);
    let second = Outcome::failure(recipient("919876543211"), 2, "Send button not found");

    ledger
        .append_outcome(run_id, &first, &message)
        .await
        .expect("append first");
    ledger
        .append_outcome(run_id, &second, &message)
        .await
        .expect("append second");

    let rows = ledger.outcomes().await.expect("read outcomes");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].recipient.as_str(), "919876543210");
    assert_eq!(rows[0].status, OutcomeStatus::Ok);
    assert_eq!(rows[0].note, "Sent successfully");
    assert_eq!(rows[1].status, OutcomeStatus::Failed);
    assert_eq!(rows[1].attempts, 2);
    assert_eq!(rows[1].message, "Hello");
    assert!(rows.iter().all(|row| row.run_id == run_id));
}

#[tokio::test]
async fn torn_trailing_row_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;
    let run_id = RunId::generate();

    ledger
        .append_outcome(
            run_id,
            &Outcome::success(recipient("919876543210"), 1),
            &Message::from("Hi"),
        )
        .await
        .expect("append");

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(ledger.path().join(OUTCOME_LOG))
        .expect("open log");
    file.write_all(br#"{"time":"2024-01-01T00:00:00Z","run_id":"#)
        .expect("write torn row");

    let rows = ledger.outcomes().await.expect("read outcomes");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].succeeded());
}

#[tokio::test]
async fn append_after_torn_row_starts_a_new_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;
    let run_id = RunId::generate();
    let message = Message::from("Hi");

    ledger
        .append_outcome(run_id, &Outcome::success(recipient("919876543210"), 1), &message)
        .await
        .expect("append before crash");

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(ledger.path().join(OUTCOME_LOG))
        .expect("open log");
    file.write_all(br#"{"time":"2024-01-01T00:00:00Z","run_id":"#)
        .expect("write torn row");
    drop(file);

    let reopened = ledger_in(&dir).await;
    reopened
        .append_outcome(run_id, &Outcome::success(recipient("919876543211"), 1), &message)
        .await
        .expect("append after crash");

    let rows = reopened.outcomes().await.expect("read outcomes");
    let recipients: Vec<_> = rows.iter().map(|r| r.recipient.as_str()).collect();
    assert_eq!(recipients, vec!["919876543210", "919876543211"]);
}

#[tokio::test]
async fn row_torn_inside_a_multibyte_character_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;

    ledger
        .append_outcome(
            RunId::generate(),
            &Outcome::success(recipient("919876543210"), 1),
            &Message::from("नमस्ते"),
        )
        .await
        .expect("append");

    let torn = r#"{"message":"नमस्ते"#.as_bytes();
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(ledger.path().join(OUTCOME_LOG))
        .expect("open log");
    file.write_all(&torn[..torn.len() - 1])
        .expect("write torn row");

    let rows = ledger.outcomes().await.expect("read outcomes");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].message, "नमस्ते");
}

#[tokio::test]
async fn summary_history_evicts_oldest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;

    let mut ids = Vec::new();
    for total in 0..=SUMMARY_HISTORY_LIMIT {
        let run_id = RunId::generate();
        ids.push(run_id);
        ledger
            .append_summary(&RunSummary::new(
                run_id,
                RunState::Completed,
                Progress::new(total),
            ))
            .await
            .expect("append summary");
    }

    let history = ledger.summaries().await.expect("read history");
    assert_eq!(history.len(), SUMMARY_HISTORY_LIMIT);
    assert_eq!(history[0].run_id, ids[1]);
    assert_eq!(history.last().map(|s| s.run_id), ids.last().copied());
}

#[tokio::test]
async fn init_removes_orphaned_temp_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;
    let orphan = ledger.path().join(".tmp_session_stats.json");
    std::fs::write(&orphan, b"[").expect("write orphan");

    ledger.init().await.expect("re-init");

    assert!(!orphan.exists());
}

#[tokio::test]
async fn unreadable_history_starts_over() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = ledger_in(&dir).await;
    std::fs::write(ledger.path().join("session_stats.json"), b"not json").expect("write");

    assert!(ledger.summaries().await.expect("read").is_empty());

    ledger
        .append_summary(&RunSummary::new(
            RunId::generate(),
            RunState::Cancelled,
            Progress::new(4),
        ))
        .await
        .expect("append");
    assert_eq!(ledger.summaries().await.expect("read").len(), 1);
}

#[tokio::test]
async fn config_builds_file_ledger() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = LedgerConfig::File {
        path: dir.path().join("from-config"),
    };

    let ledger = config.into_ledger().await.expect("ledger");
    assert!(dir.path().join("from-config").is_dir());
    assert!(ledger.outcomes().await.expect("read").is_empty());
}

#[tokio::test]
async fn draft_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileDraftStore::new(dir.path().join("nested").join("draft.json"));

    assert_eq!(store.load().await.expect("load"), None);

    let draft = Draft::new("Meeting at 5", "9876543210, 9876543211");
    store.save(&draft).await.expect("save");

    let loaded = store.load().await.expect("load").expect("draft present");
    assert_eq!(loaded.message, draft.message);
    assert_eq!(loaded.recipients, draft.recipients);
}

#[tokio::test]
async fn empty_or_malformed_draft_is_absent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("draft.json");
    let store = FileDraftStore::new(&path);

    store.save(&Draft::new("", "  ")).await.expect("save");
    assert_eq!(store.load().await.expect("load"), None);

    std::fs::write(&path, b"{ broken").expect("write");
    assert_eq!(store.load().await.expect("load"), None);
}

#[tokio::test]
async fn legacy_draft_keys_are_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("draft.json");
    std::fs::write(
        &path,
        br#"{"message":"Hi","numbers":"9876543210","timestamp":"2024-05-01T10:00:00.123456"}"#,
    )
    .expect("write");

    let loaded = FileDraftStore::new(&path)
        .load()
        .await
        .expect("load")
        .expect("draft present");
    assert_eq!(loaded.message, "Hi");
    assert_eq!(loaded.recipients, "9876543210");
}
