use std::{
    io::SeekFrom,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use herald_common::{Message, Outcome, RunId, RunSummary, internal};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    Ledger, OutcomeRecord, Result, SUMMARY_HISTORY_LIMIT, ValidationError,
    error::LedgerError,
};

/// Outcome log file name, one JSON object per line
pub const OUTCOME_LOG: &str = "sent_log.jsonl";

/// Summary history file name, a JSON array
pub const SUMMARY_FILE: &str = "session_stats.json";

const TEMP_PREFIX: &str = ".tmp_";

/// File-based ledger
///
/// Layout inside the ledger directory:
/// - `sent_log.jsonl` - outcome rows, appended one line per write
/// - `session_stats.json` - summary history, rewritten on every append
///
/// # Atomicity
/// Outcome rows are serialized in full and handed to a single `write_all` on a
/// file opened in append mode, then synced. A crash mid-write can leave a torn
/// final line; readers skip it with a warning and every earlier row stays
/// intact. The next append terminates the torn line first so the new row
/// starts on a line of its own.
///
/// The summary history is rewritten with the "write to temp, then rename"
/// pattern, so readers see either the old or the new history, never a mix.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
    history_lock: Arc<Mutex<()>>,
    /// Held across the torn-tail check and the append
    log_lock: Arc<Mutex<()>>,
}

impl Default for FileLedger {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./herald-data"),
            history_lock: Arc::default(),
            log_lock: Arc::default(),
        }
    }
}

impl FileLedger {
    /// Validate a ledger path
    ///
    /// Rejects `..` components and paths inside system directories.
    fn validate_path(path: &Path) -> std::result::Result<(), ValidationError> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ValidationError::ParentTraversal(path.display().to_string()));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        for prefix in sensitive_prefixes {
            if path.starts_with(prefix) {
                return Err(ValidationError::SystemDirectory {
                    prefix,
                    path: path.display().to_string(),
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn builder() -> FileLedgerBuilder {
        FileLedgerBuilder::default()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn outcome_log(&self) -> PathBuf {
        self.path.join(OUTCOME_LOG)
    }

    fn summary_file(&self) -> PathBuf {
        self.path.join(SUMMARY_FILE)
    }

    /// Create the ledger directory if needed and remove temp files left
    /// behind by a crash during a summary rewrite.
    ///
    /// # Errors
    /// - If the directory cannot be created or read
    /// - If the path exists but is not a directory
    pub async fn init(&self) -> Result<()> {
        internal!("Initialising ledger at {}", self.path.display());

        if !fs::try_exists(&self.path).await? {
            internal!("{} does not exist, creating...", self.path.display());
            fs::create_dir_all(&self.path).await?;
        } else if !fs::metadata(&self.path).await?.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        let mut entries = fs::read_dir(&self.path).await?;
        let mut cleaned = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                fs::remove_file(entry.path()).await?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned temp files from ledger"
            );
        }

        Ok(())
    }

    async fn read_history(&self) -> Result<Vec<RunSummary>> {
        let path = self.summary_file();
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }

        let content = fs::read(&path).await?;
        match serde_json::from_slice::<Vec<RunSummary>>(&content) {
            Ok(history) => Ok(history),
            Err(e) => {
                internal!(
                    level = WARN,
                    "Summary history {} is unreadable ({e}), starting a new history",
                    path.display()
                );
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn append_outcome(
        &self,
        run_id: RunId,
        outcome: &Outcome,
        message: &Message,
    ) -> Result<()> {
        let record = OutcomeRecord::new(run_id, outcome, message);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.log_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.outcome_log())
            .await?;

        if ends_mid_line(&mut file).await? {
            internal!(
                level = WARN,
                "Outcome log ends with a torn row, terminating it before appending"
            );
            line.insert(0, b'\n');
        }
        file.write_all(&line).await?;
        file.sync_data().await?;

        internal!(
            level = DEBUG,
            "Recorded outcome for {} in run {run_id}",
            record.recipient
        );

        Ok(())
    }

    async fn append_summary(&self, summary: &RunSummary) -> Result<()> {
        let _guard = self.history_lock.lock().await;

        let mut history = self.read_history().await?;
        history.push(summary.clone());
        if history.len() > SUMMARY_HISTORY_LIMIT {
            let excess = history.len() - SUMMARY_HISTORY_LIMIT;
            history.drain(..excess);
        }

        let content = serde_json::to_vec_pretty(&history)?;
        let path = self.summary_file();
        let temp = self.path.join(format!("{TEMP_PREFIX}{SUMMARY_FILE}"));

        fs::write(&temp, &content).await?;
        fs::rename(&temp, &path).await?;

        internal!(
            level = DEBUG,
            "Saved summary for run {} ({} in history)",
            summary.run_id,
            history.len()
        );

        Ok(())
    }

    async fn outcomes(&self) -> Result<Vec<OutcomeRecord>> {
        let path = self.outcome_log();
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }

        // Read bytes rather than text: a torn row may end inside a multi-byte
        // character, which must not make the whole log unreadable
        let content = fs::read(&path).await?;
        let mut records = Vec::new();

        for (number, line) in content.split(|&b| b == b'\n').enumerate() {
            if line.trim_ascii().is_empty() {
                continue;
            }

            match serde_json::from_slice::<OutcomeRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    internal!(
                        level = WARN,
                        "Skipping unreadable outcome row {} in {}: {e}",
                        number + 1,
                        path.display()
                    );
                }
            }
        }

        Ok(records)
    }

    async fn summaries(&self) -> Result<Vec<RunSummary>> {
        self.read_history().await
    }
}

/// Whether a non-empty file lacks a trailing newline
async fn ends_mid_line(file: &mut fs::File) -> Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

/// Builder for `FileLedger`
#[derive(Debug, Default)]
pub struct FileLedgerBuilder {
    path: PathBuf,
}

impl FileLedgerBuilder {
    /// Set the ledger directory path
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Build the final `FileLedger`
    ///
    /// # Errors
    /// Returns an error if the path is invalid or points somewhere dangerous
    pub fn build(self) -> Result<FileLedger> {
        FileLedger::validate_path(&self.path).map_err(LedgerError::from)?;
        Ok(FileLedger {
            path: self.path,
            history_lock: Arc::default(),
            log_lock: Arc::default(),
        })
    }
}
