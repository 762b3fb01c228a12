//! Load/save contract for unsent drafts.
//!
//! A draft store holds at most one draft. Unreadable drafts are treated as
//! absent: losing a draft is preferable to refusing to start.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use herald_common::{Draft, internal};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::fs;

use crate::Result;

#[async_trait]
pub trait DraftStore: Send + Sync + std::fmt::Debug {
    /// The saved draft, if there is one worth restoring
    ///
    /// # Errors
    /// If the store cannot be read for reasons other than the draft being
    /// absent or malformed
    async fn load(&self) -> Result<Option<Draft>>;

    /// Replace the saved draft
    ///
    /// # Errors
    /// If the draft cannot be written
    async fn save(&self, draft: &Draft) -> Result<()>;
}

/// Draft kept in a single JSON file, replaced atomically on save
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl Default for FileDraftStore {
    fn default() -> Self {
        Self::new("./herald-data/draft.json")
    }
}

impl FileDraftStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn load(&self) -> Result<Option<Draft>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let content = fs::read(&self.path).await?;
        match serde_json::from_slice::<Draft>(&content) {
            Ok(draft) if draft.is_empty() => Ok(None),
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                internal!(
                    level = WARN,
                    "Ignoring unreadable draft {}: {e}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, draft: &Draft) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(draft)?;
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");

        fs::write(&temp, &content).await?;
        fs::rename(&temp, &self.path).await?;

        internal!(level = DEBUG, "Saved draft to {}", self.path.display());

        Ok(())
    }
}

/// Draft store that lives as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    draft: Arc<Mutex<Option<Draft>>>,
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load(&self) -> Result<Option<Draft>> {
        Ok(self.draft.lock().clone().filter(|d| !d.is_empty()))
    }

    async fn save(&self, draft: &Draft) -> Result<()> {
        *self.draft.lock() = Some(draft.clone());
        Ok(())
    }
}
