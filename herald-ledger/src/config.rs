use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{FileLedger, Ledger, MemoryLedger, Result};

/// Configuration for the ledger backend
///
/// File-backed ledger in RON config:
/// ```ron
/// Herald (
///     ledger: File(
///         path: "/var/lib/herald",
///     ),
/// )
/// ```
///
/// Memory-backed ledger (nothing survives the process):
/// ```ron
/// Herald (
///     ledger: Memory,
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum LedgerConfig {
    /// File-based ledger (production)
    File { path: PathBuf },
    /// Memory-based ledger (testing/dry runs)
    Memory,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::File {
            path: FileLedger::default().path().to_path_buf(),
        }
    }
}

impl LedgerConfig {
    /// Directory of a file-backed ledger, `None` for the memory backend
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Memory => None,
        }
    }

    /// Initialise the configured backend and hand it out as a trait object
    ///
    /// # Errors
    /// If a file-backed ledger path is rejected, or its directory cannot be
    /// created
    pub async fn into_ledger(self) -> Result<Arc<dyn Ledger>> {
        match self {
            Self::File { path } => {
                let ledger = FileLedger::builder().path(path).build()?;
                ledger.init().await?;
                Ok(Arc::new(ledger))
            }
            Self::Memory => Ok(Arc::new(MemoryLedger::new())),
        }
    }
}
