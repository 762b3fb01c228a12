//! Configuration file handling.
//!
//! ```ron
//! Herald (
//!     ledger: File(path: "./herald-data"),
//!     drafts: "./herald-data/draft.json",
//!     transport: Command(
//!         program: "wa-helper",
//!         open_args: ["open", "--profile", "{profile}"],
//!         send_args: ["send", "{recipient}"],
//!         fallback_to_default_profile: true,
//!     ),
//!     dispatch: (profile: Named("work"), ready_timeout_secs: 60),
//!     run: (delay_between_sends_secs: 6, max_attempts: 2),
//! )
//! ```

use std::path::{Path, PathBuf};

use herald_dispatch::{DispatchSettings, RunConfig, transport::CommandTransport};
use herald_ledger::{FileDraftStore, LedgerConfig};
use serde::Deserialize;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "HERALD_CONFIG";

/// How messages leave the process
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum TransportConfig {
    /// Log what would be sent without contacting any channel
    DryRun {
        #[serde(default)]
        latency_millis: u64,
    },
    /// Drive an external helper program
    Command {
        program: PathBuf,
        #[serde(default)]
        open_args: Vec<String>,
        #[serde(default)]
        ready_args: Vec<String>,
        #[serde(default)]
        send_args: Option<Vec<String>>,
        #[serde(default)]
        send_timeout_secs: Option<u64>,
        /// Reopen on the helper's default profile when the configured profile
        /// is unavailable
        #[serde(default)]
        fallback_to_default_profile: bool,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::DryRun { latency_millis: 0 }
    }
}

impl TransportConfig {
    /// The helper described by a `Command` transport
    #[must_use]
    pub fn helper(&self) -> Option<CommandTransport> {
        match self {
            Self::DryRun { .. } => None,
            Self::Command {
                program,
                open_args,
                ready_args,
                send_args,
                send_timeout_secs,
                ..
            } => {
                let mut helper = CommandTransport::new(program)
                    .with_open_args(open_args.iter().cloned())
                    .with_ready_args(ready_args.iter().cloned());
                if let Some(args) = send_args {
                    helper = helper.with_send_args(args.iter().cloned());
                }
                if let Some(secs) = send_timeout_secs {
                    helper = helper.with_send_timeout(*secs);
                }
                Some(helper)
            }
        }
    }
}

/// Top level configuration
#[derive(Debug, Default, Deserialize)]
pub struct Herald {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub drafts: FileDraftStore,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Defaults for every run; command line flags override them
    #[serde(default)]
    pub run: RunConfig,
}

impl Herald {
    /// Load the configuration file, falling back to built-in defaults when
    /// there is none.
    ///
    /// # Errors
    /// If `HERALD_CONFIG` names a missing file, or the file found cannot be
    /// read or parsed
    pub fn load() -> anyhow::Result<(Self, Option<PathBuf>)> {
        match find_config_file()? {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// # Errors
    /// If the file cannot be read or parsed
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
    }
}

/// Find the configuration file using the following precedence:
/// 1. `HERALD_CONFIG` environment variable
/// 2. ./herald.config.ron (current working directory)
/// 3. /etc/herald/herald.config.ron (system-wide config)
///
/// # Errors
/// If `HERALD_CONFIG` is set to a path that does not exist
pub fn find_config_file() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./herald.config.ron"),
        PathBuf::from("/etc/herald/herald.config.ron"),
    ];

    Ok(default_paths.into_iter().find(|path| path.exists()))
}
