//! Durable record of what a dispatch run did.
//!
//! The ledger keeps two things:
//! - one row per recipient outcome, appended as the run progresses
//! - one summary per finished run, in a history capped at
//!   [`SUMMARY_HISTORY_LIMIT`] entries
//!
//! It also owns the draft store used by the presentation layer to keep unsent
//! work across restarts.

pub mod backends;
pub mod config;
pub mod draft;
pub mod error;
pub mod ledger;

pub use backends::{FileLedger, MemoryLedger};
pub use config::LedgerConfig;
pub use draft::{DraftStore, FileDraftStore, MemoryDraftStore};
pub use error::{LedgerError, Result, SerializationError, ValidationError};
pub use ledger::{Ledger, OutcomeRecord, OutcomeStatus};

/// Number of run summaries retained; the oldest is evicted first
pub const SUMMARY_HISTORY_LIMIT: usize = 50;
