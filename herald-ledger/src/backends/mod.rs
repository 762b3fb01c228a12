mod file;
mod memory;

pub use file::{FileLedger, FileLedgerBuilder, OUTCOME_LOG, SUMMARY_FILE};
pub use memory::MemoryLedger;
