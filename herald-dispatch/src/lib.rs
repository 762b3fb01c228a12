//! Bulk dispatch engine.
//!
//! A [`Controller`] accepts raw recipient text and a message, normalizes the
//! batch and runs it on a single worker task: open a session on the
//! [`Transport`], wait for it to become ready, then send to each recipient in
//! order with bounded retries and a cancellable delay between sends. Every
//! outcome and the final summary go to the [`herald_ledger::Ledger`], and the
//! caller observes the run through [`DispatchEvent`]s and snapshots.

mod controller;
mod error;
pub mod policy;
mod processor;
mod run;
pub mod transport;

pub use controller::Controller;
pub use error::{DispatchError, TransportError};
pub use policy::{FailureKind, RetryPolicy};
pub use run::{
    DispatchEvent, DispatchSettings, LogLevel, ReadinessPolicy, RunConfig, RunReport,
    RunSnapshot, RunTicket,
};
pub use transport::{ProfileSelector, Transport};
