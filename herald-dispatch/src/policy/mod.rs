//! Policies that shape how a run behaves.

pub mod retry;

pub use retry::{FailureKind, RetryPolicy};
