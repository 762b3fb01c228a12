pub mod draft;
pub mod logging;
pub mod message;
pub mod recipient;
pub mod run;

pub use draft::Draft;
pub use message::Message;
pub use recipient::{InvalidReason, InvalidRecipient, Normalized, RecipientId, normalize};
pub use run::{Outcome, Progress, RunId, RunState, RunSummary};
pub use tracing;
