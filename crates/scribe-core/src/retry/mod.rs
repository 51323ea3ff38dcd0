//! Engine error taxonomy, classification and retry/backoff policy.
//!
//! Engines report failures as [`EngineError`]. Structured variants carry their
//! [`ErrorKind`] directly; opaque messages from external tools are classified
//! by keyword. The policy then decides whether to retry on the same engine or
//! advance along the fallback chain.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_message, MEMORY_KEYWORDS, NETWORK_KEYWORDS};
pub use error::EngineError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Attempt, Exhausted};
