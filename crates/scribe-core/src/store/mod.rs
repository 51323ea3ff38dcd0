//! Persistent job store (SQLite via sqlx).
//!
//! Holds one row per submitted job: source, engine preference, options,
//! priority, status, progress, and the result (engine used, quality report,
//! transcript path, error). Every mutation is a single-row `UPDATE` so the
//! scheduler's recovery and cleanup sweeps can read concurrently.

mod db;
mod types;

mod jobs {
    mod read;
    mod write;
}

pub use db::JobDb;
pub(crate) use db::unix_timestamp;
pub use types::{JobId, JobRecord, JobStatus, NewJob, UnknownStatus};

#[cfg(test)]
pub(crate) use db::open_memory;
