//! Persistent job scheduler.
//!
//! Jobs are persisted before they are queued. A fixed number of async workers
//! pop the highest-priority job, mark it running, and hand it to a
//! [`JobRunner`] on a blocking thread; the outcome (transcript file, quality
//! report, error) is written back to the store. On startup, jobs left running
//! by a previous process are reset to pending and re-queued.

mod cleanup;
mod progress_worker;
mod queue;
mod runner;
mod service;
mod worker;

pub use queue::{JobQueue, QueuedJob};
pub use runner::{JobContext, JobOutcome, JobRunner, PipelineRunner};
pub use service::{JobScheduler, JobStatusView, QueueStatus, SchedulerConfig, SchedulerError};
