//! Cooperative job cancellation: shared cancel tokens keyed by job id.
//!
//! When the scheduler starts a job it registers a token here and hands it to
//! the job runner. `JobScheduler::cancel` (or a status change observed in the
//! store) trips the token; the runner checks it between chunks and stops with
//! [`JobCancelled`]. In-flight engine calls are never interrupted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::store::JobId;

/// Error returned when a job is stopped because it was cancelled.
#[derive(Debug)]
pub struct JobCancelled;

impl std::fmt::Display for JobCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job cancelled")
    }
}

impl std::error::Error for JobCancelled {}

/// Shared flag checked at chunk and job boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Registry of job id -> cancel token for jobs currently executing.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<JobId, CancelToken>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running job; returns the token to pass to the runner.
    pub fn register(&self, job_id: JobId) -> CancelToken {
        let token = CancelToken::new();
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, token.clone());
        token
    }

    /// Unregister a job (call when the job finishes, success or failure).
    pub fn unregister(&self, job_id: JobId) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);
    }

    /// Request cancellation of a running job. Returns false if the job is not running here.
    pub fn request_cancel(&self, job_id: JobId) -> bool {
        match self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Ids of jobs currently registered as running.
    pub fn running_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_trips_registered_token_only() {
        let control = JobControl::new();
        let a = control.register(1);
        let b = control.register(2);
        assert!(control.request_cancel(1));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(control.running_ids(), vec![1, 2]);

        control.unregister(1);
        assert!(!control.request_cancel(1));
        assert_eq!(control.running_ids(), vec![2]);
    }
}
