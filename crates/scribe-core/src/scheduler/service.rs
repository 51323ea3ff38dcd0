use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

use super::cleanup::{run_cleanup_loop, sweep};
use super::queue::JobQueue;
use super::runner::JobRunner;
use super::worker::run_worker;
use crate::control::JobControl;
use crate::engine::JobOptions;
use crate::fallback::QualityReport;
use crate::store::{JobDb, JobId, JobRecord, JobStatus, NewJob};

/// How often a running job's store status is checked for external cancellation.
const STATUS_POLL: Duration = Duration::from_millis(500);

const IDLE_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Jobs run at once (at least 1).
    pub max_concurrent_jobs: usize,
    /// Completed jobs older than this are removed by the cleanup sweep.
    pub cleanup_after: Duration,
    pub cleanup_interval: Duration,
    pub auto_cleanup: bool,
    /// Where merged transcripts are written (`job-<id>.txt`).
    pub transcript_dir: PathBuf,
}

impl SchedulerConfig {
    pub fn new(transcript_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_concurrent_jobs: 3,
            cleanup_after: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(30),
            auto_cleanup: true,
            transcript_dir: transcript_dir.into(),
        }
    }
}

/// Scheduler-level failure. Job failures are recorded on the job instead.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job store failure: {0:#}")]
    Store(anyhow::Error),
    #[error("scheduler task failed: {0}")]
    Join(String),
}

impl From<anyhow::Error> for SchedulerError {
    fn from(e: anyhow::Error) -> Self {
        SchedulerError::Store(e)
    }
}

/// Caller-facing view of one job.
#[derive(Debug, Clone)]
pub struct JobStatusView {
    pub id: JobId,
    pub source_ref: String,
    pub status: JobStatus,
    pub progress: f64,
    pub engine_used: Option<String>,
    pub quality_report: Option<QualityReport>,
    pub error: Option<String>,
    pub output_path: Option<PathBuf>,
}

impl From<JobRecord> for JobStatusView {
    fn from(r: JobRecord) -> Self {
        Self {
            id: r.id,
            source_ref: r.source_ref,
            status: r.status,
            progress: r.progress,
            engine_used: r.engine_used,
            quality_report: r.quality_report,
            error: r.error_message,
            output_path: r.output_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub queued: usize,
    pub active: usize,
    pub max_concurrent: usize,
    /// In dequeue order.
    pub queued_ids: Vec<JobId>,
    pub active_ids: Vec<JobId>,
}

/// State shared by the scheduler handle, its workers and the cleanup task.
pub(super) struct Shared {
    pub(super) db: JobDb,
    pub(super) queue: JobQueue,
    pub(super) control: JobControl,
    pub(super) runner: Arc<dyn JobRunner>,
    pub(super) transcript_dir: PathBuf,
    pub(super) auto_cleanup: AtomicBool,
    pub(super) cleanup_after_secs: AtomicU64,
    pub(super) shutdown_tx: watch::Sender<bool>,
    pub(super) progress_poll: Duration,
}

/// Persistent priority job scheduler with a fixed pool of job workers.
pub struct JobScheduler {
    shared: Arc<Shared>,
    max_concurrent: usize,
    cleanup_interval: Duration,
    started: AtomicBool,
    tasks: Mutex<JoinSet<Result<(), SchedulerError>>>,
}

impl JobScheduler {
    /// Restore persisted work without starting any workers.
    ///
    /// Jobs left `running` by a previous process go back to `pending`; every
    /// pending job is then queued exactly once.
    pub async fn new(db: JobDb, runner: Arc<dyn JobRunner>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let (shutdown_tx, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            db,
            queue: JobQueue::new(),
            control: JobControl::new(),
            runner,
            transcript_dir: config.transcript_dir,
            auto_cleanup: AtomicBool::new(config.auto_cleanup),
            cleanup_after_secs: AtomicU64::new(config.cleanup_after.as_secs()),
            shutdown_tx,
            progress_poll: STATUS_POLL,
        });
        let scheduler = Self {
            shared,
            max_concurrent: config.max_concurrent_jobs.max(1),
            cleanup_interval: config.cleanup_interval.max(Duration::from_secs(1)),
            started: AtomicBool::new(false),
            tasks: Mutex::new(JoinSet::new()),
        };
        scheduler.restore().await?;
        Ok(scheduler)
    }

    /// Restore, then start the job workers and the cleanup task.
    pub async fn start(db: JobDb, runner: Arc<dyn JobRunner>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let scheduler = Self::new(db, runner, config).await?;
        scheduler.spawn_workers().await;
        Ok(scheduler)
    }

    async fn restore(&self) -> Result<(), SchedulerError> {
        let demoted = self.shared.db.demote_running_jobs().await?;
        let queued = self.requeue_pending().await?;
        if demoted > 0 || queued > 0 {
            tracing::info!(demoted, queued, "restored jobs from store");
        }
        Ok(())
    }

    /// Queue pending jobs found in the store that are not queued yet
    /// (e.g. added by another process). Returns how many were queued.
    pub async fn requeue_pending(&self) -> Result<usize, SchedulerError> {
        let pending = self.shared.db.list_by_status(&[JobStatus::Pending]).await?;
        let mut queued = 0;
        for job in &pending {
            if self.shared.queue.push(job.id, job.priority) {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Start workers. Calling it again has no effect.
    pub async fn spawn_workers(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut tasks = self.tasks.lock().await;
        for worker in 0..self.max_concurrent {
            let shared = Arc::clone(&self.shared);
            let shutdown = self.shared.shutdown_tx.subscribe();
            tasks.spawn(run_worker(worker, shared, shutdown));
        }
        let shared = Arc::clone(&self.shared);
        let shutdown = self.shared.shutdown_tx.subscribe();
        let period = self.cleanup_interval;
        tasks.spawn(async move {
            run_cleanup_loop(shared, period, shutdown).await;
            Ok(())
        });
        tracing::info!(workers = self.max_concurrent, "scheduler started");
    }

    /// Persist a new pending job, then queue it.
    pub async fn submit(
        &self,
        source_ref: impl Into<String>,
        engine_chain: Vec<String>,
        options: JobOptions,
        priority: i32,
    ) -> Result<JobId, SchedulerError> {
        let job = NewJob {
            source_ref: source_ref.into(),
            engine_chain,
            options,
            priority,
        };
        let id = self.shared.db.add_job(&job).await?;
        self.shared.queue.push(id, priority);
        tracing::info!(job_id = id, source = %job.source_ref, priority, "job submitted");
        Ok(id)
    }

    pub async fn get_status(&self, id: JobId) -> Result<Option<JobStatusView>, SchedulerError> {
        Ok(self.shared.db.get_job(id).await?.map(JobStatusView::from))
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobStatusView>, SchedulerError> {
        let jobs = self.shared.db.list_jobs().await?;
        Ok(jobs.into_iter().map(JobStatusView::from).collect())
    }

    /// Cancel a pending or running job. Returns false if it was already terminal or unknown.
    ///
    /// A running job stops at its next chunk boundary.
    pub async fn cancel(&self, id: JobId) -> Result<bool, SchedulerError> {
        if !self.shared.db.set_status(id, JobStatus::Cancelled).await? {
            return Ok(false);
        }
        self.shared.queue.remove(id);
        let was_running = self.shared.control.request_cancel(id);
        tracing::info!(job_id = id, was_running, "job cancelled");
        Ok(true)
    }

    /// Delete a job and its transcript. A running job is cancelled first.
    pub async fn remove(&self, id: JobId) -> Result<bool, SchedulerError> {
        let Some(job) = self.shared.db.get_job(id).await? else {
            return Ok(false);
        };
        if job.status == JobStatus::Running {
            self.cancel(id).await?;
        }
        self.shared.queue.remove(id);
        if let Some(path) = &job.output_path {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(job_id = id, "failed to remove {}: {}", path.display(), e);
                }
            }
        }
        Ok(self.shared.db.remove_job(id).await?)
    }

    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.shared.queue.len(),
            active: self.shared.queue.active(),
            max_concurrent: self.max_concurrent,
            queued_ids: self.shared.queue.snapshot_ids(),
            active_ids: self.shared.control.running_ids(),
        }
    }

    pub fn queued_job_ids(&self) -> Vec<JobId> {
        self.shared.queue.snapshot_ids()
    }

    pub fn set_auto_cleanup(&self, enabled: bool) {
        self.shared.auto_cleanup.store(enabled, Ordering::Relaxed);
    }

    pub fn set_cleanup_after(&self, retention: Duration) {
        self.shared.cleanup_after_secs.store(retention.as_secs(), Ordering::Relaxed);
    }

    /// Run one cleanup sweep now, regardless of `auto_cleanup`.
    pub async fn cleanup_once(&self) -> Result<usize, SchedulerError> {
        Ok(sweep(&self.shared).await?)
    }

    /// Wait until nothing is queued or running, or the scheduler is shutting down.
    /// Only returns for an empty queue once workers have been started.
    pub async fn wait_idle(&self) {
        let mut shutdown = self.shared.shutdown_tx.subscribe();
        loop {
            if *shutdown.borrow() {
                return;
            }
            if self.shared.queue.is_empty() && self.shared.queue.active() == 0 {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(IDLE_POLL) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// Ask workers to stop after their current job.
    pub fn request_shutdown(&self) {
        self.shared.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shared.shutdown_tx.borrow()
    }

    /// Wait for every worker to exit. Returns the first fatal error, if any.
    pub async fn wait(&self) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.lock().await;
        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(SchedulerError::Join(e.to_string())));
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Graceful shutdown: running jobs finish, queued jobs stay pending in the store.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.request_shutdown();
        self.wait().await
    }

    pub fn db(&self) -> &JobDb {
        &self.shared.db
    }
}
