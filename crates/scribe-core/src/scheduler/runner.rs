//! What a scheduler worker executes for one job.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::control::CancelToken;
use crate::engine::{EngineProfile, EngineRegistry};
use crate::executor::{ExecHooks, ProgressStats};
use crate::fallback::{FallbackEngine, FallbackSettings, Transcript};
use crate::media::MediaSource;
use crate::store::JobRecord;

/// Handed to a [`JobRunner`] on a blocking thread.
pub struct JobContext {
    pub job: JobRecord,
    pub cancel: CancelToken,
    progress_tx: mpsc::Sender<f64>,
}

impl JobContext {
    pub(crate) fn new(job: JobRecord, cancel: CancelToken, progress_tx: mpsc::Sender<f64>) -> Self {
        Self {
            job,
            cancel,
            progress_tx,
        }
    }

    /// Report overall job progress in percent. Dropped if the writer is behind.
    pub fn report_progress(&self, percent: f64) {
        let _ = self.progress_tx.try_send(percent);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Result of a job run: the merged transcript with its quality report.
pub type JobOutcome = Transcript;

/// Runs one job to completion. Called from `spawn_blocking`, so it may block.
///
/// Returning an error wrapping [`crate::control::JobCancelled`] marks the job cancelled;
/// any other error marks it failed.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, ctx: &JobContext) -> Result<JobOutcome>;
}

/// Probe the source duration, resolve the engine chain and run the fallback engine.
pub struct PipelineRunner {
    registry: Arc<EngineRegistry>,
    media: Arc<dyn MediaSource>,
    settings: FallbackSettings,
}

impl PipelineRunner {
    pub fn new(registry: Arc<EngineRegistry>, media: Arc<dyn MediaSource>, settings: FallbackSettings) -> Self {
        Self {
            registry,
            media,
            settings,
        }
    }
}

impl JobRunner for PipelineRunner {
    fn run(&self, ctx: &JobContext) -> Result<JobOutcome> {
        let job = &ctx.job;
        let chain = self.registry.chain_for(&job.engine_chain)?;
        let Some(primary) = chain.first() else {
            bail!("no engines registered");
        };
        let profile = self
            .registry
            .profile(primary.name())
            .cloned()
            .unwrap_or_else(|| EngineProfile::builtin(primary.name()));

        let duration_secs = self.media.duration_secs(&job.source_ref)?;
        tracing::info!(
            job_id = job.id,
            source = %job.source_ref,
            duration_secs,
            primary = primary.name(),
            "starting job"
        );

        let engine = FallbackEngine::new(chain, profile, self.settings.clone());
        let on_progress = |stats: &ProgressStats| ctx.report_progress(stats.percent());
        engine.transcribe(
            &job.source_ref,
            duration_secs,
            &job.options,
            ExecHooks {
                on_progress: Some(&on_progress),
                cancel: Some(&ctx.cancel),
            },
        )
    }
}
