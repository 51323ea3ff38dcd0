use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::control::JobCancelled;
use crate::engine::{Engine, EngineProfile, JobOptions, WorkUnit};
use crate::executor::{ExecHooks, ParallelExecutor, ProgressMonitor};
use crate::fallback::chunk::process_chunk_with_fallback;
use crate::fallback::report::{merge_annotated, QualityReport};
use crate::fallback::whole::process_whole;
use crate::planner::{adaptive_chunk_size, plan_chunks, WorkerBounds, DEFAULT_MIN_CHUNKS};
use crate::retry::RetryPolicy;

/// Tunables for one transcription run.
#[derive(Debug, Clone)]
pub struct FallbackSettings {
    pub retry: RetryPolicy,
    pub bounds: WorkerBounds,
    /// Inputs shorter than this go through the whole-input path.
    pub whole_job_threshold_secs: f64,
    /// Chunk length when no target worker count is set and the primary
    /// engine's profile does not chunk.
    pub default_chunk_secs: u64,
    pub max_chunk_secs: u64,
    /// Derive the chunk length from this many workers instead of the profile.
    pub target_workers: Option<usize>,
    pub progress_interval: Duration,
    /// Fixed memory figure for worker allocation; `None` queries the system.
    pub available_memory: Option<u64>,
}

impl FallbackSettings {
    /// Chunk length for the chunked path: adaptive when `target_workers` is set,
    /// otherwise the profile's own chunk length.
    pub fn chunk_secs_for(&self, duration_secs: f64, profile: &EngineProfile) -> u64 {
        match self.target_workers {
            Some(target) => {
                adaptive_chunk_size(duration_secs, profile, target, DEFAULT_MIN_CHUNKS, self.max_chunk_secs).0
            }
            None if profile.chunk_secs > 0 => profile.chunk_secs,
            None => self.default_chunk_secs,
        }
    }
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            bounds: WorkerBounds::default(),
            whole_job_threshold_secs: 600.0,
            default_chunk_secs: 300,
            max_chunk_secs: 1200,
            target_workers: None,
            progress_interval: Duration::from_millis(100),
            available_memory: None,
        }
    }
}

/// Merged output of a run.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    /// Engine that served the most chunks.
    pub engine_used: Option<String>,
    pub report: QualityReport,
    pub failed_chunks: Vec<usize>,
    /// Error of the first failed chunk, if any.
    pub error: Option<String>,
}

impl Transcript {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// Runs a job's input through an engine chain, whole or in parallel chunks.
pub struct FallbackEngine {
    chain: Vec<Arc<dyn Engine>>,
    profile: EngineProfile,
    settings: FallbackSettings,
}

impl FallbackEngine {
    /// `profile` is the primary engine's chunking/memory policy.
    pub fn new(chain: Vec<Arc<dyn Engine>>, profile: EngineProfile, settings: FallbackSettings) -> Self {
        Self {
            chain,
            profile,
            settings,
        }
    }

    pub fn chain(&self) -> &[Arc<dyn Engine>] {
        &self.chain
    }

    /// Chunk length the chunked path would use for `duration_secs`.
    pub fn chunk_secs_for(&self, duration_secs: f64) -> u64 {
        self.settings.chunk_secs_for(duration_secs, &self.profile)
    }

    /// Transcribe `source`. Fails with [`JobCancelled`] if the cancel hook trips.
    /// Chunk failures do not fail the call; they show up in the transcript's report.
    pub fn transcribe(
        &self,
        source: &str,
        duration_secs: f64,
        options: &JobOptions,
        hooks: ExecHooks<'_>,
    ) -> Result<Transcript> {
        if self.chain.is_empty() {
            bail!("no engines in chain");
        }
        if hooks.cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(anyhow!(JobCancelled));
        }

        if duration_secs < self.settings.whole_job_threshold_secs {
            return self.transcribe_whole(source, options, hooks);
        }
        if !self.chain.iter().any(|e| e.available() && e.supports_chunking()) {
            tracing::info!(source, duration_secs, "no chunking engine available, processing whole");
            return self.transcribe_whole(source, options, hooks);
        }

        let chunk_secs = self.chunk_secs_for(duration_secs);
        let spans = plan_chunks(duration_secs, chunk_secs);
        let alloc_profile = self.profile.clone().with_chunk_secs(chunk_secs);
        tracing::info!(
            source,
            duration_secs,
            chunk_secs,
            chunks = spans.len(),
            "transcribing in chunks"
        );

        let executor = ParallelExecutor::new(self.settings.bounds)
            .with_progress_interval(self.settings.progress_interval)
            .with_available_memory(self.settings.available_memory);
        let policy = self.settings.retry;
        let results = executor.process_chunks_with(
            &spans,
            |span, ctx| {
                let unit = WorkUnit::chunk(source, *span);
                Ok(process_chunk_with_fallback(
                    &self.chain,
                    &unit,
                    span.index,
                    options,
                    &policy,
                    &|p| ctx.report(p),
                ))
            },
            duration_secs,
            &alloc_profile,
            self.settings.target_workers,
            hooks,
        );

        if hooks.cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(anyhow!(JobCancelled));
        }

        let report = QualityReport::from_results(&results);
        tracing::info!(
            score = report.score,
            rating = %report.rating,
            succeeded = report.succeeded,
            total = report.total_chunks,
            "quality report"
        );
        Ok(Transcript {
            text: merge_annotated(&results),
            engine_used: report.primary_engine().map(str::to_string),
            failed_chunks: report.failed_chunks.clone(),
            error: results.iter().find(|r| !r.success).and_then(|r| r.error.clone()),
            report,
        })
    }

    fn transcribe_whole(&self, source: &str, options: &JobOptions, hooks: ExecHooks<'_>) -> Result<Transcript> {
        let monitor = ProgressMonitor::new(1, 1);
        monitor.start_chunk(0, 0);
        let progress = |p: f64| {
            monitor.update_chunk(0, 0, p);
            if let Some(on_progress) = hooks.on_progress {
                on_progress(&monitor.snapshot());
            }
        };
        let result = process_whole(&self.chain, &WorkUnit::whole(source), options, &progress);
        if hooks.cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(anyhow!(JobCancelled));
        }
        monitor.complete_chunk(0, 0);
        if let Some(on_progress) = hooks.on_progress {
            on_progress(&monitor.snapshot());
        }

        let results = [result];
        let report = QualityReport::from_results(&results);
        let [result] = results;
        Ok(Transcript {
            engine_used: result.engine_used.clone(),
            failed_chunks: report.failed_chunks.clone(),
            error: result.error.clone(),
            text: if result.success { result.text } else { String::new() },
            report,
        })
    }
}
