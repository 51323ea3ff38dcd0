//! Bounded worker pool for chunk calls.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::control::CancelToken;
use crate::engine::EngineProfile;
use crate::executor::progress::{ProgressMonitor, ProgressStats};
use crate::executor::ChunkResult;
use crate::planner::{self, WorkerBounds};

const EMPTY_RESULT: &str = "empty result";
const CANCELLED: &str = "cancelled";

/// Handle given to the per-chunk function for reporting progress within the chunk.
pub struct ChunkContext<'a> {
    pub index: usize,
    pub worker: usize,
    monitor: &'a ProgressMonitor,
    cancel: Option<&'a CancelToken>,
}

impl ChunkContext<'_> {
    /// Percent complete within this chunk, 0..=100.
    pub fn report(&self, percent: f64) {
        self.monitor.update_chunk(self.worker, self.index, percent);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }
}

/// Optional observers of a run.
#[derive(Clone, Copy, Default)]
pub struct ExecHooks<'a> {
    /// Called from a reporter thread at most once per progress interval, and once at the end.
    pub on_progress: Option<&'a (dyn Fn(&ProgressStats) + Sync)>,
    /// Checked before each chunk is taken; chunks not started are failed as cancelled.
    pub cancel: Option<&'a CancelToken>,
}

/// Runs a fixed set of chunk calls under bounded concurrency.
#[derive(Debug, Clone)]
pub struct ParallelExecutor {
    bounds: WorkerBounds,
    progress_interval: Duration,
    available_memory: Option<u64>,
}

impl ParallelExecutor {
    pub fn new(bounds: WorkerBounds) -> Self {
        Self {
            bounds,
            progress_interval: Duration::from_millis(100),
            available_memory: None,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Use a fixed memory figure instead of querying the system.
    pub fn with_available_memory(mut self, bytes: Option<u64>) -> Self {
        self.available_memory = bytes;
        self
    }

    /// Workers for `chunk_count` chunks: planner allocation, optional hint, chunk count.
    pub fn worker_count(
        &self,
        chunk_count: usize,
        duration_secs: f64,
        profile: &EngineProfile,
        concurrency_hint: Option<usize>,
    ) -> usize {
        let memory = self.available_memory.or_else(planner::available_memory);
        let allocated = planner::allocate(duration_secs, profile, self.bounds, memory).worker_count;
        let hinted = match concurrency_hint {
            Some(h) => allocated.min(h.max(1)),
            None => allocated,
        };
        hinted.min(chunk_count).max(1)
    }

    /// Process every chunk and return results indexed by chunk position.
    pub fn process_chunks<T, F>(
        &self,
        chunks: &[T],
        process_fn: F,
        duration_secs: f64,
        profile: &EngineProfile,
        concurrency_hint: Option<usize>,
    ) -> Vec<ChunkResult>
    where
        T: Sync,
        F: Fn(&T, &ChunkContext<'_>) -> anyhow::Result<ChunkResult> + Sync,
    {
        self.process_chunks_with(
            chunks,
            process_fn,
            duration_secs,
            profile,
            concurrency_hint,
            ExecHooks::default(),
        )
    }

    pub fn process_chunks_with<T, F>(
        &self,
        chunks: &[T],
        process_fn: F,
        duration_secs: f64,
        profile: &EngineProfile,
        concurrency_hint: Option<usize>,
        hooks: ExecHooks<'_>,
    ) -> Vec<ChunkResult>
    where
        T: Sync,
        F: Fn(&T, &ChunkContext<'_>) -> anyhow::Result<ChunkResult> + Sync,
    {
        let count = chunks.len();
        if count == 0 {
            return Vec::new();
        }
        let num_workers = self.worker_count(count, duration_secs, profile, concurrency_hint);
        tracing::debug!(
            chunks = count,
            workers = num_workers,
            engine = %profile.name,
            duration_secs,
            "processing chunks"
        );

        let monitor = ProgressMonitor::new(count, num_workers);
        let work: Mutex<VecDeque<usize>> = Mutex::new((0..count).collect());
        let mut results: Vec<Option<ChunkResult>> = (0..count).map(|_| None).collect();

        std::thread::scope(|s| {
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            if let Some(on_progress) = hooks.on_progress {
                let monitor = &monitor;
                let interval = self.progress_interval;
                s.spawn(move || loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => on_progress(&monitor.snapshot()),
                        _ => break,
                    }
                });
            }

            let (tx, rx) = mpsc::channel::<ChunkResult>();
            for worker in 0..num_workers {
                let tx = tx.clone();
                let work = &work;
                let monitor = &monitor;
                let process_fn = &process_fn;
                s.spawn(move || loop {
                    if hooks.cancel.is_some_and(CancelToken::is_cancelled) {
                        break;
                    }
                    let index = match work.lock().unwrap_or_else(PoisonError::into_inner).pop_front() {
                        Some(i) => i,
                        None => break,
                    };
                    monitor.start_chunk(worker, index);
                    let ctx = ChunkContext {
                        index,
                        worker,
                        monitor,
                        cancel: hooks.cancel,
                    };
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| process_fn(&chunks[index], &ctx)));
                    let elapsed = monitor.complete_chunk(worker, index);
                    let mut result = match outcome {
                        Ok(Ok(r)) => r,
                        Ok(Err(e)) => ChunkResult::failed(index, format!("{:#}", e)),
                        Err(payload) => ChunkResult::failed(index, panic_message(payload.as_ref())),
                    };
                    result.index = index;
                    result.processing_time = elapsed;
                    if result.success && result.text.trim().is_empty() {
                        result.demote(EMPTY_RESULT);
                    }
                    if !result.success {
                        tracing::warn!(
                            chunk = index,
                            error = result.error.as_deref().unwrap_or(""),
                            "chunk failed"
                        );
                    }
                    if tx.send(result).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for result in rx {
                let index = result.index;
                results[index] = Some(result);
            }
            let _ = stop_tx.send(());
        });

        if let Some(on_progress) = hooks.on_progress {
            on_progress(&monitor.snapshot());
        }
        let summary = monitor.finish();
        for w in &summary.workers {
            tracing::debug!(
                worker = w.worker,
                chunks = w.chunks,
                avg_ms = w.avg_time.as_millis() as u64,
                "chunk worker stats"
            );
        }
        tracing::info!(
            completed = summary.completed_chunks,
            total = count,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "chunk run finished"
        );

        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|| ChunkResult::failed(i, CANCELLED)))
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("chunk worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("chunk worker panicked: {}", s)
    } else {
        "chunk worker panicked".to_string()
    }
}
